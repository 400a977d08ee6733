pub mod admin;
pub mod auth;
pub mod catalog_api;
pub mod contribute;
pub mod flash;
pub mod landing;
pub mod quiz_api;
pub mod quiz_ui;
pub mod responses;
pub mod router;
pub mod state;
pub mod storage;
pub mod templates;
pub mod uploads;

pub use auth::{AuthUser, CurrentUser};
pub use state::AppState;
pub use templates::escape_html;

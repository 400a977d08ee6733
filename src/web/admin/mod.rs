mod auth;
mod catalog;
mod dashboard;
mod moderation;
mod quiz_settings;
mod types;
mod users;

pub use auth::require_admin_user;
pub use catalog::{catalog_page, create_article, create_culture, delete_article, delete_culture};
pub use dashboard::dashboard;
pub use moderation::{
    approve_contribution, delete_contribution, moderation_queue, reject_contribution,
};
pub use quiz_settings::{quiz_settings_page, update_models, update_prompts};
pub use types::{DashboardQuery, ModerationQuery};
pub use users::{create_user, delete_user, update_user_password};

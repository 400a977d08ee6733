use serde::Deserialize;

#[derive(Default, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Query for the moderation queue; `filter` narrows by review status.
#[derive(Default, Deserialize)]
pub struct ModerationQuery {
    pub status: Option<String>,
    pub error: Option<String>,
    pub filter: Option<String>,
}

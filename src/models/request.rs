use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SendNotificationRequest {
    pub user_id: String,
    pub title: String,
    pub message: String,

    #[serde(default = "default_priority")]
    pub priority: String,

    #[serde(rename = "type")]
    pub notification_type: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusRequest {
    pub notification_id: i64,
}

fn default_priority() -> String {
    "3".to_string()
}

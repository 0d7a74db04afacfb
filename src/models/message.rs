use serde::{Deserialize, Serialize};

/// Wire payload published to the topic exchange and consumed by workers.
///
/// Every field is required and unknown fields are refused, so a payload that
/// does not match this shape is treated as a poison message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationMessage {
    pub notification_id: i64,
    pub user_id: String,
    pub title: String,
    pub priority: String,
    pub message: String,

    #[serde(rename = "type")]
    pub notification_type: String,
}

impl NotificationMessage {
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

use serde::Serialize;

use crate::models::status::NotificationStatus;

#[derive(Debug, Clone, Serialize)]
pub struct SendNotificationResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NotificationStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendNotificationResponse {
    pub fn accepted(notification_id: i64) -> Self {
        Self {
            success: true,
            notification_id: Some(notification_id),
            error: None,
        }
    }

    pub fn rejected(error: String) -> Self {
        Self {
            success: false,
            notification_id: None,
            error: Some(error),
        }
    }
}

impl StatusResponse {
    pub fn found(status: NotificationStatus) -> Self {
        Self {
            status: Some(status),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            status: None,
            error: Some(error),
        }
    }
}

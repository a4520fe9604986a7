use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuietHours {
    pub start: String,
    pub end: String,
}

/// The user-editable part of a notification config (the PUT body).
///
/// Missing keys take their zero value, so a partial body still has to pass
/// the full validation rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub is_enabled: bool,
    pub preferred_time: String,
    pub quiet_hours: Option<QuietHours>,
    pub batching_days: i32,
    pub group_by_type: bool,
    pub muted_plant_ids: Vec<String>,
    pub remind_watering: bool,
    pub remind_fertilize: bool,
    pub remind_repotting: bool,
    pub remind_misting: bool,
}

impl NotificationSettings {
    /// What a user gets before they ever save a config.
    pub fn recommended() -> Self {
        NotificationSettings {
            is_enabled: true,
            preferred_time: "08:00".to_string(),
            quiet_hours: None,
            batching_days: 1,
            group_by_type: true,
            muted_plant_ids: Vec::new(),
            remind_watering: true,
            remind_fertilize: true,
            remind_repotting: true,
            remind_misting: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    /// `None` for the computed default that has not been stored yet.
    pub id: Option<Uuid>,
    pub user_id: String,
    #[serde(flatten)]
    pub settings: NotificationSettings,
    pub last_notification_sent_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationConfig {
    pub fn default_for(user_id: &str, now: DateTime<Utc>) -> Self {
        NotificationConfig {
            id: None,
            user_id: user_id.to_string(),
            settings: NotificationSettings::recommended(),
            last_notification_sent_at: None,
            updated_at: now,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// A presigned PUT was issued; the object may or may not exist yet.
    Pending,
    /// The object was verified against the store and recorded.
    Registered,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Registered => "registered",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(UploadStatus::Pending),
            "registered" => Some(UploadStatus::Registered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub user_id: String,
    pub key: String,
    pub size_bytes: i64,
    pub status: UploadStatus,
    pub created_at: DateTime<Utc>,
    pub registered_at: Option<DateTime<Utc>>,
}

impl Upload {
    /// When the orphan clock for this upload started: registration if it was
    /// registered, otherwise the presign.
    pub fn aged_from(&self) -> DateTime<Utc> {
        self.registered_at.unwrap_or(self.created_at)
    }
}

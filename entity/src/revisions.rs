use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RecordId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum RoundStatus {
    #[default]
    Pending,
    Approved,
}

/// One iteration of draft delivery and client feedback.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevisionRound {
    pub id: RecordId,
    pub order_id: RecordId,
    pub round_number: i32,
    #[serde(default)]
    pub status: RoundStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revision_files: Vec<RevisionFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revision_notes: Vec<RevisionNote>,
}

impl RevisionRound {
    pub fn is_approved(&self) -> bool {
        self.status == RoundStatus::Approved
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevisionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub round_id: RecordId,
    pub filename: String,
    pub storage_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    Client,
    Team,
}

/// Comment on a round. Never edited after insert.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevisionNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub round_id: RecordId,
    pub order_id: RecordId,
    pub author_type: AuthorType,
    pub author_name: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

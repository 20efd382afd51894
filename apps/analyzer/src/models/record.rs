use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::feedback::Feedback;

/// Key prefix under which resume records live in the kv store.
pub const KV_PREFIX: &str = "resume:";

/// Persisted metadata for one analyzed resume.
///
/// Created with empty feedback once both uploads succeed, then
/// overwritten in place when the AI feedback arrives. Records are never
/// deleted individually — only bulk-wiped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: Uuid,
    /// Opaque storage handle for the uploaded PDF.
    pub resume_path: String,
    /// Opaque storage handle for the rasterized preview.
    pub image_path: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
}

impl ResumeRecord {
    /// Kv key for a record id: `resume:<uuid>`.
    pub fn kv_key(id: Uuid) -> String {
        format!("{KV_PREFIX}{id}")
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Transcription lifecycle of a recording. Transitions are monotonic:
/// pending -> processing -> completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionStatus::Pending => "pending",
            TranscriptionStatus::Processing => "processing",
            TranscriptionStatus::Completed => "completed",
            TranscriptionStatus::Failed => "failed",
        }
    }
}

/// One captured audio interview and its transcription lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recording {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Object key in the audio bucket: `{user_id}/{project_id}/{uuid}.webm`.
    pub audio_path: String,
    pub duration_seconds: i32,
    pub file_size_bytes: i64,
    pub transcription_status: TranscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A time-coded span of transcribed text. Immutable once written; deleted
/// with its parent recording.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TranscriptSegment {
    pub id: Uuid,
    pub recording_id: Uuid,
    pub segment_index: i32,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    /// `exp(avg_logprob)` from the speech-to-text service, in (0, 1].
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A search hit with enough context to jump playback to the segment.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TranscriptSearchHit {
    pub id: Uuid,
    pub recording_id: Uuid,
    pub recording_name: String,
    pub segment_index: i32,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per user account, created at signup. Plan limits live on the row
/// so billing webhooks can update them atomically with the plan itself.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub plan: String,
    pub max_projects: i32,
    pub max_transcription_seconds: i32,
    /// Monotonic counter, reset only by plan changes.
    pub transcription_seconds_used: i32,
    pub stripe_customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_pro(&self) -> bool {
        self.plan == "pro"
    }
}

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::recording::{Recording, TranscriptionStatus};

/// A segment row about to be written, as mapped from the speech-to-text
/// response.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSegment {
    pub segment_index: i32,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub confidence: Option<f64>,
}

/// Persistence seam of the transcription pipeline. The production
/// implementation is Postgres; tests substitute an in-memory fake to check
/// status transitions and failure ordering.
#[async_trait]
pub trait TranscriptionStore: Send + Sync {
    async fn set_status(
        &self,
        recording_id: Uuid,
        status: TranscriptionStatus,
    ) -> Result<(), AppError>;

    async fn load_recording(&self, recording_id: Uuid) -> Result<Option<Recording>, AppError>;

    /// Writes the segment set and marks the recording completed in ONE
    /// transaction, replacing any segments a previous partial run left
    /// behind. Re-invoking the pipeline can therefore never duplicate
    /// segments or leave a partial set under a completed status.
    async fn complete_with_segments(
        &self,
        recording_id: Uuid,
        segments: &[NewSegment],
    ) -> Result<(), AppError>;

    /// Adds to the owner's cumulative transcription usage counter.
    async fn add_transcription_usage(&self, user_id: Uuid, seconds: i32) -> Result<(), AppError>;
}

pub struct PgTranscriptionStore {
    db: PgPool,
}

impl PgTranscriptionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TranscriptionStore for PgTranscriptionStore {
    async fn set_status(
        &self,
        recording_id: Uuid,
        status: TranscriptionStatus,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE recordings SET transcription_status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(status.as_str())
        .bind(recording_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn load_recording(&self, recording_id: Uuid) -> Result<Option<Recording>, AppError> {
        let recording: Option<Recording> =
            sqlx::query_as("SELECT * FROM recordings WHERE id = $1")
                .bind(recording_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(recording)
    }

    async fn complete_with_segments(
        &self,
        recording_id: Uuid,
        segments: &[NewSegment],
    ) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM transcripts WHERE recording_id = $1")
            .bind(recording_id)
            .execute(&mut *tx)
            .await?;

        for segment in segments {
            sqlx::query(
                r#"
                INSERT INTO transcripts
                    (recording_id, segment_index, start_time, end_time, text, confidence)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(recording_id)
            .bind(segment.segment_index)
            .bind(segment.start_time)
            .bind(segment.end_time)
            .bind(&segment.text)
            .bind(segment.confidence)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE recordings SET transcription_status = 'completed', updated_at = NOW() WHERE id = $1",
        )
        .bind(recording_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_transcription_usage(&self, user_id: Uuid, seconds: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE profiles
            SET transcription_seconds_used = transcription_seconds_used + $1,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(seconds)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

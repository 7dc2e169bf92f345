use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::recording::{Recording, TranscriptSegment};
use crate::state::AppState;
use crate::storage::audio_key;
use crate::transcription::Transcriber;

#[derive(Debug)]
pub struct CreateRecordingParams {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub duration_seconds: i32,
    pub audio: Bytes,
}

/// POST /api/v1/recordings (multipart)
///
/// Fields: `project_id`, `user_id`, `name`, `duration_seconds` and the
/// `audio` file part. Upload happens before the metadata insert, so a
/// storage failure can never leave a row pointing at a missing object.
pub async fn handle_create_recording(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Recording>, AppError> {
    let params = parse_create_multipart(multipart).await?;
    let recording = create_recording(&state, params).await?;

    // Fire-and-forget transcription trigger. If the spawned pipeline fails
    // to start, the recording stays at `pending` and can be re-submitted
    // through POST /api/v1/transcribe.
    let transcriber = Transcriber::from_state(&state);
    let recording_id = recording.id;
    tokio::spawn(async move {
        let _ = transcriber.run(recording_id).await;
    });

    Ok(Json(recording))
}

/// Upload-then-insert core, separated from the HTTP layer so the ordering
/// guarantee is testable against a fake object store.
pub async fn create_recording(
    state: &AppState,
    params: CreateRecordingParams,
) -> Result<Recording, AppError> {
    let recording_id = Uuid::new_v4();
    let key = audio_key(params.user_id, params.project_id, recording_id);
    let file_size_bytes = params.audio.len() as i64;

    state
        .store
        .put(&state.config.audio_bucket, &key, params.audio, "audio/webm")
        .await?;

    let recording: Recording = sqlx::query_as(
        r#"
        INSERT INTO recordings
            (id, project_id, user_id, name, audio_path, duration_seconds,
             file_size_bytes, transcription_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
        RETURNING *
        "#,
    )
    .bind(recording_id)
    .bind(params.project_id)
    .bind(params.user_id)
    .bind(&params.name)
    .bind(&key)
    .bind(params.duration_seconds.max(0))
    .bind(file_size_bytes)
    .fetch_one(&state.db)
    .await?;

    Ok(recording)
}

async fn parse_create_multipart(mut multipart: Multipart) -> Result<CreateRecordingParams, AppError> {
    let mut project_id = None;
    let mut user_id = None;
    let mut name = None;
    let mut duration_seconds = None;
    let mut audio = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "project_id" => project_id = Some(parse_uuid_field(&field_text(field).await?)?),
            "user_id" => user_id = Some(parse_uuid_field(&field_text(field).await?)?),
            "name" => name = Some(field_text(field).await?),
            "duration_seconds" => {
                let text = field_text(field).await?;
                duration_seconds = Some(text.trim().parse::<i32>().map_err(|_| {
                    AppError::Validation("duration_seconds must be an integer".to_string())
                })?);
            }
            "audio" => {
                audio = Some(field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("could not read audio part: {e}"))
                })?);
            }
            _ => {}
        }
    }

    Ok(CreateRecordingParams {
        project_id: project_id
            .ok_or_else(|| AppError::Validation("project_id is required".to_string()))?,
        user_id: user_id.ok_or_else(|| AppError::Validation("user_id is required".to_string()))?,
        name: name.ok_or_else(|| AppError::Validation("name is required".to_string()))?,
        duration_seconds: duration_seconds
            .ok_or_else(|| AppError::Validation("duration_seconds is required".to_string()))?,
        audio: audio.ok_or_else(|| AppError::Validation("audio file is required".to_string()))?,
    })
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("could not read field: {e}")))
}

fn parse_uuid_field(text: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(text.trim()).map_err(|_| AppError::Validation("invalid uuid".to_string()))
}

/// GET /api/v1/projects/:id/recordings — newest first.
pub async fn handle_list_recordings(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Recording>>, AppError> {
    let recordings: Vec<Recording> = sqlx::query_as(
        "SELECT * FROM recordings WHERE project_id = $1 ORDER BY created_at DESC",
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(recordings))
}

/// DELETE /api/v1/recordings/:id
///
/// The audio object goes first; if its removal fails the row stays put and
/// the error surfaces, so a row can never dangle over a deleted object's
/// ghost. Segment rows cascade with the row.
pub async fn handle_delete_recording(
    State(state): State<AppState>,
    Path(recording_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let recording = load_recording(&state, recording_id).await?;

    state
        .store
        .delete(&state.config.audio_bucket, &recording.audio_path)
        .await?;

    sqlx::query("DELETE FROM recordings WHERE id = $1")
        .bind(recording_id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "deleted": true })))
}

#[derive(Serialize)]
pub struct AudioUrlResponse {
    pub url: String,
}

/// GET /api/v1/recordings/:id/audio-url — time-limited playback URL
/// (~1 hour; clients cache it for most of that window).
pub async fn handle_audio_url(
    State(state): State<AppState>,
    Path(recording_id): Path<Uuid>,
) -> Result<Json<AudioUrlResponse>, AppError> {
    let recording = load_recording(&state, recording_id).await?;
    let url = state
        .store
        .signed_url(&state.config.audio_bucket, &recording.audio_path)
        .await?;
    Ok(Json(AudioUrlResponse { url }))
}

/// GET /api/v1/recordings/:id/transcript — segments in index order.
pub async fn handle_get_transcript(
    State(state): State<AppState>,
    Path(recording_id): Path<Uuid>,
) -> Result<Json<Vec<TranscriptSegment>>, AppError> {
    let segments: Vec<TranscriptSegment> = sqlx::query_as(
        "SELECT * FROM transcripts WHERE recording_id = $1 ORDER BY segment_index ASC",
    )
    .bind(recording_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(segments))
}

async fn load_recording(state: &AppState, recording_id: Uuid) -> Result<Recording, AppError> {
    let recording: Option<Recording> = sqlx::query_as("SELECT * FROM recordings WHERE id = $1")
        .bind(recording_id)
        .fetch_optional(&state.db)
        .await?;
    recording.ok_or_else(|| AppError::NotFound(format!("Recording {recording_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::billing::stripe::StripeClient;
    use crate::config::{Config, PlanConfig};
    use crate::openai::OpenAiClient;
    use crate::storage::ObjectStore;

    struct CountingStore {
        fail_put: bool,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn put(
            &self,
            _bucket: &str,
            _key: &str,
            _body: Bytes,
            _content_type: &str,
        ) -> Result<(), AppError> {
            if self.fail_put {
                return Err(AppError::Storage("upload refused".to_string()));
            }
            self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get(&self, _bucket: &str, _key: &str) -> Result<Bytes, AppError> {
            Ok(Bytes::new())
        }

        async fn delete(&self, _bucket: &str, _key: &str) -> Result<(), AppError> {
            Ok(())
        }

        async fn signed_url(&self, _bucket: &str, _key: &str) -> Result<String, AppError> {
            Ok(String::new())
        }
    }

    fn test_state(store: Arc<CountingStore>) -> AppState {
        // Lazy pool: no connection is made until a query actually runs.
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();
        AppState {
            db,
            store,
            openai: OpenAiClient::new("sk-test".to_string()),
            stripe: StripeClient::new("sk_test".to_string()),
            config: Config {
                database_url: String::new(),
                audio_bucket: "audio-recordings".to_string(),
                attachments_bucket: "chat-attachments".to_string(),
                s3_endpoint: String::new(),
                aws_access_key_id: String::new(),
                aws_secret_access_key: String::new(),
                openai_api_key: String::new(),
                stripe_secret_key: String::new(),
                stripe_webhook_secret: String::new(),
                site_url: "http://localhost:5173".to_string(),
                port: 0,
                rust_log: "info".to_string(),
                plans: PlanConfig::default(),
            },
        }
    }

    fn params() -> CreateRecordingParams {
        CreateRecordingParams {
            project_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Entretien du matin".to_string(),
            duration_seconds: 120,
            audio: Bytes::from_static(b"webm"),
        }
    }

    #[tokio::test]
    async fn upload_failure_aborts_before_any_row_is_written() {
        let store = Arc::new(CountingStore {
            fail_put: true,
            puts: AtomicUsize::new(0),
        });
        let state = test_state(Arc::clone(&store));

        let err = create_recording(&state, params()).await.unwrap_err();

        // A Storage error proves the flow stopped at the upload; the insert
        // against the unreachable pool would have surfaced as Database.
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn insert_runs_only_after_a_successful_upload() {
        let store = Arc::new(CountingStore {
            fail_put: false,
            puts: AtomicUsize::new(0),
        });
        let state = test_state(Arc::clone(&store));

        // The upload succeeds, then the insert hits the unreachable pool.
        let err = create_recording(&state, params()).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }
}

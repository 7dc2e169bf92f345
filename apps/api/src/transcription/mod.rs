//! Transcription pipeline, invoked per recording after its audio is stored.
//!
//! Every step is a hard dependency on the previous one succeeding; any
//! failure parks the recording at `failed` and stops. Segment insertion and
//! the `completed` status land in one transaction, so a re-invocation after
//! a partial failure can neither duplicate segments nor leave a partial set
//! marked completed.

pub mod store;

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::recording::TranscriptionStatus;
use crate::openai::{SpeechToText, WhisperResponse};
use crate::state::AppState;
use crate::storage::ObjectStore;
use crate::transcription::store::{NewSegment, PgTranscriptionStore, TranscriptionStore};

pub struct Transcriber {
    store: Arc<dyn TranscriptionStore>,
    objects: Arc<dyn ObjectStore>,
    stt: Arc<dyn SpeechToText>,
    audio_bucket: String,
}

impl Transcriber {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            store: Arc::new(PgTranscriptionStore::new(state.db.clone())),
            objects: Arc::clone(&state.store),
            stt: Arc::new(state.openai.clone()),
            audio_bucket: state.config.audio_bucket.clone(),
        }
    }

    #[cfg(test)]
    fn new(
        store: Arc<dyn TranscriptionStore>,
        objects: Arc<dyn ObjectStore>,
        stt: Arc<dyn SpeechToText>,
        audio_bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            objects,
            stt,
            audio_bucket: audio_bucket.into(),
        }
    }

    /// Runs the pipeline, parking the recording at `failed` on any error.
    /// Returns the number of segments written.
    pub async fn run(&self, recording_id: Uuid) -> Result<usize, AppError> {
        match self.pipeline(recording_id).await {
            Ok(count) => {
                tracing::info!("transcription of {recording_id} completed ({count} segments)");
                Ok(count)
            }
            Err(e) => {
                tracing::error!("transcription of {recording_id} failed: {e}");
                if let Err(status_err) = self
                    .store
                    .set_status(recording_id, TranscriptionStatus::Failed)
                    .await
                {
                    tracing::error!(
                        "could not mark recording {recording_id} as failed: {status_err}"
                    );
                }
                Err(e)
            }
        }
    }

    async fn pipeline(&self, recording_id: Uuid) -> Result<usize, AppError> {
        self.store
            .set_status(recording_id, TranscriptionStatus::Processing)
            .await?;

        let recording = self
            .store
            .load_recording(recording_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Recording {recording_id} not found")))?;

        let audio = self
            .objects
            .get(&self.audio_bucket, &recording.audio_path)
            .await?;

        let response = self
            .stt
            .transcribe(audio, "audio.webm")
            .await
            .map_err(|e| AppError::upstream("speech-to-text", e.to_string()))?;

        let segments = map_segments(&response);
        self.store
            .complete_with_segments(recording_id, &segments)
            .await?;

        // Usage accounting is best effort: the status is already completed
        // and must stay monotonic, so a failed increment is only logged.
        if recording.duration_seconds > 0 {
            if let Err(e) = self
                .store
                .add_transcription_usage(recording.user_id, recording.duration_seconds)
                .await
            {
                tracing::warn!(
                    "usage accounting for recording {recording_id} failed: {e}"
                );
            }
        }

        Ok(segments.len())
    }
}

#[derive(Deserialize)]
pub struct TranscribeRequest {
    pub recording_id: Uuid,
}

#[derive(Serialize)]
pub struct TranscribeResponse {
    pub success: bool,
    pub segment_count: usize,
}

/// POST /api/v1/transcribe — runs the pipeline inline and waits for it.
/// Used to retry a failed recording; uploads kick off the same pipeline in
/// the background instead.
pub async fn handle_transcribe(
    State(state): State<AppState>,
    Json(req): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, AppError> {
    let segment_count = Transcriber::from_state(&state).run(req.recording_id).await?;
    Ok(Json(TranscribeResponse {
        success: true,
        segment_count,
    }))
}

/// Maps the speech-to-text response to segment rows: index is the position
/// in response order, text is trimmed, confidence is `exp(avg_logprob)` —
/// in (0, 1] whenever the service holds its logprob <= 0 contract.
pub fn map_segments(response: &WhisperResponse) -> Vec<NewSegment> {
    response
        .segments
        .iter()
        .enumerate()
        .map(|(index, segment)| NewSegment {
            segment_index: index as i32,
            start_time: segment.start,
            end_time: segment.end,
            text: segment.text.trim().to_string(),
            confidence: segment.avg_logprob.map(f64::exp),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;
    use std::sync::Mutex;

    use crate::models::recording::Recording;
    use crate::openai::{OpenAiError, WhisperSegment};

    fn whisper(segments: &[(f64, f64, &str, f64)]) -> WhisperResponse {
        WhisperResponse {
            segments: segments
                .iter()
                .map(|&(start, end, text, avg_logprob)| WhisperSegment {
                    start,
                    end,
                    text: text.to_string(),
                    avg_logprob: Some(avg_logprob),
                })
                .collect(),
        }
    }

    #[derive(Default)]
    struct FakeStoreState {
        statuses: Vec<TranscriptionStatus>,
        segments: Vec<NewSegment>,
        usage_seconds: i32,
        completed: bool,
    }

    struct FakeStore {
        recording: Option<Recording>,
        state: Mutex<FakeStoreState>,
    }

    impl FakeStore {
        fn with_recording(duration_seconds: i32) -> Self {
            Self {
                recording: Some(recording(duration_seconds)),
                state: Mutex::new(FakeStoreState::default()),
            }
        }
    }

    fn recording(duration_seconds: i32) -> Recording {
        Recording {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Entretien 1".to_string(),
            audio_path: "user/project/rec.webm".to_string(),
            duration_seconds,
            file_size_bytes: 1024,
            transcription_status: TranscriptionStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl TranscriptionStore for FakeStore {
        async fn set_status(
            &self,
            _recording_id: Uuid,
            status: TranscriptionStatus,
        ) -> Result<(), AppError> {
            self.state.lock().unwrap().statuses.push(status);
            Ok(())
        }

        async fn load_recording(
            &self,
            _recording_id: Uuid,
        ) -> Result<Option<Recording>, AppError> {
            Ok(self.recording.clone())
        }

        async fn complete_with_segments(
            &self,
            _recording_id: Uuid,
            segments: &[NewSegment],
        ) -> Result<(), AppError> {
            let mut state = self.state.lock().unwrap();
            state.segments = segments.to_vec();
            state.statuses.push(TranscriptionStatus::Completed);
            state.completed = true;
            Ok(())
        }

        async fn add_transcription_usage(
            &self,
            _user_id: Uuid,
            seconds: i32,
        ) -> Result<(), AppError> {
            self.state.lock().unwrap().usage_seconds += seconds;
            Ok(())
        }
    }

    struct FakeObjects {
        fail: bool,
    }

    #[async_trait]
    impl ObjectStore for FakeObjects {
        async fn put(
            &self,
            _bucket: &str,
            _key: &str,
            _body: Bytes,
            _content_type: &str,
        ) -> Result<(), AppError> {
            Ok(())
        }

        async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, AppError> {
            if self.fail {
                return Err(AppError::Storage(format!("get {bucket}/{key}: unavailable")));
            }
            Ok(Bytes::from_static(b"webm-bytes"))
        }

        async fn delete(&self, _bucket: &str, _key: &str) -> Result<(), AppError> {
            Ok(())
        }

        async fn signed_url(&self, _bucket: &str, _key: &str) -> Result<String, AppError> {
            Ok("https://example.invalid/audio".to_string())
        }
    }

    struct FakeStt {
        response: Result<WhisperResponse, ()>,
    }

    #[async_trait]
    impl SpeechToText for FakeStt {
        async fn transcribe(
            &self,
            _audio: Bytes,
            _file_name: &str,
        ) -> Result<WhisperResponse, OpenAiError> {
            self.response.clone().map_err(|_| OpenAiError::Api {
                status: 500,
                message: "upstream down".to_string(),
            })
        }
    }

    #[test]
    fn segments_map_in_response_order_with_exp_confidence() {
        let rows = map_segments(&whisper(&[(0.0, 2.0, " a ", -0.1), (2.0, 4.0, "b", -0.5)]));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].segment_index, 0);
        assert_eq!(rows[1].segment_index, 1);
        assert_eq!(rows[0].start_time, 0.0);
        assert_eq!(rows[0].end_time, 2.0);
        assert_eq!(rows[1].start_time, 2.0);
        assert_eq!(rows[1].end_time, 4.0);
        assert_eq!(rows[0].text, "a"); // trimmed
        assert_eq!(rows[0].confidence, Some((-0.1f64).exp()));
        assert_eq!(rows[1].confidence, Some((-0.5f64).exp()));
        assert!(rows[0].confidence.unwrap() > 0.0 && rows[0].confidence.unwrap() <= 1.0);
    }

    #[test]
    fn missing_logprob_yields_no_confidence() {
        let response = WhisperResponse {
            segments: vec![WhisperSegment {
                start: 0.0,
                end: 1.0,
                text: "bonjour".to_string(),
                avg_logprob: None,
            }],
        };
        assert_eq!(map_segments(&response)[0].confidence, None);
    }

    #[tokio::test]
    async fn successful_run_transitions_processing_then_completed() {
        let store = Arc::new(FakeStore::with_recording(90));
        let transcriber = Transcriber::new(
            Arc::clone(&store) as Arc<dyn TranscriptionStore>,
            Arc::new(FakeObjects { fail: false }),
            Arc::new(FakeStt {
                response: Ok(whisper(&[(0.0, 2.0, "a", -0.1), (2.0, 4.0, "b", -0.5)])),
            }),
            "audio-recordings",
        );

        let count = transcriber.run(Uuid::new_v4()).await.unwrap();
        assert_eq!(count, 2);

        let state = store.state.lock().unwrap();
        assert_eq!(
            state.statuses,
            vec![TranscriptionStatus::Processing, TranscriptionStatus::Completed]
        );
        assert_eq!(state.segments.len(), 2);
        assert_eq!(state.usage_seconds, 90);
    }

    #[tokio::test]
    async fn upstream_failure_parks_recording_at_failed_with_no_segments() {
        let store = Arc::new(FakeStore::with_recording(90));
        let transcriber = Transcriber::new(
            Arc::clone(&store) as Arc<dyn TranscriptionStore>,
            Arc::new(FakeObjects { fail: false }),
            Arc::new(FakeStt { response: Err(()) }),
            "audio-recordings",
        );

        transcriber.run(Uuid::new_v4()).await.unwrap_err();

        let state = store.state.lock().unwrap();
        assert_eq!(
            state.statuses,
            vec![TranscriptionStatus::Processing, TranscriptionStatus::Failed]
        );
        assert!(state.segments.is_empty());
        assert!(!state.completed);
        assert_eq!(state.usage_seconds, 0);
    }

    #[tokio::test]
    async fn download_failure_is_fatal_before_the_stt_call() {
        let store = Arc::new(FakeStore::with_recording(90));
        let transcriber = Transcriber::new(
            Arc::clone(&store) as Arc<dyn TranscriptionStore>,
            Arc::new(FakeObjects { fail: true }),
            Arc::new(FakeStt {
                response: Ok(whisper(&[(0.0, 2.0, "a", -0.1)])),
            }),
            "audio-recordings",
        );

        transcriber.run(Uuid::new_v4()).await.unwrap_err();

        let state = store.state.lock().unwrap();
        assert_eq!(*state.statuses.last().unwrap(), TranscriptionStatus::Failed);
        assert!(state.segments.is_empty());
    }

    #[tokio::test]
    async fn missing_recording_is_fatal() {
        let store = Arc::new(FakeStore {
            recording: None,
            state: Mutex::new(FakeStoreState::default()),
        });
        let transcriber = Transcriber::new(
            Arc::clone(&store) as Arc<dyn TranscriptionStore>,
            Arc::new(FakeObjects { fail: false }),
            Arc::new(FakeStt {
                response: Ok(whisper(&[])),
            }),
            "audio-recordings",
        );

        let err = transcriber.run(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let state = store.state.lock().unwrap();
        assert_eq!(*state.statuses.last().unwrap(), TranscriptionStatus::Failed);
    }

    #[tokio::test]
    async fn zero_duration_recording_adds_no_usage() {
        let store = Arc::new(FakeStore::with_recording(0));
        let transcriber = Transcriber::new(
            Arc::clone(&store) as Arc<dyn TranscriptionStore>,
            Arc::new(FakeObjects { fail: false }),
            Arc::new(FakeStt {
                response: Ok(whisper(&[(0.0, 1.0, "a", -0.2)])),
            }),
            "audio-recordings",
        );

        transcriber.run(Uuid::new_v4()).await.unwrap();
        assert_eq!(store.state.lock().unwrap().usage_seconds, 0);
    }
}

pub mod health;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::state::AppState;
use crate::{ai, billing, chat, documents, projects, recordings, transcription};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Projects
        .route(
            "/api/v1/projects",
            get(projects::handle_list_projects).post(projects::handle_create_project),
        )
        .route(
            "/api/v1/projects/:id",
            patch(projects::handle_update_project).delete(projects::handle_delete_project),
        )
        .route(
            "/api/v1/projects/:id/stats",
            get(projects::handle_project_stats),
        )
        // Recordings and transcripts
        .route(
            "/api/v1/recordings",
            post(recordings::handlers::handle_create_recording),
        )
        .route(
            "/api/v1/projects/:id/recordings",
            get(recordings::handlers::handle_list_recordings),
        )
        .route(
            "/api/v1/recordings/:id",
            delete(recordings::handlers::handle_delete_recording),
        )
        .route(
            "/api/v1/recordings/:id/audio-url",
            get(recordings::handlers::handle_audio_url),
        )
        .route(
            "/api/v1/recordings/:id/transcript",
            get(recordings::handlers::handle_get_transcript),
        )
        .route("/api/v1/transcribe", post(transcription::handle_transcribe))
        .route(
            "/api/v1/projects/:id/transcript-search",
            get(recordings::search::handle_transcript_search),
        )
        // Document
        .route(
            "/api/v1/projects/:id/document",
            get(documents::handlers::handle_get_document),
        )
        .route(
            "/api/v1/documents/:id",
            put(documents::handlers::handle_save_document),
        )
        // Chat
        .route(
            "/api/v1/projects/:id/threads",
            get(chat::handlers::handle_list_threads),
        )
        .route("/api/v1/threads", post(chat::handlers::handle_create_thread))
        .route(
            "/api/v1/threads/:id/messages",
            get(chat::handlers::handle_list_messages),
        )
        .route(
            "/api/v1/threads/send",
            post(chat::handlers::handle_send_message),
        )
        .route(
            "/api/v1/attachments",
            post(chat::handlers::handle_upload_attachment),
        )
        // Writing assistance
        .route("/api/v1/ai/rephrase", post(ai::handle_rephrase))
        .route("/api/v1/ai/condense", post(ai::handle_condense))
        .route("/api/v1/ai/to-prose", post(ai::handle_to_prose))
        // Account and billing
        .route(
            "/api/v1/subscription",
            get(billing::handlers::handle_subscription),
        )
        .route("/api/v1/profile", get(billing::handlers::handle_get_profile))
        .route(
            "/api/v1/billing/checkout",
            post(billing::handlers::handle_create_checkout),
        )
        .route(
            "/api/v1/billing/portal",
            post(billing::handlers::handle_create_portal),
        )
        .route(
            "/api/v1/billing/webhook",
            post(billing::webhook::handle_webhook),
        )
        .with_state(state)
}

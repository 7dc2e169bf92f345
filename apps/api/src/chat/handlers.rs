use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::titles::{attachment_note, derive_thread_title, should_retitle};
use crate::errors::AppError;
use crate::models::chat::{ChatThread, Message, MessageRole, DEFAULT_THREAD_TITLE};
use crate::openai::{prompts, ChatMessage, ChatOptions};
use crate::state::AppState;
use crate::storage::attachment_key;

/// How many messages are replayed to the assistant as context.
const CONTEXT_WINDOW: i64 = 20;

/// GET /api/v1/projects/:id/threads — most recently active first.
pub async fn handle_list_threads(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<ChatThread>>, AppError> {
    let threads: Vec<ChatThread> = sqlx::query_as(
        "SELECT * FROM chat_threads WHERE project_id = $1 ORDER BY updated_at DESC",
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(threads))
}

#[derive(Deserialize)]
pub struct CreateThreadRequest {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
}

/// POST /api/v1/threads
pub async fn handle_create_thread(
    State(state): State<AppState>,
    Json(req): Json<CreateThreadRequest>,
) -> Result<Json<ChatThread>, AppError> {
    let thread = create_thread(&state, req.project_id, req.user_id, req.title.as_deref()).await?;
    Ok(Json(thread))
}

async fn create_thread(
    state: &AppState,
    project_id: Uuid,
    user_id: Uuid,
    title: Option<&str>,
) -> Result<ChatThread, AppError> {
    let title = match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => DEFAULT_THREAD_TITLE,
    };
    let thread: ChatThread = sqlx::query_as(
        r#"
        INSERT INTO chat_threads (project_id, user_id, title)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(title)
    .fetch_one(&state.db)
    .await?;
    Ok(thread)
}

/// GET /api/v1/threads/:id/messages — creation order.
pub async fn handle_list_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages: Vec<Message> = sqlx::query_as(
        "SELECT * FROM messages WHERE chat_thread_id = $1 ORDER BY created_at ASC",
    )
    .bind(thread_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(messages))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    /// Absent on the first message; a thread is created implicitly.
    pub thread_id: Option<Uuid>,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub subject_name: Option<String>,
    /// Names of attachments already uploaded via POST /api/v1/attachments.
    #[serde(default)]
    pub attachment_names: Vec<String>,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub thread_id: Uuid,
    pub reply: Message,
}

/// POST /api/v1/threads/send
///
/// One chat turn: persist the user message, replay recent context to the
/// assistant, persist its reply, and opportunistically title the thread
/// after the first exchange. An upstream failure aborts the turn but the
/// already-persisted user message stays.
pub async fn handle_send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    if req.content.trim().is_empty() {
        return Err(AppError::Validation("content is required".to_string()));
    }

    let thread = match req.thread_id {
        Some(id) => load_thread(&state, id).await?,
        None => create_thread(&state, req.project_id, req.user_id, None).await?,
    };

    let mut content = req.content.clone();
    if let Some(note) = attachment_note(&req.attachment_names) {
        content.push_str(&note);
    }

    sqlx::query("INSERT INTO messages (chat_thread_id, role, content) VALUES ($1, $2, $3)")
        .bind(thread.id)
        .bind(MessageRole::User.as_str())
        .bind(&content)
        .execute(&state.db)
        .await?;

    sqlx::query("UPDATE chat_threads SET updated_at = NOW() WHERE id = $1")
        .bind(thread.id)
        .execute(&state.db)
        .await?;

    let context = recent_context(&state, thread.id).await?;

    let system = prompts::chat_system(req.subject_name.as_deref());
    let reply_text = state
        .openai
        .chat(&system, &context, ChatOptions::default())
        .await
        .map_err(|e| AppError::upstream("assistant", e.to_string()))?;

    let reply: Message = sqlx::query_as(
        r#"
        INSERT INTO messages (chat_thread_id, role, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(thread.id)
    .bind(MessageRole::Assistant.as_str())
    .bind(&reply_text)
    .fetch_one(&state.db)
    .await?;

    maybe_retitle(&state, &thread, &req.content).await?;

    Ok(Json(SendMessageResponse {
        thread_id: thread.id,
        reply,
    }))
}

/// The most recent messages, replayed oldest-first.
async fn recent_context(state: &AppState, thread_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
    let mut rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT role, content FROM messages
        WHERE chat_thread_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(thread_id)
    .bind(CONTEXT_WINDOW)
    .fetch_all(&state.db)
    .await?;
    rows.reverse();
    Ok(rows
        .into_iter()
        .map(|(role, content)| ChatMessage::new(role, content))
        .collect())
}

async fn maybe_retitle(
    state: &AppState,
    thread: &ChatThread,
    first_user_content: &str,
) -> Result<(), AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_thread_id = $1")
        .bind(thread.id)
        .fetch_one(&state.db)
        .await?;

    if should_retitle(total, &thread.title) {
        sqlx::query("UPDATE chat_threads SET title = $1, updated_at = NOW() WHERE id = $2")
            .bind(derive_thread_title(first_user_content))
            .bind(thread.id)
            .execute(&state.db)
            .await?;
    }
    Ok(())
}

async fn load_thread(state: &AppState, thread_id: Uuid) -> Result<ChatThread, AppError> {
    let thread: Option<ChatThread> = sqlx::query_as("SELECT * FROM chat_threads WHERE id = $1")
        .bind(thread_id)
        .fetch_optional(&state.db)
        .await?;
    thread.ok_or_else(|| AppError::NotFound(format!("Thread {thread_id} not found")))
}

#[derive(Serialize)]
pub struct AttachmentResponse {
    pub key: String,
    pub name: String,
}

/// POST /api/v1/attachments (multipart: `thread_id`, `file`)
///
/// Stores the file in the attachments bucket under the thread's namespace;
/// the send endpoint then references attachments by name only.
pub async fn handle_upload_attachment(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AttachmentResponse>, AppError> {
    let mut thread_id = None;
    let mut file: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "thread_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("could not read field: {e}")))?;
                thread_id = Some(Uuid::parse_str(text.trim()).map_err(|_| {
                    AppError::Validation("thread_id must be a uuid".to_string())
                })?);
            }
            "file" => {
                let name = field
                    .file_name()
                    .unwrap_or("piece-jointe")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("could not read file part: {e}"))
                })?;
                file = Some((name, data));
            }
            _ => {}
        }
    }

    let thread_id =
        thread_id.ok_or_else(|| AppError::Validation("thread_id is required".to_string()))?;
    let (name, data) =
        file.ok_or_else(|| AppError::Validation("file is required".to_string()))?;

    let key = attachment_key(thread_id, Utc::now().timestamp_millis(), &name);
    state
        .store
        .put(
            &state.config.attachments_bucket,
            &key,
            data,
            "application/octet-stream",
        )
        .await?;

    Ok(Json(AttachmentResponse { key, name }))
}

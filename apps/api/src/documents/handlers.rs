use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::Document;
use crate::state::AppState;

const DEFAULT_DOCUMENT_TITLE: &str = "Sans titre";

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/projects/:id/document?user_id=
///
/// Lazily creates an empty document on first access. The insert is
/// idempotent: `documents.project_id` is unique and the conflict is
/// swallowed, so two racing first reads converge on one row.
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Document>, AppError> {
    if let Some(document) = fetch_document(&state, project_id).await? {
        return Ok(Json(document));
    }

    sqlx::query(
        r#"
        INSERT INTO documents (project_id, user_id, title, content)
        VALUES ($1, $2, $3, '{}'::jsonb)
        ON CONFLICT (project_id) DO NOTHING
        "#,
    )
    .bind(project_id)
    .bind(params.user_id)
    .bind(DEFAULT_DOCUMENT_TITLE)
    .execute(&state.db)
    .await?;

    let document = fetch_document(&state, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document for project {project_id}")))?;
    Ok(Json(document))
}

async fn fetch_document(
    state: &AppState,
    project_id: Uuid,
) -> Result<Option<Document>, AppError> {
    let document: Option<Document> =
        sqlx::query_as("SELECT * FROM documents WHERE project_id = $1")
            .bind(project_id)
            .fetch_optional(&state.db)
            .await?;
    Ok(document)
}

#[derive(Deserialize)]
pub struct SaveDocumentRequest {
    pub content: Value,
}

/// PUT /api/v1/documents/:id
///
/// Replaces the content wholesale. No version check: last writer wins
/// across devices and tabs, by design. Debouncing happens in the caller
/// (see `documents::autosave`).
pub async fn handle_save_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(req): Json<SaveDocumentRequest>,
) -> Result<Json<Value>, AppError> {
    let result =
        sqlx::query("UPDATE documents SET content = $1, updated_at = NOW() WHERE id = $2")
            .bind(req.content)
            .bind(document_id)
            .execute(&state.db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Document {document_id} not found")));
    }

    Ok(Json(json!({ "saved": true })))
}

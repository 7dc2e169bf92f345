use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::billing::plan::can_create_project;
use crate::errors::AppError;
use crate::models::profile::Profile;
use crate::models::project::Project;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/projects?user_id= — most recently touched first.
pub async fn handle_list_projects(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects: Vec<Project> =
        sqlx::query_as("SELECT * FROM projects WHERE user_id = $1 ORDER BY updated_at DESC")
            .bind(params.user_id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(projects))
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub user_id: Uuid,
    pub title: String,
    pub subject_name: Option<String>,
    pub description: Option<String>,
}

/// POST /api/v1/projects
///
/// The plan gate is enforced here as well as in the UI: a free profile at
/// its project limit gets a quota error, not a new row.
pub async fn handle_create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }

    let profile: Option<Profile> = sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
        .bind(req.user_id)
        .fetch_optional(&state.db)
        .await?;
    let profile = profile.ok_or(AppError::Unauthorized)?;

    let project_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE user_id = $1")
            .bind(req.user_id)
            .fetch_one(&state.db)
            .await?;

    if !can_create_project(profile.is_pro(), project_count, profile.max_projects) {
        return Err(AppError::QuotaExceeded(
            "project limit reached for this plan".to_string(),
        ));
    }

    let project: Project = sqlx::query_as(
        r#"
        INSERT INTO projects (user_id, title, subject_name, description)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(req.user_id)
    .bind(req.title.trim())
    .bind(req.subject_name.as_deref().filter(|s| !s.trim().is_empty()))
    .bind(req.description.as_deref().filter(|s| !s.trim().is_empty()))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(project))
}

#[derive(Deserialize)]
pub struct UpdateProjectRequest {
    pub title: String,
}

/// PATCH /api/v1/projects/:id
pub async fn handle_update_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }

    let project: Option<Project> = sqlx::query_as(
        "UPDATE projects SET title = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(req.title.trim())
    .bind(project_id)
    .fetch_optional(&state.db)
    .await?;

    project
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
}

/// DELETE /api/v1/projects/:id
///
/// Audio objects go first, same discipline as single-recording deletion:
/// a storage failure aborts before any row disappears, so no object is
/// ever orphaned by a half-done cascade.
pub async fn handle_delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let audio_paths: Vec<(String,)> =
        sqlx::query_as("SELECT audio_path FROM recordings WHERE project_id = $1")
            .bind(project_id)
            .fetch_all(&state.db)
            .await?;

    for (path,) in &audio_paths {
        state
            .store
            .delete(&state.config.audio_bucket, path)
            .await?;
    }

    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(project_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Project {project_id} not found")));
    }

    Ok(Json(json!({ "deleted": true })))
}

#[derive(Serialize)]
pub struct ProjectStats {
    pub project_id: Uuid,
    pub recording_count: i64,
    pub total_duration_seconds: i64,
    pub word_count: usize,
}

/// GET /api/v1/projects/:id/stats
pub async fn handle_project_stats(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectStats>, AppError> {
    let (recording_count, total_duration_seconds): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(duration_seconds), 0)::bigint
        FROM recordings WHERE project_id = $1
        "#,
    )
    .bind(project_id)
    .fetch_one(&state.db)
    .await?;

    let content: Option<(Value,)> =
        sqlx::query_as("SELECT content FROM documents WHERE project_id = $1")
            .bind(project_id)
            .fetch_optional(&state.db)
            .await?;

    let word_count = content
        .map(|(value,)| count_words(&value))
        .unwrap_or(0);

    Ok(Json(ProjectStats {
        project_id,
        recording_count,
        total_duration_seconds,
        word_count,
    }))
}

/// Counts words in the editor's rich-text JSON by collecting every `text`
/// node's content.
fn count_words(node: &Value) -> usize {
    fn collect(node: &Value, out: &mut String) {
        if node.get("type").and_then(Value::as_str) == Some("text") {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push(' ');
                out.push_str(text);
            }
            return;
        }
        if let Some(children) = node.get("content").and_then(Value::as_array) {
            for child in children {
                collect(child, out);
            }
        }
    }

    let mut text = String::new();
    collect(node, &mut text);
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn word_count_walks_nested_rich_text() {
        let doc = json!({
            "type": "doc",
            "content": [
                { "type": "paragraph", "content": [
                    { "type": "text", "text": "Il est né en" },
                    { "type": "text", "text": "1932 à Lyon." }
                ]},
                { "type": "paragraph", "content": [
                    { "type": "text", "text": "Son frère aîné" }
                ]}
            ]
        });
        assert_eq!(count_words(&doc), 10);
    }

    #[test]
    fn empty_document_counts_zero_words() {
        assert_eq!(count_words(&json!({})), 0);
        assert_eq!(count_words(&json!({ "type": "doc", "content": [] })), 0);
    }
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::recording::TranscriptSearchHit;
use crate::state::AppState;

/// Queries shorter than this never hit the database.
const MIN_QUERY_CHARS: usize = 2;
const RESULT_CAP: i64 = 50;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// GET /api/v1/projects/:id/transcript-search?q=
pub async fn handle_transcript_search(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<TranscriptSearchHit>>, AppError> {
    let hits = search_transcripts(&state.db, project_id, &params.q).await?;
    Ok(Json(hits))
}

/// Case-insensitive substring search over segment text, scoped to the
/// recordings of one project, ordered by segment index, capped at 50 hits.
pub async fn search_transcripts(
    db: &PgPool,
    project_id: Uuid,
    query: &str,
) -> Result<Vec<TranscriptSearchHit>, AppError> {
    let needle = query.trim();
    if needle.chars().count() < MIN_QUERY_CHARS {
        return Ok(Vec::new());
    }

    let pattern = format!("%{}%", escape_like(needle));
    let hits: Vec<TranscriptSearchHit> = sqlx::query_as(
        r#"
        SELECT t.id, t.recording_id, r.name AS recording_name,
               t.segment_index, t.start_time, t.end_time, t.text
        FROM transcripts t
        JOIN recordings r ON r.id = t.recording_id
        WHERE r.project_id = $1 AND t.text ILIKE $2
        ORDER BY t.segment_index ASC
        LIMIT $3
        "#,
    )
    .bind(project_id)
    .bind(pattern)
    .bind(RESULT_CAP)
    .fetch_all(db)
    .await?;

    Ok(hits)
}

/// Escapes LIKE metacharacters so user input always matches literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queries_under_two_chars_return_empty_without_querying() {
        // The pool is lazy; a query against it would fail, so an Ok(empty)
        // result proves the short-circuit.
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();

        let hits = search_transcripts(&db, Uuid::new_v4(), "f").await.unwrap();
        assert!(hits.is_empty());

        let hits = search_transcripts(&db, Uuid::new_v4(), "  é  ").await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("fr%re"), "fr\\%re");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("frère"), "frère");
    }

    #[test]
    fn accented_query_counts_characters_not_bytes() {
        // "ét" is 2 chars (3 bytes); it must pass the length gate.
        assert_eq!("ét".chars().count(), MIN_QUERY_CHARS);
    }
}

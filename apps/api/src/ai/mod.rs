//! Writing tools: one OpenAI round trip each, JSON in, JSON out. The model
//! is asked for a `json_object` response and the reply is deserialized into
//! the endpoint's shape.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::openai::{prompts, ChatMessage, ChatOptions};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RephraseRequest {
    pub text: String,
    pub subject_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RephraseResponse {
    pub options: Vec<String>,
}

/// POST /api/v1/ai/rephrase — three alternative phrasings of a passage.
pub async fn handle_rephrase(
    State(state): State<AppState>,
    Json(req): Json<RephraseRequest>,
) -> Result<Json<RephraseResponse>, AppError> {
    let text = require_text(&req.text, "text")?;
    let response: RephraseResponse = state
        .openai
        .chat_json(
            &prompts::rephrase_system(req.subject_name.as_deref()),
            &[ChatMessage::new("user", text)],
            ChatOptions {
                temperature: 0.8,
                ..ChatOptions::default()
            },
        )
        .await
        .map_err(|e| AppError::upstream("rephrase", e.to_string()))?;
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct CondenseRequest {
    pub text: String,
    pub subject_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CondenseResponse {
    pub condensed: String,
}

/// POST /api/v1/ai/condense — a 20-40% shorter version of a passage.
pub async fn handle_condense(
    State(state): State<AppState>,
    Json(req): Json<CondenseRequest>,
) -> Result<Json<CondenseResponse>, AppError> {
    let text = require_text(&req.text, "text")?;
    let response: CondenseResponse = state
        .openai
        .chat_json(
            &prompts::condense_system(req.subject_name.as_deref()),
            &[ChatMessage::new("user", text)],
            ChatOptions {
                temperature: 0.5,
                ..ChatOptions::default()
            },
        )
        .await
        .map_err(|e| AppError::upstream("condense", e.to_string()))?;
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct ToProseRequest {
    pub transcript_text: String,
    pub subject_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ToProseResponse {
    pub prose: String,
}

/// POST /api/v1/ai/to-prose — turns an oral transcript excerpt into
/// third-person narrative prose.
pub async fn handle_to_prose(
    State(state): State<AppState>,
    Json(req): Json<ToProseRequest>,
) -> Result<Json<ToProseResponse>, AppError> {
    let text = require_text(&req.transcript_text, "transcript_text")?;
    let response: ToProseResponse = state
        .openai
        .chat_json(
            &prompts::to_prose_system(req.subject_name.as_deref()),
            &[ChatMessage::new("user", text)],
            ChatOptions {
                temperature: 0.7,
                max_tokens: 3000,
                ..ChatOptions::default()
            },
        )
        .await
        .map_err(|e| AppError::upstream("to-prose", e.to_string()))?;
    Ok(Json(response))
}

fn require_text<'a>(text: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        assert!(require_text("  ", "text").is_err());
        assert_eq!(require_text(" bonjour ", "text").unwrap(), "bonjour");
    }
}

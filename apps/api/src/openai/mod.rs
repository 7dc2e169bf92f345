/// OpenAI client — the single point of entry for all OpenAI calls in the
/// service, covering chat completions (co-writing assistant, writing tools)
/// and Whisper transcription.
///
/// ARCHITECTURAL RULE: no other module may call the OpenAI API directly.
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Chat model used everywhere. Hardcoded to prevent accidental drift.
pub const CHAT_MODEL: &str = "gpt-4o";
pub const WHISPER_MODEL: &str = "whisper-1";

/// Interviews are conducted in French; fixed language hint for Whisper.
const TRANSCRIPTION_LANGUAGE: &str = "fr";

#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("empty completion content")]
    EmptyContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// When set, requests `response_format: json_object`.
    pub json_response: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            json_response: false,
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Whisper `verbose_json` response, reduced to the fields we persist.
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperResponse {
    #[serde(default)]
    pub segments: Vec<WhisperSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhisperSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub avg_logprob: Option<f64>,
}

/// Seam for the transcription pipeline so tests can substitute a fake
/// speech-to-text service.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: Bytes, file_name: &str)
        -> Result<WhisperResponse, OpenAiError>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// One chat-completion round trip. Returns the assistant message text.
    pub async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        opts: ChatOptions,
    ) -> Result<String, OpenAiError> {
        let mut all_messages = Vec::with_capacity(messages.len() + 1);
        all_messages.push(ChatMessage::new("system", system));
        all_messages.extend(messages.iter().cloned());

        let request_body = CompletionRequest {
            model: CHAT_MODEL,
            messages: all_messages,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
            response_format: opts.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OpenAiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(OpenAiError::EmptyContent)?;

        debug!("chat completion succeeded ({} chars)", content.len());
        Ok(content)
    }

    /// Calls chat with `json_object` response format and deserializes the
    /// reply. The system prompt must instruct the model to answer in JSON.
    pub async fn chat_json<T: serde::de::DeserializeOwned>(
        &self,
        system: &str,
        messages: &[ChatMessage],
        opts: ChatOptions,
    ) -> Result<T, OpenAiError> {
        let opts = ChatOptions {
            json_response: true,
            ..opts
        };
        let text = self.chat(system, messages, opts).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    /// Submits an audio blob to Whisper requesting segment-level timestamps
    /// (`verbose_json`) with the fixed French language hint.
    async fn transcribe(
        &self,
        audio: Bytes,
        file_name: &str,
    ) -> Result<WhisperResponse, OpenAiError> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str("audio/webm")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", WHISPER_MODEL)
            .text("response_format", "verbose_json")
            .text("language", TRANSCRIPTION_LANGUAGE);

        let response = self
            .client
            .post(TRANSCRIPTIONS_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OpenAiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let transcription: WhisperResponse = response.json().await?;
        debug!(
            "transcription succeeded ({} segments)",
            transcription.segments.len()
        );
        Ok(transcription)
    }
}

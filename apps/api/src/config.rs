use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Panics at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub audio_bucket: String,
    pub attachments_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub openai_api_key: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    /// Base URL of the web app, used for checkout/portal redirects.
    pub site_url: String,
    pub port: u16,
    pub rust_log: String,
    pub plans: PlanConfig,
}

/// Plan limits are configuration, not logic. Defaults match the launched
/// pricing (free: 1 project / 2h of transcription, pro: 999 projects / 15h)
/// and can be overridden per environment.
#[derive(Debug, Clone, Copy)]
pub struct PlanConfig {
    pub free_max_projects: i32,
    pub free_max_transcription_seconds: i32,
    pub pro_max_projects: i32,
    pub pro_max_transcription_seconds: i32,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            free_max_projects: 1,
            free_max_transcription_seconds: 7200,
            pro_max_projects: 999,
            pro_max_transcription_seconds: 54000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            audio_bucket: require_env("AUDIO_BUCKET")?,
            attachments_bucket: require_env("ATTACHMENTS_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            stripe_secret_key: require_env("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: require_env("STRIPE_WEBHOOK_SECRET")?,
            site_url: std::env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            plans: PlanConfig {
                free_max_projects: env_or("FREE_MAX_PROJECTS", 1)?,
                free_max_transcription_seconds: env_or("FREE_MAX_TRANSCRIPTION_SECONDS", 7200)?,
                pro_max_projects: env_or("PRO_MAX_PROJECTS", 999)?,
                pro_max_transcription_seconds: env_or("PRO_MAX_TRANSCRIPTION_SECONDS", 54000)?,
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: i32) -> Result<i32> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<i32>()
            .with_context(|| format!("'{key}' must be an integer")),
        Err(_) => Ok(default),
    }
}

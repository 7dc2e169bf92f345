//! Stripe webhook: signature verification and plan updates.
//!
//! Events may be delivered more than once; every branch is a pure
//! set-to-target-state update, so re-applying any event is harmless.

use axum::{extract::State, http::HeaderMap, Json};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use crate::billing::plan::PlanLimits;
use crate::errors::AppError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed age of a signed payload, per Stripe's guidance.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq)]
pub enum SignatureError {
    MalformedHeader,
    StaleTimestamp,
    NoMatchingSignature,
}

/// Verifies a `stripe-signature` header (`t=<unix>,v1=<hex>[,v1=...]`)
/// against the raw request body: HMAC-SHA256 of `"{t}.{body}"` keyed with
/// the endpoint secret, compared in constant time.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if (now_unix - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    let payload = format!("{timestamp}.{body}");
    for candidate in &candidates {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::MalformedHeader)?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }
    Err(SignatureError::NoMatchingSignature)
}

/// The profile mutation an event maps to. `Ignore` covers unknown event
/// types and events whose subscription status needs no plan change.
#[derive(Debug, PartialEq)]
pub enum PlanUpdate {
    UpgradeToPro { subscription_id: Option<String> },
    MarkPastDue,
    DowngradeToFree { clear_subscription_id: bool },
    Ignore,
}

pub fn plan_update_for(event_type: &str, event_object: &Value) -> PlanUpdate {
    match event_type {
        "checkout.session.completed" => PlanUpdate::UpgradeToPro {
            subscription_id: event_object
                .get("subscription")
                .and_then(Value::as_str)
                .map(String::from),
        },
        "customer.subscription.updated" => {
            match event_object.get("status").and_then(Value::as_str) {
                Some("active") => PlanUpdate::UpgradeToPro {
                    subscription_id: None,
                },
                Some("past_due") => PlanUpdate::MarkPastDue,
                Some("canceled") | Some("unpaid") => PlanUpdate::DowngradeToFree {
                    clear_subscription_id: false,
                },
                _ => PlanUpdate::Ignore,
            }
        }
        "customer.subscription.deleted" => PlanUpdate::DowngradeToFree {
            clear_subscription_id: true,
        },
        _ => PlanUpdate::Ignore,
    }
}

/// POST /api/v1/billing/webhook
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("missing stripe-signature header".to_string()))?;

    verify_signature(
        &state.config.stripe_webhook_secret,
        signature,
        &body,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| AppError::Validation(format!("invalid webhook signature: {e:?}")))?;

    let event: Value = serde_json::from_str(&body)
        .map_err(|e| AppError::Validation(format!("invalid webhook payload: {e}")))?;

    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let object = event
        .pointer("/data/object")
        .cloned()
        .unwrap_or(Value::Null);

    // Events without our user id in metadata are acknowledged and skipped:
    // a delivery retry cannot fix them, so failing would only cause churn.
    let user_id = object
        .pointer("/metadata/user_id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok());

    match (user_id, plan_update_for(&event_type, &object)) {
        (_, PlanUpdate::Ignore) => {
            tracing::debug!("ignoring webhook event type {event_type}");
        }
        (None, _) => {
            tracing::warn!("webhook event {event_type} carries no user_id metadata");
        }
        (Some(user_id), update) => {
            apply_plan_update(&state, user_id, update).await?;
            tracing::info!("applied {event_type} for user {user_id}");
        }
    }

    Ok(Json(json!({ "received": true })))
}

async fn apply_plan_update(
    state: &AppState,
    user_id: Uuid,
    update: PlanUpdate,
) -> Result<(), AppError> {
    let plans = &state.config.plans;
    match update {
        PlanUpdate::UpgradeToPro { subscription_id } => {
            let PlanLimits {
                max_projects,
                max_transcription_seconds,
            } = plans.pro_limits();
            sqlx::query(
                r#"
                UPDATE profiles
                SET plan = 'pro',
                    subscription_status = 'active',
                    subscription_id = COALESCE($1, subscription_id),
                    max_projects = $2,
                    max_transcription_seconds = $3,
                    updated_at = NOW()
                WHERE id = $4
                "#,
            )
            .bind(subscription_id)
            .bind(max_projects)
            .bind(max_transcription_seconds)
            .bind(user_id)
            .execute(&state.db)
            .await?;
        }
        PlanUpdate::MarkPastDue => {
            sqlx::query(
                "UPDATE profiles SET subscription_status = 'past_due', updated_at = NOW() WHERE id = $1",
            )
            .bind(user_id)
            .execute(&state.db)
            .await?;
        }
        PlanUpdate::DowngradeToFree {
            clear_subscription_id,
        } => {
            let PlanLimits {
                max_projects,
                max_transcription_seconds,
            } = plans.free_limits();
            sqlx::query(
                r#"
                UPDATE profiles
                SET plan = 'free',
                    subscription_status = 'canceled',
                    subscription_id = CASE WHEN $1 THEN NULL ELSE subscription_id END,
                    max_projects = $2,
                    max_transcription_seconds = $3,
                    updated_at = NOW()
                WHERE id = $4
                "#,
            )
            .bind(clear_subscription_id)
            .bind(max_projects)
            .bind(max_transcription_seconds)
            .bind(user_id)
            .execute(&state.db)
            .await?;
        }
        PlanUpdate::Ignore => {}
    }
    Ok(())
}

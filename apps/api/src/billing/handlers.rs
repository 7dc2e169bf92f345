use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::billing::plan::SubscriptionSummary;
use crate::errors::AppError;
use crate::models::profile::Profile;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/subscription?user_id= — the derived gate summary.
pub async fn handle_subscription(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<SubscriptionSummary>, AppError> {
    let profile = load_profile(&state, params.user_id).await?;
    let project_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE user_id = $1")
            .bind(params.user_id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(SubscriptionSummary::derive(&profile, project_count)))
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub price_id: String,
}

#[derive(Serialize)]
pub struct SessionUrlResponse {
    pub url: String,
}

/// POST /api/v1/billing/checkout
///
/// Ensures a Stripe customer exists for the profile, then opens a
/// subscription-mode checkout session and returns its URL.
pub async fn handle_create_checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<SessionUrlResponse>, AppError> {
    if req.price_id.trim().is_empty() {
        return Err(AppError::Validation("price_id is required".to_string()));
    }

    let profile = load_profile(&state, req.user_id).await?;

    let customer_id = match profile.stripe_customer_id {
        Some(id) => id,
        None => {
            let id = state
                .stripe
                .create_customer(&profile.email, req.user_id)
                .await?;
            sqlx::query(
                "UPDATE profiles SET stripe_customer_id = $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(&id)
            .bind(req.user_id)
            .execute(&state.db)
            .await?;
            id
        }
    };

    let url = state
        .stripe
        .create_checkout_session(
            &customer_id,
            &req.price_id,
            &state.config.site_url,
            req.user_id,
        )
        .await?;

    Ok(Json(SessionUrlResponse { url }))
}

#[derive(Deserialize)]
pub struct PortalRequest {
    pub user_id: Uuid,
}

/// POST /api/v1/billing/portal
pub async fn handle_create_portal(
    State(state): State<AppState>,
    Json(req): Json<PortalRequest>,
) -> Result<Json<SessionUrlResponse>, AppError> {
    let profile = load_profile(&state, req.user_id).await?;
    let customer_id = profile
        .stripe_customer_id
        .ok_or_else(|| AppError::NotFound("No Stripe customer for this profile".to_string()))?;

    let url = state
        .stripe
        .create_portal_session(&customer_id, &state.config.site_url)
        .await?;

    Ok(Json(SessionUrlResponse { url }))
}

/// GET /api/v1/profile?user_id=
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Profile>, AppError> {
    let profile = load_profile(&state, params.user_id).await?;
    Ok(Json(profile))
}

async fn load_profile(state: &AppState, user_id: Uuid) -> Result<Profile, AppError> {
    let profile: Option<Profile> = sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?;
    profile.ok_or(AppError::Unauthorized)
}

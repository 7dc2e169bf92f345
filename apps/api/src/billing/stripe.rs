/// Stripe client — the single point of entry for all Stripe API calls.
/// Talks to the REST API directly with form-encoded bodies; no SDK.
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            secret_key,
        }
    }

    async fn post_form(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, AppError> {
        let response = self
            .client
            .post(format!("{STRIPE_API_URL}{endpoint}"))
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("stripe request failed: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("stripe response unreadable: {e}")))?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown Stripe error");
            return Err(AppError::Payment(format!("stripe {status}: {message}")));
        }

        Ok(body)
    }

    /// Creates a customer carrying our user id in its metadata, so webhook
    /// events can be routed back to the profile.
    pub async fn create_customer(&self, email: &str, user_id: Uuid) -> Result<String, AppError> {
        let user_id = user_id.to_string();
        let body = self
            .post_form(
                "/customers",
                &[("email", email), ("metadata[user_id]", &user_id)],
            )
            .await?;

        body.get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| AppError::Payment("customer response missing id".to_string()))
    }

    /// Subscription-mode checkout session; the user id rides along on both
    /// the session and the subscription it creates.
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        site_url: &str,
        user_id: Uuid,
    ) -> Result<String, AppError> {
        let user_id = user_id.to_string();
        let success_url = format!("{site_url}/dashboard?checkout=success");
        let cancel_url = format!("{site_url}/dashboard?checkout=cancel");

        let body = self
            .post_form(
                "/checkout/sessions",
                &[
                    ("customer", customer_id),
                    ("line_items[0][price]", price_id),
                    ("line_items[0][quantity]", "1"),
                    ("mode", "subscription"),
                    ("success_url", &success_url),
                    ("cancel_url", &cancel_url),
                    ("metadata[user_id]", &user_id),
                    ("subscription_data[metadata][user_id]", &user_id),
                ],
            )
            .await?;

        session_url(&body)
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        site_url: &str,
    ) -> Result<String, AppError> {
        let return_url = format!("{site_url}/settings");
        let body = self
            .post_form(
                "/billing_portal/sessions",
                &[("customer", customer_id), ("return_url", &return_url)],
            )
            .await?;

        session_url(&body)
    }
}

fn session_url(body: &Value) -> Result<String, AppError> {
    body.get("url")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| AppError::Payment("session response missing url".to_string()))
}

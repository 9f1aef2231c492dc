use super::{
    CheckoutSession, CheckoutSessionDetails, CheckoutSessionRequest, PaymentProvider,
    SHIPPING_ADDRESS_METADATA_KEY,
};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Hosted checkout client for the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            config.payment_api_base.clone(),
            config.payment_secret_key.clone(),
            config.payment_timeout(),
        )
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.api_base)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Payment provider rejected {}: {}", what, body);
            return Err(ServiceError::ExternalServiceError(format!(
                "payment provider returned {} for {}",
                status, what
            )));
        }

        response.json::<T>().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!(
                "unreadable payment provider response for {}: {}",
                what, e
            ))
        })
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::ExternalServiceError("payment provider timed out".to_string())
    } else {
        ServiceError::ExternalServiceError(format!("payment provider unreachable: {}", err))
    }
}

fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        (
            "line_items[0][price_data][currency]".into(),
            request.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".into(),
            request.unit_amount.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".into(),
            request.product_name.clone(),
        ),
        ("line_items[0][quantity]".into(), "1".into()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
        ("customer_email".into(), request.customer_email.clone()),
        ("client_reference_id".into(), request.cart_id.to_string()),
        (
            format!("metadata[{}]", SHIPPING_ADDRESS_METADATA_KEY),
            request.shipping_address.clone(),
        ),
    ]
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self, request), fields(cart_id = %request.cart_id))]
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let response = self
            .client
            .post(self.sessions_url())
            .basic_auth(&self.secret_key, Some(""))
            .form(&session_form(&request))
            .send()
            .await
            .map_err(transport_error)?;

        let session: CheckoutSession = Self::read_json(response, "session creation").await?;
        info!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, ServiceError> {
        if session_id.is_empty() || !session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ServiceError::ValidationError(
                "malformed session reference".to_string(),
            ));
        }

        let response = self
            .client
            .get(format!("{}/{}", self.sessions_url(), session_id))
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!(
                "checkout session {}",
                session_id
            )));
        }

        Self::read_json(response, "session retrieval").await
    }
}

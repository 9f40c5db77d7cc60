use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{RequestHandler, Service, ServiceError};
use crate::models::checkout::{mask_email, NewCheckout};
use crate::repositories::stripe::StripeApi;
use crate::settings::Stripe;

pub enum CheckoutRequest {
    CreateSession {
        request: NewCheckout,
        origin: Option<String>,
        response: oneshot::Sender<Result<String, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct CheckoutRequestHandler {
    stripe: Arc<StripeApi>,
    default_origin: String,
    min_response_time: Duration,
}

/// Sleeps until at least `min` has passed since `started`.
pub async fn pad_response_time(started: Instant, min: Duration) {
    let elapsed = started.elapsed();
    if elapsed < min {
        tokio::time::sleep(min - elapsed).await;
    }
}

impl CheckoutRequestHandler {
    pub fn new(settings: Stripe) -> Self {
        CheckoutRequestHandler {
            stripe: Arc::new(StripeApi::new(settings.secret_key, settings.api_url)),
            default_origin: settings.default_origin,
            min_response_time: Duration::from_millis(settings.min_response_ms),
        }
    }

    async fn create_session(
        &self,
        request: &NewCheckout,
        origin: Option<&str>,
    ) -> Result<String, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::Checkout(e.to_string()))?;

        log::info!(
            "Processing checkout for email {}.",
            mask_email(&request.email)
        );

        let customer_id = self
            .stripe
            .find_customer(&request.email)
            .await
            .map_err(|e| ServiceError::Checkout(e.to_string()))?;
        match &customer_id {
            Some(customer_id) => log::debug!("Found existing Stripe customer {}.", customer_id),
            None => log::debug!("No Stripe customer yet, checkout will create one."),
        }

        let origin = origin.unwrap_or(&self.default_origin);
        let session = self
            .stripe
            .create_checkout_session(
                request.price_id.trim(),
                customer_id.as_deref(),
                &request.email,
                origin,
            )
            .await
            .map_err(|e| ServiceError::Checkout(e.to_string()))?;

        log::info!("Checkout session {} created.", session.id);
        session
            .url
            .ok_or_else(|| ServiceError::Checkout("Stripe returned no session url".to_string()))
    }
}

#[async_trait]
impl RequestHandler<CheckoutRequest> for CheckoutRequestHandler {
    async fn handle_request(&self, request: CheckoutRequest) {
        match request {
            CheckoutRequest::CreateSession {
                request,
                origin,
                response,
            } => {
                let started = Instant::now();
                let result = self.create_session(&request, origin.as_deref()).await;
                if let Err(e) = &result {
                    log::error!("Checkout failed: {}", e);
                }

                pad_response_time(started, self.min_response_time).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct CheckoutService;

impl CheckoutService {
    pub fn new() -> Self {
        CheckoutService {}
    }
}

#[async_trait]
impl Service<CheckoutRequest, CheckoutRequestHandler> for CheckoutService {}

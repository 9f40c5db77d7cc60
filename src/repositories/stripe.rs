use anyhow::bail;
use serde::Deserialize;

use crate::models::checkout::CheckoutSession;

const STRIPE_API_VERSION: &str = "2025-08-27.basil";

#[derive(Debug, Deserialize)]
struct CustomerList {
    data: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

pub struct StripeApi {
    secret_key: String,
    url: String,
    client: reqwest::Client,
}

impl StripeApi {
    pub fn new(secret_key: String, url: String) -> Self {
        Self {
            secret_key,
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn find_customer(&self, email: &str) -> Result<Option<String>, anyhow::Error> {
        let response = self
            .client
            .get(format!("{}/v1/customers", self.url))
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Stripe: customer lookup failed with {}.", response.status());
        }

        let customers: CustomerList = response.json().await?;
        Ok(customers.data.into_iter().next().map(|customer| customer.id))
    }

    /// Creates a single-item subscription checkout. Existing customers are
    /// attached by id, new ones by email.
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: Option<&str>,
        email: &str,
        origin: &str,
    ) -> Result<CheckoutSession, anyhow::Error> {
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "success_url",
                format!("{}/pricing?subscription=success", origin),
            ),
            (
                "cancel_url",
                format!("{}/pricing?subscription=cancelled", origin),
            ),
        ];
        match customer_id {
            Some(customer_id) => form.push(("customer", customer_id.to_string())),
            None => form.push(("customer_email", email.to_string())),
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.url))
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Stripe: session creation failed with {}: {}", status, body);
        }

        let session: CheckoutSession = response.json().await?;
        Ok(session)
    }
}

/// Minimal in-process Stripe for tests: a customer table and recorded requests.
#[cfg(test)]
pub mod stub {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Form, Query, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    pub const REJECTED_PRICE: &str = "price_rejected";

    #[derive(Clone, Default)]
    pub struct Recorded {
        customers: Arc<HashMap<String, String>>,
        pub lookups: Arc<Mutex<Vec<HashMap<String, String>>>>,
        pub sessions: Arc<Mutex<Vec<HashMap<String, String>>>>,
    }

    pub struct StubStripe {
        pub url: String,
        pub recorded: Recorded,
    }

    impl StubStripe {
        pub fn lookups(&self) -> Vec<HashMap<String, String>> {
            self.recorded.lookups.lock().unwrap().clone()
        }

        pub fn sessions(&self) -> Vec<HashMap<String, String>> {
            self.recorded.sessions.lock().unwrap().clone()
        }
    }

    async fn list_customers(
        State(recorded): State<Recorded>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let data: Vec<Value> = query
            .get("email")
            .and_then(|email| recorded.customers.get(email))
            .map(|id| json!({ "id": id }))
            .into_iter()
            .collect();
        recorded.lookups.lock().unwrap().push(query);

        Json(json!({ "data": data }))
    }

    async fn create_session(
        State(recorded): State<Recorded>,
        Form(form): Form<HashMap<String, String>>,
    ) -> Result<Json<Value>, StatusCode> {
        if form.get("line_items[0][price]").map(String::as_str) == Some(REJECTED_PRICE) {
            return Err(StatusCode::BAD_REQUEST);
        }

        let mut sessions = recorded.sessions.lock().unwrap();
        sessions.push(form);
        let id = format!("cs_test_{}", sessions.len());

        Ok(Json(json!({
            "id": id,
            "url": format!("https://checkout.stripe.test/pay/{}", id),
        })))
    }

    pub async fn start(customers: &[(&str, &str)]) -> StubStripe {
        let recorded = Recorded {
            customers: Arc::new(
                customers
                    .iter()
                    .map(|(email, id)| (email.to_string(), id.to_string()))
                    .collect(),
            ),
            ..Default::default()
        };

        let app = Router::new()
            .route("/v1/customers", get(list_customers))
            .route("/v1/checkout/sessions", post(create_session))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        StubStripe { url, recorded }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::{self, REJECTED_PRICE};
    use super::*;

    #[tokio::test]
    async fn existing_customer_is_attached_by_id() {
        let stripe = stub::start(&[("ana@example.com", "cus_ana")]).await;
        let api = StripeApi::new("sk_test".to_string(), format!("{}/", stripe.url));

        let customer = api.find_customer("ana@example.com").await.unwrap();
        assert_eq!(customer.as_deref(), Some("cus_ana"));

        let lookup = &stripe.lookups()[0];
        assert_eq!(lookup["email"], "ana@example.com");
        assert_eq!(lookup["limit"], "1");

        let session = api
            .create_checkout_session("price_pro", customer.as_deref(), "ana@example.com", "https://gami.app")
            .await
            .unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert_eq!(
            session.url.as_deref(),
            Some("https://checkout.stripe.test/pay/cs_test_1")
        );

        let form = &stripe.sessions()[0];
        assert_eq!(form["mode"], "subscription");
        assert_eq!(form["line_items[0][price]"], "price_pro");
        assert_eq!(form["line_items[0][quantity]"], "1");
        assert_eq!(form["customer"], "cus_ana");
        assert!(!form.contains_key("customer_email"));
        assert_eq!(form["success_url"], "https://gami.app/pricing?subscription=success");
        assert_eq!(form["cancel_url"], "https://gami.app/pricing?subscription=cancelled");
    }

    #[tokio::test]
    async fn new_customer_is_attached_by_email() {
        let stripe = stub::start(&[]).await;
        let api = StripeApi::new("sk_test".to_string(), stripe.url.clone());

        let customer = api.find_customer("new@example.com").await.unwrap();
        assert_eq!(customer, None);

        api.create_checkout_session("price_pro", None, "new@example.com", "http://localhost:8080")
            .await
            .unwrap();

        let form = &stripe.sessions()[0];
        assert_eq!(form["customer_email"], "new@example.com");
        assert!(!form.contains_key("customer"));
    }

    #[tokio::test]
    async fn refused_session_is_an_error() {
        let stripe = stub::start(&[]).await;
        let api = StripeApi::new("sk_test".to_string(), stripe.url.clone());

        let result = api
            .create_checkout_session(REJECTED_PRICE, None, "new@example.com", "http://localhost:8080")
            .await;

        assert!(result.is_err());
        assert!(stripe.sessions().is_empty());
    }
}

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use dashmap::DashSet;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use super::{auth::Authenticator, users::UserRequest, ServiceChannels, ServiceError};
use crate::models::{
    users::{AppRole, AuthUser},
    Rejection,
};

mod access_codes;
mod business;
mod checkout;
mod quests;
mod users;
mod wallets;

const CHECKOUT_FAILURE: &str = "Unable to create checkout session. Please try again.";

#[derive(Clone)]
pub struct AppState {
    channels: ServiceChannels,
    authenticator: Arc<dyn Authenticator>,
    provisioned: Arc<DashSet<Uuid>>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServiceError::Rejected(rejection @ Rejection::InsufficientXp { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, rejection.to_string())
            }
            ServiceError::Rejected(rejection) if rejection.is_conflict() => {
                (StatusCode::CONFLICT, rejection.to_string())
            }
            ServiceError::Rejected(rejection) if rejection.is_forbidden() => {
                (StatusCode::FORBIDDEN, rejection.to_string())
            }
            ServiceError::Rejected(rejection) => (StatusCode::BAD_REQUEST, rejection.to_string()),
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServiceError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServiceError::Checkout(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, CHECKOUT_FAILURE.to_string())
            }
            _ => {
                log::error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Sends a request to a service and waits for its reply.
async fn dispatch<R, T, F>(channel: &mpsc::Sender<R>, request: F) -> Result<T, ServiceError>
where
    F: FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
{
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ServiceError::Communication("HTTP".to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication("HTTP".to_string(), e.to_string()))?
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated caller, provisioned on first sight.
pub struct CurrentUser(pub AuthUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ServiceError::Unauthorized)?;
        let user = state.authenticator.authenticate(token).await?;

        if !state.provisioned.contains(&user.id) {
            let provisioning = user.clone();
            dispatch(&state.channels.users, |response| UserRequest::ProvisionUser {
                user: provisioning,
                response,
            })
            .await?;
            state.provisioned.insert(user.id);
        }

        Ok(CurrentUser(user))
    }
}

async fn require_any_role(
    state: &AppState,
    user_id: Uuid,
    roles: &[AppRole],
) -> Result<(), ServiceError> {
    for &role in roles {
        let granted = dispatch(&state.channels.users, |response| UserRequest::HasRole {
            user_id,
            role,
            response,
        })
        .await?;
        if granted {
            return Ok(());
        }
    }

    Err(ServiceError::Forbidden(format!("{} role required", roles[0])))
}

/// A caller holding the business or admin role.
pub struct BusinessUser(pub AuthUser);

impl FromRequestParts<AppState> for BusinessUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        require_any_role(state, user.id, &[AppRole::Business, AppRole::Admin]).await?;
        Ok(BusinessUser(user))
    }
}

pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        require_any_role(state, user.id, &[AppRole::Admin]).await?;
        Ok(AdminUser(user))
    }
}

pub fn router(channels: ServiceChannels, authenticator: Arc<dyn Authenticator>) -> Router {
    let app_state = AppState {
        channels,
        authenticator,
        provisioned: Arc::new(DashSet::new()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("apikey"),
            header::HeaderName::from_static("x-client-info"),
        ]);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/me", get(users::get_me))
        .route("/me/quests", get(quests::list_participations))
        .route("/wallet", get(wallets::get_wallet))
        .route(
            "/wallet/address",
            post(wallets::generate_address).put(wallets::link_address),
        )
        .route("/wallet/transactions", get(wallets::list_transactions))
        .route("/airdrop", get(wallets::get_airdrop))
        .route("/rewards/redeem", post(wallets::redeem_reward))
        .route("/quests", get(quests::list_active))
        .route("/quests/{id}", get(quests::get_quest))
        .route("/quests/{id}/join", post(quests::join_quest))
        .route("/participants/{id}/claim", post(quests::claim_reward))
        .route("/access-codes/redeem", post(access_codes::redeem_code))
        .route("/checkout", post(checkout::create_checkout))
        .route(
            "/business/quests",
            get(business::list_quests).post(business::create_quest),
        )
        .route("/business/quests/{id}/status", put(business::update_status))
        .route(
            "/business/quests/{id}/participants",
            get(business::list_participants),
        )
        .route(
            "/business/participants/{id}/progress",
            put(business::update_progress),
        )
        .route(
            "/admin/access-codes",
            get(access_codes::list_codes).post(access_codes::generate_code),
        )
        .route(
            "/admin/access-codes/{id}/activate",
            post(access_codes::activate_code),
        )
        .route(
            "/admin/access-codes/{id}/deactivate",
            post(access_codes::deactivate_code),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listener: tokio::net::TcpListener,
    channels: ServiceChannels,
    authenticator: Arc<dyn Authenticator>,
) -> Result<(), anyhow::Error> {
    let app = router(channels, authenticator);

    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn origin_header(value: Option<&HeaderValue>) -> Option<String> {
    value
        .and_then(|origin| origin.to_str().ok())
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
}

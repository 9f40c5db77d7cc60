use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde_json::{json, Value};

use super::{dispatch, origin_header, AppState, CurrentUser};
use crate::models::checkout::NewCheckout;
use crate::services::{checkout::CheckoutRequest, ServiceError};

pub async fn create_checkout(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    headers: HeaderMap,
    Json(request): Json<NewCheckout>,
) -> Result<Json<Value>, ServiceError> {
    let origin = origin_header(headers.get(header::ORIGIN));

    let url = dispatch(&state.channels.checkout, |response| {
        CheckoutRequest::CreateSession {
            request,
            origin,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "url": url })))
}

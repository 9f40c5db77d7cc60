use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{dispatch, AdminUser, AppState, CurrentUser};
use crate::models::access_codes::{
    AccessCode, AccessCodeSummary, GenerateAccessCode, RedeemAccessCode,
};
use crate::services::{access_codes::AccessCodeRequest, ServiceError};

pub async fn redeem_code(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(redeem): Json<RedeemAccessCode>,
) -> Result<Json<Value>, ServiceError> {
    let redemption = dispatch(&state.channels.access_codes, |response| {
        AccessCodeRequest::Redeem {
            user_id: user.id,
            code: redeem.code,
            response,
        }
    })
    .await?;

    Ok(Json(json!({ "valid": true, "tier": redemption.tier })))
}

pub async fn list_codes(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<AccessCodeSummary>>, ServiceError> {
    let codes = dispatch(&state.channels.access_codes, |response| {
        AccessCodeRequest::List { response }
    })
    .await?;

    Ok(Json(codes))
}

pub async fn generate_code(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<GenerateAccessCode>,
) -> Result<(StatusCode, Json<AccessCode>), ServiceError> {
    let code = dispatch(&state.channels.access_codes, |response| {
        AccessCodeRequest::Generate {
            admin_id: admin.id,
            request,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(code)))
}

async fn set_active(state: &AppState, code_id: Uuid, active: bool) -> Result<AccessCode, ServiceError> {
    dispatch(&state.channels.access_codes, |response| {
        AccessCodeRequest::SetActive {
            code_id,
            active,
            response,
        }
    })
    .await
}

pub async fn activate_code(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(code_id): Path<Uuid>,
) -> Result<Json<AccessCode>, ServiceError> {
    Ok(Json(set_active(&state, code_id, true).await?))
}

pub async fn deactivate_code(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(code_id): Path<Uuid>,
) -> Result<Json<AccessCode>, ServiceError> {
    Ok(Json(set_active(&state, code_id, false).await?))
}

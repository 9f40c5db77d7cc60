use axum::{extract::State, Json};

use super::{dispatch, AppState, CurrentUser};
use crate::models::users::UserOverview;
use crate::services::{users::UserRequest, ServiceError};

pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserOverview>, ServiceError> {
    let overview = dispatch(&state.channels.users, |response| UserRequest::GetOverview {
        user_id: user.id,
        response,
    })
    .await?;

    Ok(Json(overview))
}

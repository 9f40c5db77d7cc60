use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{dispatch, AppState, CurrentUser};
use crate::models::quests::{ClaimReceipt, ClaimReward, Quest, QuestParticipant};
use crate::services::{quests::QuestRequest, ServiceError};

pub async fn list_active(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<Quest>>, ServiceError> {
    let quests = dispatch(&state.channels.quests, |response| QuestRequest::ListActive {
        response,
    })
    .await?;

    Ok(Json(quests))
}

pub async fn get_quest(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(quest_id): Path<Uuid>,
) -> Result<Json<Quest>, ServiceError> {
    let quest = dispatch(&state.channels.quests, |response| QuestRequest::GetQuest {
        quest_id,
        response,
    })
    .await?;

    Ok(Json(quest))
}

pub async fn join_quest(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quest_id): Path<Uuid>,
) -> Result<(StatusCode, Json<QuestParticipant>), ServiceError> {
    let participant = dispatch(&state.channels.quests, |response| QuestRequest::Join {
        quest_id,
        user_id: user.id,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn list_participations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<QuestParticipant>>, ServiceError> {
    let participations = dispatch(&state.channels.quests, |response| {
        QuestRequest::ListParticipations {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(participations))
}

pub async fn claim_reward(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(participant_id): Path<Uuid>,
    Json(claim): Json<ClaimReward>,
) -> Result<Json<ClaimReceipt>, ServiceError> {
    let receipt = dispatch(&state.channels.quests, |response| QuestRequest::ClaimReward {
        participant_id,
        user_id: user.id,
        expected_reward: claim.expected_reward,
        response,
    })
    .await?;

    Ok(Json(receipt))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{dispatch, AppState, BusinessUser};
use crate::models::quests::{NewQuest, Quest, QuestParticipant, UpdateProgress, UpdateQuestStatus};
use crate::services::{quests::QuestRequest, ServiceError};

pub async fn list_quests(
    State(state): State<AppState>,
    BusinessUser(business): BusinessUser,
) -> Result<Json<Vec<Quest>>, ServiceError> {
    let quests = dispatch(&state.channels.quests, |response| {
        QuestRequest::ListBusinessQuests {
            business_id: business.id,
            response,
        }
    })
    .await?;

    Ok(Json(quests))
}

pub async fn create_quest(
    State(state): State<AppState>,
    BusinessUser(business): BusinessUser,
    Json(quest): Json<NewQuest>,
) -> Result<(StatusCode, Json<Quest>), ServiceError> {
    let quest = dispatch(&state.channels.quests, |response| QuestRequest::CreateQuest {
        business_id: business.id,
        quest,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(quest)))
}

pub async fn update_status(
    State(state): State<AppState>,
    BusinessUser(business): BusinessUser,
    Path(quest_id): Path<Uuid>,
    Json(update): Json<UpdateQuestStatus>,
) -> Result<Json<Quest>, ServiceError> {
    let quest = dispatch(&state.channels.quests, |response| QuestRequest::UpdateStatus {
        quest_id,
        business_id: business.id,
        status: update.status,
        response,
    })
    .await?;

    Ok(Json(quest))
}

pub async fn list_participants(
    State(state): State<AppState>,
    BusinessUser(business): BusinessUser,
    Path(quest_id): Path<Uuid>,
) -> Result<Json<Vec<QuestParticipant>>, ServiceError> {
    let participants = dispatch(&state.channels.quests, |response| {
        QuestRequest::ListParticipants {
            quest_id,
            business_id: business.id,
            response,
        }
    })
    .await?;

    Ok(Json(participants))
}

pub async fn update_progress(
    State(state): State<AppState>,
    BusinessUser(business): BusinessUser,
    Path(participant_id): Path<Uuid>,
    Json(update): Json<UpdateProgress>,
) -> Result<Json<QuestParticipant>, ServiceError> {
    let participant = dispatch(&state.channels.quests, |response| {
        QuestRequest::UpdateProgress {
            participant_id,
            business_id: business.id,
            progress: update.progress,
            response,
        }
    })
    .await?;

    Ok(Json(participant))
}

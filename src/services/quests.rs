use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError};
use crate::models::quests::{ClaimReceipt, NewQuest, Quest, QuestParticipant, QuestStatus};
use crate::repositories::quests::QuestRepository;
use crate::repositories::RepositoryError;

type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

pub enum QuestRequest {
    CreateQuest {
        business_id: Uuid,
        quest: NewQuest,
        response: Reply<Quest>,
    },
    ListActive {
        response: Reply<Vec<Quest>>,
    },
    GetQuest {
        quest_id: Uuid,
        response: Reply<Quest>,
    },
    ListBusinessQuests {
        business_id: Uuid,
        response: Reply<Vec<Quest>>,
    },
    UpdateStatus {
        quest_id: Uuid,
        business_id: Uuid,
        status: QuestStatus,
        response: Reply<Quest>,
    },
    Join {
        quest_id: Uuid,
        user_id: Uuid,
        response: Reply<QuestParticipant>,
    },
    ListParticipations {
        user_id: Uuid,
        response: Reply<Vec<QuestParticipant>>,
    },
    ListParticipants {
        quest_id: Uuid,
        business_id: Uuid,
        response: Reply<Vec<QuestParticipant>>,
    },
    UpdateProgress {
        participant_id: Uuid,
        business_id: Uuid,
        progress: i32,
        response: Reply<QuestParticipant>,
    },
    ClaimReward {
        participant_id: Uuid,
        user_id: Uuid,
        expected_reward: i64,
        response: Reply<ClaimReceipt>,
    },
}

#[derive(Clone)]
pub struct QuestRequestHandler {
    repository: Arc<dyn QuestRepository>,
}

fn repository_error(e: RepositoryError) -> ServiceError {
    ServiceError::from_repository("QuestService", e)
}

impl QuestRequestHandler {
    pub fn new(repository: Arc<dyn QuestRepository>) -> Self {
        QuestRequestHandler { repository }
    }

    async fn create_quest(&self, business_id: Uuid, new_quest: NewQuest) -> Result<Quest, ServiceError> {
        new_quest.validate()?;

        let quest = Quest::from_new(business_id, new_quest, Utc::now());
        let quest = self
            .repository
            .create_quest(&quest)
            .await
            .map_err(repository_error)?;

        log::info!(
            "Business {} created quest {} ({}).",
            business_id,
            quest.id,
            quest.status
        );
        Ok(quest)
    }

    async fn get_quest(&self, quest_id: Uuid) -> Result<Quest, ServiceError> {
        self.repository
            .get_quest(quest_id)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| ServiceError::NotFound("Quest".to_string()))
    }

    async fn claim_reward(
        &self,
        participant_id: Uuid,
        user_id: Uuid,
        expected_reward: i64,
    ) -> Result<ClaimReceipt, ServiceError> {
        let receipt = self
            .repository
            .claim_reward(participant_id, user_id, expected_reward, Utc::now())
            .await
            .map_err(repository_error)?;

        log::info!(
            "User {} claimed {} XP for participation {}.",
            user_id,
            receipt.xp_awarded,
            participant_id
        );
        if receipt.leveled_up {
            log::info!("User {} reached level {}.", user_id, receipt.new_level);
        }
        Ok(receipt)
    }
}

#[async_trait]
impl RequestHandler<QuestRequest> for QuestRequestHandler {
    async fn handle_request(&self, request: QuestRequest) {
        match request {
            QuestRequest::CreateQuest {
                business_id,
                quest,
                response,
            } => {
                let _ = response.send(self.create_quest(business_id, quest).await);
            }
            QuestRequest::ListActive { response } => {
                let quests = self
                    .repository
                    .list_quests_by_status(QuestStatus::Active)
                    .await
                    .map_err(repository_error);
                let _ = response.send(quests);
            }
            QuestRequest::GetQuest { quest_id, response } => {
                let _ = response.send(self.get_quest(quest_id).await);
            }
            QuestRequest::ListBusinessQuests {
                business_id,
                response,
            } => {
                let quests = self
                    .repository
                    .list_business_quests(business_id)
                    .await
                    .map_err(repository_error);
                let _ = response.send(quests);
            }
            QuestRequest::UpdateStatus {
                quest_id,
                business_id,
                status,
                response,
            } => {
                let quest = self
                    .repository
                    .update_quest_status(quest_id, business_id, status, Utc::now())
                    .await
                    .map_err(repository_error);
                if let Ok(quest) = &quest {
                    log::info!("Quest {} is now {}.", quest.id, quest.status);
                }
                let _ = response.send(quest);
            }
            QuestRequest::Join {
                quest_id,
                user_id,
                response,
            } => {
                let participant = self
                    .repository
                    .join_quest(quest_id, user_id, Utc::now())
                    .await
                    .map_err(repository_error);
                if participant.is_ok() {
                    log::debug!("User {} joined quest {}.", user_id, quest_id);
                }
                let _ = response.send(participant);
            }
            QuestRequest::ListParticipations { user_id, response } => {
                let participations = self
                    .repository
                    .list_participations(user_id)
                    .await
                    .map_err(repository_error);
                let _ = response.send(participations);
            }
            QuestRequest::ListParticipants {
                quest_id,
                business_id,
                response,
            } => {
                let participants = self
                    .repository
                    .list_participants(quest_id, business_id)
                    .await
                    .map_err(repository_error);
                let _ = response.send(participants);
            }
            QuestRequest::UpdateProgress {
                participant_id,
                business_id,
                progress,
                response,
            } => {
                let participant = self
                    .repository
                    .update_progress(participant_id, business_id, progress, Utc::now())
                    .await
                    .map_err(repository_error);
                let _ = response.send(participant);
            }
            QuestRequest::ClaimReward {
                participant_id,
                user_id,
                expected_reward,
                response,
            } => {
                let receipt = self
                    .claim_reward(participant_id, user_id, expected_reward)
                    .await;
                let _ = response.send(receipt);
            }
        }
    }
}

pub struct QuestService;

impl QuestService {
    pub fn new() -> Self {
        QuestService {}
    }
}

#[async_trait]
impl Service<QuestRequest, QuestRequestHandler> for QuestService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quests::QuestDifficulty;
    use crate::models::Rejection;
    use crate::repositories::memory::MemoryStore;

    fn new_quest(reward_amount: i64) -> NewQuest {
        NewQuest {
            title: "Visit the store".to_string(),
            description: "Check in at any location".to_string(),
            reward_amount,
            reward_token: None,
            difficulty: QuestDifficulty::Easy,
            max_participants: None,
            requirements: None,
            start_date: None,
            end_date: None,
            publish: true,
        }
    }

    #[tokio::test]
    async fn create_quest_rejects_invalid_reward_before_storage() {
        let handler = QuestRequestHandler::new(Arc::new(MemoryStore::new()));
        let business_id = Uuid::new_v4();

        let result = handler.create_quest(business_id, new_quest(0)).await;
        assert!(matches!(
            result,
            Err(ServiceError::Rejected(Rejection::InvalidInput(_)))
        ));

        let listed = handler
            .repository
            .list_business_quests(business_id)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn requests_are_answered_through_the_channel() {
        let store = MemoryStore::new();
        let sender = super::super::spawn_service(
            QuestService::new(),
            QuestRequestHandler::new(Arc::new(store)),
        );
        let business_id = Uuid::new_v4();

        let (tx, rx) = oneshot::channel();
        sender
            .send(QuestRequest::CreateQuest {
                business_id,
                quest: new_quest(250),
                response: tx,
            })
            .await
            .unwrap();
        let quest = rx.await.unwrap().unwrap();
        assert_eq!(quest.status, QuestStatus::Active);

        let (tx, rx) = oneshot::channel();
        sender
            .send(QuestRequest::ListActive { response: tx })
            .await
            .unwrap();
        let active = rx.await.unwrap().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, quest.id);

        let (tx, rx) = oneshot::channel();
        sender
            .send(QuestRequest::GetQuest {
                quest_id: Uuid::new_v4(),
                response: tx,
            })
            .await
            .unwrap();
        assert!(matches!(rx.await.unwrap(), Err(ServiceError::NotFound(_))));
    }
}

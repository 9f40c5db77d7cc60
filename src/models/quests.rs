use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::airdrops::AirdropAllocation;
use super::wallets::{Wallet, DEFAULT_TOKEN};
use super::Rejection;

pub const MAX_QUEST_REWARD: i64 = 50_000;
pub const MAX_TITLE_LEN: usize = 200;
pub const COMPLETE_PROGRESS: i32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "quest_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    Draft,
    Active,
    Completed,
    Expired,
}

impl QuestStatus {
    pub fn can_transition_to(self, next: QuestStatus) -> bool {
        use QuestStatus::*;
        matches!(
            (self, next),
            (Draft, Active) | (Draft, Expired) | (Active, Completed) | (Active, Expired)
        )
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuestStatus::Draft => "draft",
            QuestStatus::Active => "active",
            QuestStatus::Completed => "completed",
            QuestStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "quest_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuestDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Quest {
    pub id: Uuid,
    pub business_id: Uuid,
    pub title: String,
    pub description: String,
    pub reward_amount: i64,
    pub reward_token: String,
    pub difficulty: QuestDifficulty,
    pub status: QuestStatus,
    pub max_participants: Option<i32>,
    pub current_participants: i32,
    pub requirements: Option<serde_json::Value>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quest {
    pub fn from_new(business_id: Uuid, new_quest: NewQuest, now: DateTime<Utc>) -> Self {
        let status = if new_quest.publish {
            QuestStatus::Active
        } else {
            QuestStatus::Draft
        };

        Quest {
            id: Uuid::new_v4(),
            business_id,
            title: new_quest.title.trim().to_string(),
            description: new_quest.description.trim().to_string(),
            reward_amount: new_quest.reward_amount,
            reward_token: new_quest
                .reward_token
                .unwrap_or_else(|| DEFAULT_TOKEN.to_string()),
            difficulty: new_quest.difficulty,
            status,
            max_participants: new_quest.max_participants,
            current_participants: 0,
            requirements: new_quest.requirements,
            start_date: new_quest.start_date,
            end_date: new_quest.end_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == QuestStatus::Active
            && self.start_date.map_or(true, |start| start <= now)
            && self.end_date.map_or(true, |end| now < end)
    }

    pub fn has_capacity(&self) -> bool {
        self.max_participants
            .map_or(true, |max| self.current_participants < max)
    }

    /// Checks that a user may join this quest at `now`.
    pub fn check_joinable(&self, now: DateTime<Utc>) -> Result<(), Rejection> {
        if !self.is_open_at(now) {
            return Err(Rejection::QuestClosed);
        }
        if !self.has_capacity() {
            return Err(Rejection::QuestFull);
        }
        Ok(())
    }

    pub fn check_owner(&self, business_id: Uuid) -> Result<(), Rejection> {
        if self.business_id != business_id {
            return Err(Rejection::NotQuestOwner);
        }
        Ok(())
    }

    pub fn transition(&mut self, next: QuestStatus, now: DateTime<Utc>) -> Result<(), Rejection> {
        if !self.status.can_transition_to(next) {
            return Err(Rejection::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewQuest {
    pub title: String,
    pub description: String,
    pub reward_amount: i64,
    pub reward_token: Option<String>,
    #[serde(default)]
    pub difficulty: QuestDifficulty,
    pub max_participants: Option<i32>,
    pub requirements: Option<serde_json::Value>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub publish: bool,
}

impl NewQuest {
    pub fn validate(&self) -> Result<(), Rejection> {
        let title = self.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(Rejection::invalid("Quest title must be 1-200 characters"));
        }
        if self.description.trim().is_empty() {
            return Err(Rejection::invalid("Quest description is required"));
        }
        if self.reward_amount <= 0 || self.reward_amount > MAX_QUEST_REWARD {
            return Err(Rejection::invalid("Reward amount invalid"));
        }
        if let Some(token) = &self.reward_token {
            if token.trim().is_empty() {
                return Err(Rejection::invalid("Reward token is invalid"));
            }
        }
        if matches!(self.max_participants, Some(max) if max < 1) {
            return Err(Rejection::invalid("Participant limit must be at least 1"));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end <= start {
                return Err(Rejection::invalid("End date must be after start date"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateQuestStatus {
    pub status: QuestStatus,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct QuestParticipant {
    pub id: Uuid,
    pub quest_id: Uuid,
    pub user_id: Uuid,
    pub progress: i32,
    pub status: QuestStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuestParticipant {
    pub fn new(quest_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Self {
        QuestParticipant {
            id: Uuid::new_v4(),
            quest_id,
            user_id,
            progress: 0,
            status: QuestStatus::Active,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == QuestStatus::Completed
    }

    /// Progress below 100. Only a claim completes a participation.
    pub fn set_progress(&mut self, progress: i32, now: DateTime<Utc>) -> Result<(), Rejection> {
        if self.is_completed() {
            return Err(Rejection::AlreadyClaimed);
        }
        if !(0..COMPLETE_PROGRESS).contains(&progress) {
            return Err(Rejection::invalid("Progress must be between 0 and 99"));
        }
        self.progress = progress;
        self.updated_at = now;
        Ok(())
    }

    fn complete(&mut self, now: DateTime<Utc>) {
        self.progress = COMPLETE_PROGRESS;
        self.status = QuestStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateProgress {
    pub progress: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClaimReward {
    pub expected_reward: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClaimReceipt {
    pub participant_id: Uuid,
    pub xp_awarded: i64,
    pub new_xp: i64,
    pub new_level: i32,
    pub leveled_up: bool,
    pub airdrop: AirdropAllocation,
}

/// Validates a claim against the stored rows and returns the reward to pay.
///
/// The caller-asserted reward must equal the quest's stored reward, so a
/// tampered client cannot inflate the payout. A completed participation is
/// never paid again.
pub fn check_claim(
    participant: &QuestParticipant,
    quest: &Quest,
    user_id: Uuid,
    expected_reward: i64,
) -> Result<i64, Rejection> {
    if expected_reward <= 0 || expected_reward > MAX_QUEST_REWARD {
        return Err(Rejection::invalid("Reward amount invalid"));
    }
    if participant.user_id != user_id {
        return Err(Rejection::NotParticipant);
    }
    if participant.is_completed() {
        return Err(Rejection::AlreadyClaimed);
    }
    if quest.status != QuestStatus::Active {
        return Err(Rejection::QuestNotActive);
    }
    if quest.reward_amount != expected_reward {
        return Err(Rejection::RewardMismatch);
    }
    Ok(quest.reward_amount)
}

/// Applies an already checked claim to the three rows it touches.
pub fn apply_claim(
    participant: &mut QuestParticipant,
    wallet: &mut Wallet,
    airdrop: &mut AirdropAllocation,
    reward: i64,
    now: DateTime<Utc>,
) -> Result<ClaimReceipt, Rejection> {
    let previous_level = wallet.credit_xp(reward)?;
    wallet.updated_at = now;

    airdrop.apply_quest_reward(reward, wallet.level);
    airdrop.updated_at = now;

    participant.complete(now);

    Ok(ClaimReceipt {
        participant_id: participant.id,
        xp_awarded: reward,
        new_xp: wallet.xp,
        new_level: wallet.level,
        leveled_up: wallet.level > previous_level,
        airdrop: airdrop.clone(),
    })
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::quests::Quest;

pub const MAX_TRANSACTION_PAGE: i64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Reward,
    Purchase,
    Transfer,
    Stake,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    pub token: String,
    pub description: String,
    pub quest_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn quest_reward(user_id: Uuid, quest: &Quest, now: DateTime<Utc>) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            user_id,
            kind: TransactionType::Reward,
            amount: quest.reward_amount,
            token: quest.reward_token.clone(),
            description: format!("Quest reward: {}", quest.title),
            quest_id: Some(quest.id),
            created_at: now,
        }
    }

    pub fn redemption(
        user_id: Uuid,
        reward_name: &str,
        cost: i64,
        token: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            user_id,
            kind: TransactionType::Purchase,
            amount: cost,
            token: token.to_string(),
            description: format!("Redeemed: {}", reward_name.trim()),
            quest_id: None,
            created_at: now,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub limit: Option<i64>,
}

impl TransactionQuery {
    pub fn page_size(&self) -> i64 {
        self.limit
            .unwrap_or(MAX_TRANSACTION_PAGE)
            .clamp(1, MAX_TRANSACTION_PAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(TransactionQuery { limit: None }.page_size(), 100);
        assert_eq!(TransactionQuery { limit: Some(0) }.page_size(), 1);
        assert_eq!(TransactionQuery { limit: Some(25) }.page_size(), 25);
        assert_eq!(TransactionQuery { limit: Some(5000) }.page_size(), 100);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AIRDROP_BONUS_PER_LEVEL: i64 = 10;
pub const QUEST_BONUS_DIVISOR: i64 = 10;

pub fn level_bonus(level: i32) -> i64 {
    (level.max(1) as i64 - 1) * AIRDROP_BONUS_PER_LEVEL
}

pub fn quest_bonus(reward: i64) -> i64 {
    reward / QUEST_BONUS_DIVISOR
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct AirdropAllocation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub base_allocation: i64,
    pub quest_bonus: i64,
    pub level_bonus: i64,
    pub total_allocation: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AirdropAllocation {
    pub fn new(user_id: Uuid, base_allocation: i64, now: DateTime<Utc>) -> Self {
        AirdropAllocation {
            id: Uuid::new_v4(),
            user_id,
            base_allocation,
            quest_bonus: 0,
            level_bonus: 0,
            total_allocation: base_allocation,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds a claimed quest's bonus and raises the level bonus to `level`.
    /// The level bonus never shrinks, even when redemptions lowered the level.
    pub fn apply_quest_reward(&mut self, reward: i64, level: i32) {
        self.quest_bonus += quest_bonus(reward);
        self.level_bonus = self.level_bonus.max(level_bonus(level));
        self.recompute_total();
    }

    fn recompute_total(&mut self) {
        self.total_allocation = self.base_allocation + self.quest_bonus + self.level_bonus;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_one_earns_no_bonus() {
        assert_eq!(level_bonus(1), 0);
        assert_eq!(level_bonus(2), 10);
        assert_eq!(level_bonus(100), 990);
    }

    #[test]
    fn quest_bonus_floors() {
        assert_eq!(quest_bonus(500), 50);
        assert_eq!(quest_bonus(255), 25);
        assert_eq!(quest_bonus(9), 0);
    }

    #[test]
    fn quest_rewards_accumulate() {
        let mut allocation = AirdropAllocation::new(Uuid::new_v4(), 100, Utc::now());

        allocation.apply_quest_reward(500, 1);
        assert_eq!(allocation.quest_bonus, 50);
        assert_eq!(allocation.level_bonus, 0);
        assert_eq!(allocation.total_allocation, 150);

        allocation.apply_quest_reward(1000, 2);
        assert_eq!(allocation.quest_bonus, 150);
        assert_eq!(allocation.level_bonus, 10);
        assert_eq!(allocation.total_allocation, 260);
    }

    #[test]
    fn lower_level_keeps_earned_level_bonus() {
        let mut allocation = AirdropAllocation::new(Uuid::new_v4(), 100, Utc::now());

        allocation.apply_quest_reward(5000, 6);
        assert_eq!(allocation.level_bonus, 50);

        allocation.apply_quest_reward(100, 1);
        assert_eq!(allocation.level_bonus, 50);
        assert_eq!(allocation.quest_bonus, 510);
        assert_eq!(allocation.total_allocation, 660);
    }
}

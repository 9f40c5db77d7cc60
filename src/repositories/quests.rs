use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult};
use crate::models::{
    airdrops::AirdropAllocation,
    quests::{self, ClaimReceipt, Quest, QuestParticipant, QuestStatus},
    transactions::Transaction,
    wallets::Wallet,
    Rejection,
};

#[async_trait]
pub trait QuestRepository: Send + Sync + 'static {
    async fn create_quest(&self, quest: &Quest) -> RepositoryResult<Quest>;

    async fn get_quest(&self, quest_id: Uuid) -> RepositoryResult<Option<Quest>>;

    async fn list_quests_by_status(&self, status: QuestStatus) -> RepositoryResult<Vec<Quest>>;

    async fn list_business_quests(&self, business_id: Uuid) -> RepositoryResult<Vec<Quest>>;

    async fn update_quest_status(
        &self,
        quest_id: Uuid,
        business_id: Uuid,
        status: QuestStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Quest>;

    /// Adds the user to the quest and bumps its participant count atomically.
    async fn join_quest(
        &self,
        quest_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<QuestParticipant>;

    async fn list_participations(&self, user_id: Uuid) -> RepositoryResult<Vec<QuestParticipant>>;

    async fn list_participants(
        &self,
        quest_id: Uuid,
        business_id: Uuid,
    ) -> RepositoryResult<Vec<QuestParticipant>>;

    async fn update_progress(
        &self,
        participant_id: Uuid,
        business_id: Uuid,
        progress: i32,
        now: DateTime<Utc>,
    ) -> RepositoryResult<QuestParticipant>;

    /// Completes a participation and pays its reward into the user's wallet
    /// and airdrop allocation in one transaction.
    async fn claim_reward(
        &self,
        participant_id: Uuid,
        user_id: Uuid,
        expected_reward: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ClaimReceipt>;
}

#[derive(Clone)]
pub struct PgQuestRepository {
    conn: PgPool,
}

impl PgQuestRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

const QUEST_COLUMNS: &str = "id, business_id, title, description, reward_amount, reward_token, difficulty, status, max_participants, current_participants, requirements, start_date, end_date, created_at, updated_at";
const PARTICIPANT_COLUMNS: &str =
    "id, quest_id, user_id, progress, status, completed_at, created_at, updated_at";

async fn lock_quest(conn: &mut PgConnection, quest_id: Uuid) -> RepositoryResult<Quest> {
    let quest = sqlx::query_as::<_, Quest>(&format!(
        "SELECT {} FROM quests WHERE id = $1 FOR UPDATE",
        QUEST_COLUMNS
    ))
    .bind(quest_id)
    .fetch_optional(conn)
    .await?;

    quest.ok_or(RepositoryError::NotFound("Quest"))
}

async fn lock_participant(
    conn: &mut PgConnection,
    participant_id: Uuid,
) -> RepositoryResult<QuestParticipant> {
    let participant = sqlx::query_as::<_, QuestParticipant>(&format!(
        "SELECT {} FROM quest_participants WHERE id = $1 FOR UPDATE",
        PARTICIPANT_COLUMNS
    ))
    .bind(participant_id)
    .fetch_optional(conn)
    .await?;

    participant.ok_or(RepositoryError::NotFound("Quest participant"))
}

#[async_trait]
impl QuestRepository for PgQuestRepository {
    async fn create_quest(&self, quest: &Quest) -> RepositoryResult<Quest> {
        let quest = sqlx::query_as::<_, Quest>(&format!(
            r#"
                INSERT INTO quests
                (id, business_id, title, description, reward_amount, reward_token, difficulty,
                 status, max_participants, current_participants, requirements, start_date,
                 end_date, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, $11, $12, $13, $13)
                RETURNING {}
            "#,
            QUEST_COLUMNS
        ))
        .bind(quest.id)
        .bind(quest.business_id)
        .bind(&quest.title)
        .bind(&quest.description)
        .bind(quest.reward_amount)
        .bind(&quest.reward_token)
        .bind(quest.difficulty)
        .bind(quest.status)
        .bind(quest.max_participants)
        .bind(&quest.requirements)
        .bind(quest.start_date)
        .bind(quest.end_date)
        .bind(quest.created_at)
        .fetch_one(&self.conn)
        .await?;

        Ok(quest)
    }

    async fn get_quest(&self, quest_id: Uuid) -> RepositoryResult<Option<Quest>> {
        let quest = sqlx::query_as::<_, Quest>(&format!(
            "SELECT {} FROM quests WHERE id = $1",
            QUEST_COLUMNS
        ))
        .bind(quest_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(quest)
    }

    async fn list_quests_by_status(&self, status: QuestStatus) -> RepositoryResult<Vec<Quest>> {
        let quests = sqlx::query_as::<_, Quest>(&format!(
            "SELECT {} FROM quests WHERE status = $1 ORDER BY created_at DESC",
            QUEST_COLUMNS
        ))
        .bind(status)
        .fetch_all(&self.conn)
        .await?;

        Ok(quests)
    }

    async fn list_business_quests(&self, business_id: Uuid) -> RepositoryResult<Vec<Quest>> {
        let quests = sqlx::query_as::<_, Quest>(&format!(
            "SELECT {} FROM quests WHERE business_id = $1 ORDER BY created_at DESC",
            QUEST_COLUMNS
        ))
        .bind(business_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(quests)
    }

    async fn update_quest_status(
        &self,
        quest_id: Uuid,
        business_id: Uuid,
        status: QuestStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Quest> {
        let mut tx = self.conn.begin().await?;

        let mut quest = lock_quest(&mut tx, quest_id).await?;
        quest.check_owner(business_id)?;
        quest.transition(status, now)?;

        sqlx::query("UPDATE quests SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(quest.id)
            .bind(quest.status)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(quest)
    }

    async fn join_quest(
        &self,
        quest_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<QuestParticipant> {
        let mut tx = self.conn.begin().await?;

        // The quest row lock serializes joins, so the capacity check holds.
        let quest = lock_quest(&mut tx, quest_id).await?;
        quest.check_joinable(now)?;

        let already_joined: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM quest_participants WHERE quest_id = $1 AND user_id = $2)",
        )
        .bind(quest_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_joined {
            return Err(Rejection::AlreadyJoined.into());
        }

        let participant = QuestParticipant::new(quest_id, user_id, now);
        sqlx::query(
            r#"
                INSERT INTO quest_participants
                (id, quest_id, user_id, progress, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(participant.id)
        .bind(participant.quest_id)
        .bind(participant.user_id)
        .bind(participant.progress)
        .bind(participant.status)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE quests SET current_participants = current_participants + 1, updated_at = $2 WHERE id = $1",
        )
        .bind(quest_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(participant)
    }

    async fn list_participations(&self, user_id: Uuid) -> RepositoryResult<Vec<QuestParticipant>> {
        let participants = sqlx::query_as::<_, QuestParticipant>(&format!(
            "SELECT {} FROM quest_participants WHERE user_id = $1 ORDER BY created_at DESC",
            PARTICIPANT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(participants)
    }

    async fn list_participants(
        &self,
        quest_id: Uuid,
        business_id: Uuid,
    ) -> RepositoryResult<Vec<QuestParticipant>> {
        let quest = self
            .get_quest(quest_id)
            .await?
            .ok_or(RepositoryError::NotFound("Quest"))?;
        quest.check_owner(business_id)?;

        let participants = sqlx::query_as::<_, QuestParticipant>(&format!(
            "SELECT {} FROM quest_participants WHERE quest_id = $1 ORDER BY created_at",
            PARTICIPANT_COLUMNS
        ))
        .bind(quest_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(participants)
    }

    async fn update_progress(
        &self,
        participant_id: Uuid,
        business_id: Uuid,
        progress: i32,
        now: DateTime<Utc>,
    ) -> RepositoryResult<QuestParticipant> {
        let mut tx = self.conn.begin().await?;

        let mut participant = lock_participant(&mut tx, participant_id).await?;
        let quest = sqlx::query_as::<_, Quest>(&format!(
            "SELECT {} FROM quests WHERE id = $1",
            QUEST_COLUMNS
        ))
        .bind(participant.quest_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Quest"))?;
        quest.check_owner(business_id)?;

        participant.set_progress(progress, now)?;

        sqlx::query("UPDATE quest_participants SET progress = $2, updated_at = $3 WHERE id = $1")
            .bind(participant.id)
            .bind(participant.progress)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(participant)
    }

    async fn claim_reward(
        &self,
        participant_id: Uuid,
        user_id: Uuid,
        expected_reward: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ClaimReceipt> {
        let mut tx = self.conn.begin().await?;

        // Lock order: participant, wallet, airdrop allocation.
        let mut participant = lock_participant(&mut tx, participant_id).await?;
        let quest = sqlx::query_as::<_, Quest>(&format!(
            "SELECT {} FROM quests WHERE id = $1",
            QUEST_COLUMNS
        ))
        .bind(participant.quest_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Quest"))?;

        let reward = quests::check_claim(&participant, &quest, user_id, expected_reward)?;

        let mut wallet = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Wallet"))?;

        let mut airdrop = sqlx::query_as::<_, AirdropAllocation>(
            "SELECT * FROM airdrop_allocations WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("Airdrop allocation"))?;

        let receipt = quests::apply_claim(&mut participant, &mut wallet, &mut airdrop, reward, now)?;

        let updated = sqlx::query(
            r#"
                UPDATE quest_participants
                SET progress = $2, status = $3, completed_at = $4, updated_at = $4
                WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(participant.id)
        .bind(participant.progress)
        .bind(participant.status)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() != 1 {
            return Err(Rejection::AlreadyClaimed.into());
        }

        sqlx::query("UPDATE wallets SET xp = $2, level = $3, updated_at = $4 WHERE user_id = $1")
            .bind(user_id)
            .bind(wallet.xp)
            .bind(wallet.level)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE airdrop_allocations SET quest_bonus = $2, level_bonus = $3, updated_at = $4 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(airdrop.quest_bonus)
        .bind(airdrop.level_bonus)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        insert_transaction(&mut tx, &Transaction::quest_reward(user_id, &quest, now)).await?;

        tx.commit().await?;

        Ok(receipt)
    }
}

pub(crate) async fn insert_transaction(
    conn: &mut PgConnection,
    transaction: &Transaction,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
            INSERT INTO transactions
            (id, user_id, type, amount, token, description, quest_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(transaction.id)
    .bind(transaction.user_id)
    .bind(transaction.kind)
    .bind(transaction.amount)
    .bind(&transaction.token)
    .bind(&transaction.description)
    .bind(transaction.quest_id)
    .bind(transaction.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

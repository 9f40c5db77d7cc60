use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{quests::insert_transaction, RepositoryError, RepositoryResult};
use crate::models::{
    airdrops::AirdropAllocation,
    transactions::Transaction,
    wallets::{RedemptionReceipt, Wallet},
};

#[async_trait]
pub trait WalletRepository: Send + Sync + 'static {
    async fn get_wallet(&self, user_id: Uuid) -> RepositoryResult<Option<Wallet>>;

    async fn get_airdrop(&self, user_id: Uuid) -> RepositoryResult<Option<AirdropAllocation>>;

    /// Debits `cost` XP. Fails without side effects when the balance is short.
    async fn redeem_reward(
        &self,
        user_id: Uuid,
        reward_name: &str,
        cost: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RedemptionReceipt>;

    /// Stores `address` on the wallet. With `replace == false` an address that
    /// is already set wins and is returned unchanged.
    async fn assign_wallet_address(
        &self,
        user_id: Uuid,
        address: &str,
        replace: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Wallet>;

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>>;
}

#[derive(Clone)]
pub struct PgWalletRepository {
    conn: PgPool,
}

impl PgWalletRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn get_wallet(&self, user_id: Uuid) -> RepositoryResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(wallet)
    }

    async fn get_airdrop(&self, user_id: Uuid) -> RepositoryResult<Option<AirdropAllocation>> {
        let airdrop = sqlx::query_as::<_, AirdropAllocation>(
            "SELECT * FROM airdrop_allocations WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(airdrop)
    }

    async fn redeem_reward(
        &self,
        user_id: Uuid,
        reward_name: &str,
        cost: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RedemptionReceipt> {
        let mut tx = self.conn.begin().await?;

        let mut wallet =
            sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound("Wallet"))?;

        wallet.debit_xp(cost)?;

        sqlx::query("UPDATE wallets SET xp = $2, level = $3, updated_at = $4 WHERE user_id = $1")
            .bind(user_id)
            .bind(wallet.xp)
            .bind(wallet.level)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let transaction = Transaction::redemption(user_id, reward_name, cost, &wallet.token, now);
        insert_transaction(&mut tx, &transaction).await?;

        tx.commit().await?;

        Ok(RedemptionReceipt {
            new_xp: wallet.xp,
            new_level: wallet.level,
        })
    }

    async fn assign_wallet_address(
        &self,
        user_id: Uuid,
        address: &str,
        replace: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Wallet> {
        let mut tx = self.conn.begin().await?;

        let wallet =
            sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound("Wallet"))?;

        if wallet.wallet_address.is_some() && !replace {
            return Ok(wallet);
        }

        let wallet = sqlx::query_as::<_, Wallet>(
            "UPDATE wallets SET wallet_address = $2, updated_at = $3 WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(address)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(wallet)
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
                SELECT id, user_id, type, amount, token, description, quest_id, created_at
                FROM transactions
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        Ok(transactions)
    }
}

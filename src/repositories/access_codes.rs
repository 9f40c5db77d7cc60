use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult};
use crate::models::{
    access_codes::{AccessCode, AccessCodeRedemption, AccessCodeSummary},
    users::AppRole,
    Rejection,
};

#[async_trait]
pub trait AccessCodeRepository: Send + Sync + 'static {
    async fn insert_code(&self, access_code: &AccessCode) -> RepositoryResult<AccessCode>;

    /// All codes, newest first, with how many users redeemed each.
    async fn list_codes(&self) -> RepositoryResult<Vec<AccessCodeSummary>>;

    async fn set_active(
        &self,
        code_id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<AccessCode>;

    /// Consumes one use of `code` for `user_id` and grants the business role.
    async fn redeem_code(
        &self,
        code: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<AccessCodeRedemption>;
}

#[derive(Clone)]
pub struct PgAccessCodeRepository {
    conn: PgPool,
}

impl PgAccessCodeRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl AccessCodeRepository for PgAccessCodeRepository {
    async fn insert_code(&self, access_code: &AccessCode) -> RepositoryResult<AccessCode> {
        let inserted = sqlx::query_as::<_, AccessCode>(
            r#"
                INSERT INTO access_codes
                (id, code, tier, max_uses, current_uses, expires_at, is_active, created_by,
                 created_at, updated_at)
                VALUES ($1, $2, $3, $4, 0, $5, TRUE, $6, $7, $7)
                RETURNING *
            "#,
        )
        .bind(access_code.id)
        .bind(&access_code.code)
        .bind(&access_code.tier)
        .bind(access_code.max_uses)
        .bind(access_code.expires_at)
        .bind(access_code.created_by)
        .bind(access_code.created_at)
        .fetch_one(&self.conn)
        .await?;

        Ok(inserted)
    }

    async fn list_codes(&self) -> RepositoryResult<Vec<AccessCodeSummary>> {
        let codes = sqlx::query_as::<_, AccessCodeSummary>(
            r#"
                SELECT c.*, COUNT(u.id) AS redemptions
                FROM access_codes c
                LEFT JOIN user_access_codes u ON u.access_code_id = c.id
                GROUP BY c.id
                ORDER BY c.created_at DESC
            "#,
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(codes)
    }

    async fn set_active(
        &self,
        code_id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<AccessCode> {
        let code = sqlx::query_as::<_, AccessCode>(
            "UPDATE access_codes SET is_active = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(code_id)
        .bind(active)
        .bind(now)
        .fetch_optional(&self.conn)
        .await?
        .ok_or(RepositoryError::NotFound("Access code"))?;

        Ok(code)
    }

    async fn redeem_code(
        &self,
        code: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<AccessCodeRedemption> {
        let mut tx = self.conn.begin().await?;

        let mut access_code =
            sqlx::query_as::<_, AccessCode>("SELECT * FROM access_codes WHERE code = $1 FOR UPDATE")
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(Rejection::UnknownAccessCode)?;

        access_code.check_redeemable(now)?;

        let already_used: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_access_codes WHERE access_code_id = $1 AND user_id = $2)",
        )
        .bind(access_code.id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_used {
            return Err(Rejection::AccessCodeAlreadyUsed.into());
        }

        access_code.record_use(now);

        sqlx::query("UPDATE access_codes SET current_uses = $2, updated_at = $3 WHERE id = $1")
            .bind(access_code.id)
            .bind(access_code.current_uses)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO user_access_codes (id, access_code_id, user_id, used_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(access_code.id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO user_roles (id, user_id, role) VALUES ($1, $2, $3) ON CONFLICT (user_id, role) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(AppRole::Business)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AccessCodeRedemption {
            tier: access_code.tier,
        })
    }
}

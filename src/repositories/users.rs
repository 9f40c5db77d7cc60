use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryResult;
use crate::models::users::{AppRole, AuthUser, Profile};

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Creates the profile, `user` role, wallet and airdrop allocation for a
    /// user if they do not exist yet. Safe to call repeatedly.
    async fn provision_user(
        &self,
        user: &AuthUser,
        base_allocation: i64,
        admin: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    async fn get_profile(&self, user_id: Uuid) -> RepositoryResult<Option<Profile>>;

    async fn get_roles(&self, user_id: Uuid) -> RepositoryResult<Vec<AppRole>>;

    async fn has_role(&self, user_id: Uuid, role: AppRole) -> RepositoryResult<bool>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    conn: PgPool,
}

impl PgUserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn provision_user(
        &self,
        user: &AuthUser,
        base_allocation: i64,
        admin: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut tx = self.conn.begin().await?;

        sqlx::query(
            r#"
                INSERT INTO profiles (id, email, full_name, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $4)
                ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut roles = vec![AppRole::User];
        if admin {
            roles.push(AppRole::Admin);
        }
        for role in roles {
            sqlx::query(
                "INSERT INTO user_roles (id, user_id, role) VALUES ($1, $2, $3) ON CONFLICT (user_id, role) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(user.id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO wallets (id, user_id, created_at, updated_at) VALUES ($1, $2, $3, $3) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
                INSERT INTO airdrop_allocations (id, user_id, base_allocation, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $4)
                ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(base_allocation)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> RepositoryResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, email, full_name, avatar_url, created_at, updated_at FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(profile)
    }

    async fn get_roles(&self, user_id: Uuid) -> RepositoryResult<Vec<AppRole>> {
        let roles = sqlx::query_scalar::<_, AppRole>(
            "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(roles)
    }

    async fn has_role(&self, user_id: Uuid, role: AppRole) -> RepositoryResult<bool> {
        let has_role: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)",
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.conn)
        .await?;

        Ok(has_role)
    }
}

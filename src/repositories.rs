use std::sync::Arc;

use sqlx::PgPool;

use crate::models::Rejection;

pub mod access_codes;
pub mod memory;
pub mod quests;
pub mod stripe;
pub mod supabase;
pub mod users;
pub mod wallets;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// The storage backends handed to the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn users::UserRepository>,
    pub quests: Arc<dyn quests::QuestRepository>,
    pub wallets: Arc<dyn wallets::WalletRepository>,
    pub access_codes: Arc<dyn access_codes::AccessCodeRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Repositories {
            users: Arc::new(users::PgUserRepository::new(pool.clone())),
            quests: Arc::new(quests::PgQuestRepository::new(pool.clone())),
            wallets: Arc::new(wallets::PgWalletRepository::new(pool.clone())),
            access_codes: Arc::new(access_codes::PgAccessCodeRepository::new(pool)),
        }
    }

    pub fn memory(store: memory::MemoryStore) -> Self {
        Repositories {
            users: Arc::new(store.clone()),
            quests: Arc::new(store.clone()),
            wallets: Arc::new(store.clone()),
            access_codes: Arc::new(store),
        }
    }
}

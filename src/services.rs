use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::repositories::{supabase::SupabaseAuthApi, RepositoryError, Repositories};
use crate::models::Rejection;
use crate::settings::{Gamification, Settings, Stripe};

pub mod access_codes;
pub mod auth;
pub mod checkout;
pub mod http;
pub mod quests;
pub mod users;
pub mod wallets;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("External service error: {0} -> {1} => {2}")]
    ExternalService(String, String, String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Checkout failed: {0}")]
    Checkout(String),
}

impl ServiceError {
    /// Keeps not-found and domain rejections typed; anything else becomes an
    /// opaque repository failure attributed to `service`.
    pub fn from_repository(service: &str, error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(what) => ServiceError::NotFound(what.to_string()),
            RepositoryError::Rejected(rejection) => ServiceError::Rejected(rejection),
            RepositoryError::Database(e) => {
                ServiceError::Repository(service.to_string(), e.to_string())
            }
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

fn spawn_service<T, H, S>(mut service: S, handler: H) -> mpsc::Sender<T>
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
    S: Service<T, H>,
{
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        service.run(handler, &mut rx).await;
    });

    tx
}

/// Senders for every running service.
#[derive(Clone)]
pub struct ServiceChannels {
    pub users: mpsc::Sender<users::UserRequest>,
    pub quests: mpsc::Sender<quests::QuestRequest>,
    pub wallets: mpsc::Sender<wallets::WalletRequest>,
    pub access_codes: mpsc::Sender<access_codes::AccessCodeRequest>,
    pub checkout: mpsc::Sender<checkout::CheckoutRequest>,
}

pub fn spawn_services(
    repositories: Repositories,
    gamification: Gamification,
    stripe: Stripe,
) -> ServiceChannels {
    log::info!("Starting user service.");
    let users = spawn_service(
        users::UserService::new(),
        users::UserRequestHandler::new(repositories.users.clone(), gamification),
    );

    log::info!("Starting quest service.");
    let quests = spawn_service(
        quests::QuestService::new(),
        quests::QuestRequestHandler::new(repositories.quests.clone()),
    );

    log::info!("Starting wallet service.");
    let wallets = spawn_service(
        wallets::WalletService::new(),
        wallets::WalletRequestHandler::new(repositories.wallets.clone()),
    );

    log::info!("Starting access code service.");
    let access_codes = spawn_service(
        access_codes::AccessCodeService::new(),
        access_codes::AccessCodeRequestHandler::new(repositories.access_codes.clone()),
    );

    log::info!("Starting checkout service.");
    let checkout = spawn_service(
        checkout::CheckoutService::new(),
        checkout::CheckoutRequestHandler::new(stripe),
    );

    ServiceChannels {
        users,
        quests,
        wallets,
        access_codes,
        checkout,
    }
}

pub async fn start_services(
    repositories: Repositories,
    settings: Settings,
) -> Result<(), anyhow::Error> {
    let authenticator = Arc::new(auth::SupabaseAuthenticator::new(
        SupabaseAuthApi::new(settings.supabase.url, settings.supabase.anon_key),
        settings.supabase.token_cache_secs,
    ));

    let channels = spawn_services(repositories, settings.gamification, settings.stripe);

    log::info!("Starting HTTP server.");
    let listener = tokio::net::TcpListener::bind(&settings.server.listen).await?;
    http::start_http_server(listener, channels, authenticator).await?;

    Ok(())
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError};
use crate::models::airdrops::AirdropAllocation;
use crate::models::transactions::Transaction;
use crate::models::wallets::{
    derive_wallet_address, is_valid_wallet_address, RedeemReward, RedemptionReceipt, Wallet,
};
use crate::models::Rejection;
use crate::repositories::wallets::WalletRepository;
use crate::repositories::RepositoryError;

type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

pub enum WalletRequest {
    GetWallet {
        user_id: Uuid,
        response: Reply<Wallet>,
    },
    GetAirdrop {
        user_id: Uuid,
        response: Reply<AirdropAllocation>,
    },
    Redeem {
        user_id: Uuid,
        reward: RedeemReward,
        response: Reply<RedemptionReceipt>,
    },
    GenerateAddress {
        user_id: Uuid,
        response: Reply<Wallet>,
    },
    LinkAddress {
        user_id: Uuid,
        address: String,
        response: Reply<Wallet>,
    },
    ListTransactions {
        user_id: Uuid,
        limit: i64,
        response: Reply<Vec<Transaction>>,
    },
}

#[derive(Clone)]
pub struct WalletRequestHandler {
    repository: Arc<dyn WalletRepository>,
}

fn repository_error(e: RepositoryError) -> ServiceError {
    ServiceError::from_repository("WalletService", e)
}

impl WalletRequestHandler {
    pub fn new(repository: Arc<dyn WalletRepository>) -> Self {
        WalletRequestHandler { repository }
    }

    async fn get_wallet(&self, user_id: Uuid) -> Result<Wallet, ServiceError> {
        self.repository
            .get_wallet(user_id)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| ServiceError::NotFound("Wallet".to_string()))
    }

    async fn get_airdrop(&self, user_id: Uuid) -> Result<AirdropAllocation, ServiceError> {
        self.repository
            .get_airdrop(user_id)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| ServiceError::NotFound("Airdrop allocation".to_string()))
    }

    async fn redeem(
        &self,
        user_id: Uuid,
        reward: RedeemReward,
    ) -> Result<RedemptionReceipt, ServiceError> {
        reward.validate()?;

        let receipt = self
            .repository
            .redeem_reward(user_id, reward.reward_name.trim(), reward.cost, Utc::now())
            .await
            .map_err(repository_error)?;

        log::info!(
            "User {} redeemed {} XP, {} XP left.",
            user_id,
            reward.cost,
            receipt.new_xp
        );
        Ok(receipt)
    }

    /// Returns the stored address when one exists, otherwise derives and
    /// stores a fresh one.
    async fn generate_address(&self, user_id: Uuid) -> Result<Wallet, ServiceError> {
        let nonce = Uuid::new_v4();
        let address = derive_wallet_address(&user_id, nonce.as_bytes());

        self.repository
            .assign_wallet_address(user_id, &address, false, Utc::now())
            .await
            .map_err(repository_error)
    }

    async fn link_address(&self, user_id: Uuid, address: String) -> Result<Wallet, ServiceError> {
        let address = address.trim();
        if !is_valid_wallet_address(address) {
            return Err(Rejection::InvalidWalletAddress.into());
        }

        let wallet = self
            .repository
            .assign_wallet_address(user_id, address, true, Utc::now())
            .await
            .map_err(repository_error)?;

        log::info!("User {} linked wallet address {}.", user_id, address);
        Ok(wallet)
    }
}

#[async_trait]
impl RequestHandler<WalletRequest> for WalletRequestHandler {
    async fn handle_request(&self, request: WalletRequest) {
        match request {
            WalletRequest::GetWallet { user_id, response } => {
                let _ = response.send(self.get_wallet(user_id).await);
            }
            WalletRequest::GetAirdrop { user_id, response } => {
                let _ = response.send(self.get_airdrop(user_id).await);
            }
            WalletRequest::Redeem {
                user_id,
                reward,
                response,
            } => {
                let _ = response.send(self.redeem(user_id, reward).await);
            }
            WalletRequest::GenerateAddress { user_id, response } => {
                let _ = response.send(self.generate_address(user_id).await);
            }
            WalletRequest::LinkAddress {
                user_id,
                address,
                response,
            } => {
                let _ = response.send(self.link_address(user_id, address).await);
            }
            WalletRequest::ListTransactions {
                user_id,
                limit,
                response,
            } => {
                let transactions = self
                    .repository
                    .list_transactions(user_id, limit)
                    .await
                    .map_err(repository_error);
                let _ = response.send(transactions);
            }
        }
    }
}

pub struct WalletService;

impl WalletService {
    pub fn new() -> Self {
        WalletService {}
    }
}

#[async_trait]
impl Service<WalletRequest, WalletRequestHandler> for WalletService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::AuthUser;
    use crate::repositories::memory::MemoryStore;
    use crate::repositories::users::UserRepository;

    async fn provisioned_handler() -> (WalletRequestHandler, Uuid) {
        let store = MemoryStore::new();
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            full_name: None,
        };
        store
            .provision_user(&user, 100, false, Utc::now())
            .await
            .unwrap();

        (WalletRequestHandler::new(Arc::new(store)), user.id)
    }

    #[tokio::test]
    async fn generated_address_is_stable() {
        let (handler, user_id) = provisioned_handler().await;

        let first = handler.generate_address(user_id).await.unwrap();
        let second = handler.generate_address(user_id).await.unwrap();

        let address = first.wallet_address.unwrap();
        assert!(is_valid_wallet_address(&address));
        assert_eq!(second.wallet_address.as_deref(), Some(address.as_str()));
    }

    #[tokio::test]
    async fn malformed_address_is_rejected() {
        let (handler, user_id) = provisioned_handler().await;

        let result = handler.link_address(user_id, "0x1234".to_string()).await;
        assert!(matches!(
            result,
            Err(ServiceError::Rejected(Rejection::InvalidWalletAddress))
        ));

        let wallet = handler.get_wallet(user_id).await.unwrap();
        assert!(wallet.wallet_address.is_none());
    }

    #[tokio::test]
    async fn linked_address_replaces_generated_one() {
        let (handler, user_id) = provisioned_handler().await;
        handler.generate_address(user_id).await.unwrap();

        let linked = format!("0x{}", "ab".repeat(20));
        let wallet = handler.link_address(user_id, linked.clone()).await.unwrap();

        assert_eq!(wallet.wallet_address, Some(linked));
    }

    #[tokio::test]
    async fn redemption_without_xp_is_refused() {
        let (handler, user_id) = provisioned_handler().await;

        let result = handler
            .redeem(
                user_id,
                RedeemReward {
                    reward_name: "Sticker".to_string(),
                    cost: 10,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Rejected(Rejection::InsufficientXp { .. }))
        ));
    }

    #[tokio::test]
    async fn unknown_user_has_no_wallet() {
        let (handler, _) = provisioned_handler().await;

        let result = handler.get_wallet(Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}

//! In-process store used for local development and tests.
//!
//! Every operation takes the single state lock for its whole duration, which
//! gives the same all-or-nothing behaviour the Postgres repositories get from
//! a database transaction.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    access_codes::AccessCodeRepository, quests::QuestRepository, users::UserRepository,
    wallets::WalletRepository, RepositoryError, RepositoryResult,
};
use crate::models::{
    access_codes::{AccessCode, AccessCodeRedemption, AccessCodeSummary},
    airdrops::AirdropAllocation,
    quests::{self, ClaimReceipt, Quest, QuestParticipant, QuestStatus},
    transactions::Transaction,
    users::{AppRole, AuthUser, Profile},
    wallets::{RedemptionReceipt, Wallet},
    Rejection,
};

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<Uuid, Profile>,
    roles: HashMap<Uuid, BTreeSet<AppRole>>,
    wallets: HashMap<Uuid, Wallet>,
    airdrops: HashMap<Uuid, AirdropAllocation>,
    quests: HashMap<Uuid, Quest>,
    participants: HashMap<Uuid, QuestParticipant>,
    transactions: Vec<Transaction>,
    access_codes: HashMap<Uuid, AccessCode>,
    // (access_code_id, user_id)
    code_redemptions: Vec<(Uuid, Uuid)>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn sort_newest_first<T, F>(items: &mut [T], created_at: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn provision_user(
        &self,
        user: &AuthUser,
        base_allocation: i64,
        admin: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut state = self.state();

        state
            .profiles
            .entry(user.id)
            .or_insert_with(|| Profile::from_auth(user, now));
        let roles = state.roles.entry(user.id).or_default();
        roles.insert(AppRole::User);
        if admin {
            roles.insert(AppRole::Admin);
        }
        state
            .wallets
            .entry(user.id)
            .or_insert_with(|| Wallet::new(user.id, now));
        state
            .airdrops
            .entry(user.id)
            .or_insert_with(|| AirdropAllocation::new(user.id, base_allocation, now));

        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> RepositoryResult<Option<Profile>> {
        Ok(self.state().profiles.get(&user_id).cloned())
    }

    async fn get_roles(&self, user_id: Uuid) -> RepositoryResult<Vec<AppRole>> {
        let roles = self
            .state()
            .roles
            .get(&user_id)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default();

        Ok(roles)
    }

    async fn has_role(&self, user_id: Uuid, role: AppRole) -> RepositoryResult<bool> {
        let has_role = self
            .state()
            .roles
            .get(&user_id)
            .is_some_and(|roles| roles.contains(&role));

        Ok(has_role)
    }
}

#[async_trait]
impl QuestRepository for MemoryStore {
    async fn create_quest(&self, quest: &Quest) -> RepositoryResult<Quest> {
        self.state().quests.insert(quest.id, quest.clone());
        Ok(quest.clone())
    }

    async fn get_quest(&self, quest_id: Uuid) -> RepositoryResult<Option<Quest>> {
        Ok(self.state().quests.get(&quest_id).cloned())
    }

    async fn list_quests_by_status(&self, status: QuestStatus) -> RepositoryResult<Vec<Quest>> {
        let mut quests: Vec<Quest> = self
            .state()
            .quests
            .values()
            .filter(|quest| quest.status == status)
            .cloned()
            .collect();
        sort_newest_first(&mut quests, |quest| quest.created_at);

        Ok(quests)
    }

    async fn list_business_quests(&self, business_id: Uuid) -> RepositoryResult<Vec<Quest>> {
        let mut quests: Vec<Quest> = self
            .state()
            .quests
            .values()
            .filter(|quest| quest.business_id == business_id)
            .cloned()
            .collect();
        sort_newest_first(&mut quests, |quest| quest.created_at);

        Ok(quests)
    }

    async fn update_quest_status(
        &self,
        quest_id: Uuid,
        business_id: Uuid,
        status: QuestStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Quest> {
        let mut state = self.state();
        let quest = state
            .quests
            .get_mut(&quest_id)
            .ok_or(RepositoryError::NotFound("Quest"))?;

        quest.check_owner(business_id)?;
        quest.transition(status, now)?;

        Ok(quest.clone())
    }

    async fn join_quest(
        &self,
        quest_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<QuestParticipant> {
        let mut state = self.state();

        let quest = state
            .quests
            .get(&quest_id)
            .ok_or(RepositoryError::NotFound("Quest"))?;
        quest.check_joinable(now)?;

        let already_joined = state
            .participants
            .values()
            .any(|p| p.quest_id == quest_id && p.user_id == user_id);
        if already_joined {
            return Err(Rejection::AlreadyJoined.into());
        }

        let participant = QuestParticipant::new(quest_id, user_id, now);
        state.participants.insert(participant.id, participant.clone());
        if let Some(quest) = state.quests.get_mut(&quest_id) {
            quest.current_participants += 1;
            quest.updated_at = now;
        }

        Ok(participant)
    }

    async fn list_participations(&self, user_id: Uuid) -> RepositoryResult<Vec<QuestParticipant>> {
        let mut participants: Vec<QuestParticipant> = self
            .state()
            .participants
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        sort_newest_first(&mut participants, |p| p.created_at);

        Ok(participants)
    }

    async fn list_participants(
        &self,
        quest_id: Uuid,
        business_id: Uuid,
    ) -> RepositoryResult<Vec<QuestParticipant>> {
        let state = self.state();
        let quest = state
            .quests
            .get(&quest_id)
            .ok_or(RepositoryError::NotFound("Quest"))?;
        quest.check_owner(business_id)?;

        let mut participants: Vec<QuestParticipant> = state
            .participants
            .values()
            .filter(|p| p.quest_id == quest_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.created_at);

        Ok(participants)
    }

    async fn update_progress(
        &self,
        participant_id: Uuid,
        business_id: Uuid,
        progress: i32,
        now: DateTime<Utc>,
    ) -> RepositoryResult<QuestParticipant> {
        let mut state = self.state();

        let quest_id = state
            .participants
            .get(&participant_id)
            .map(|p| p.quest_id)
            .ok_or(RepositoryError::NotFound("Quest participant"))?;
        state
            .quests
            .get(&quest_id)
            .ok_or(RepositoryError::NotFound("Quest"))?
            .check_owner(business_id)?;

        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or(RepositoryError::NotFound("Quest participant"))?;
        participant.set_progress(progress, now)?;

        Ok(participant.clone())
    }

    async fn claim_reward(
        &self,
        participant_id: Uuid,
        user_id: Uuid,
        expected_reward: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ClaimReceipt> {
        let mut state = self.state();

        let mut participant = state
            .participants
            .get(&participant_id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Quest participant"))?;
        let quest = state
            .quests
            .get(&participant.quest_id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Quest"))?;

        let reward = quests::check_claim(&participant, &quest, user_id, expected_reward)?;

        let mut wallet = state
            .wallets
            .get(&user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Wallet"))?;
        let mut airdrop = state
            .airdrops
            .get(&user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Airdrop allocation"))?;

        let receipt = quests::apply_claim(&mut participant, &mut wallet, &mut airdrop, reward, now)?;

        state.participants.insert(participant.id, participant);
        state.wallets.insert(user_id, wallet);
        state.airdrops.insert(user_id, airdrop);
        state
            .transactions
            .push(Transaction::quest_reward(user_id, &quest, now));

        Ok(receipt)
    }
}

#[async_trait]
impl WalletRepository for MemoryStore {
    async fn get_wallet(&self, user_id: Uuid) -> RepositoryResult<Option<Wallet>> {
        Ok(self.state().wallets.get(&user_id).cloned())
    }

    async fn get_airdrop(&self, user_id: Uuid) -> RepositoryResult<Option<AirdropAllocation>> {
        Ok(self.state().airdrops.get(&user_id).cloned())
    }

    async fn redeem_reward(
        &self,
        user_id: Uuid,
        reward_name: &str,
        cost: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RedemptionReceipt> {
        let mut state = self.state();

        let wallet = state
            .wallets
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound("Wallet"))?;
        wallet.debit_xp(cost)?;
        wallet.updated_at = now;

        let receipt = RedemptionReceipt {
            new_xp: wallet.xp,
            new_level: wallet.level,
        };
        let transaction = Transaction::redemption(user_id, reward_name, cost, &wallet.token, now);
        state.transactions.push(transaction);

        Ok(receipt)
    }

    async fn assign_wallet_address(
        &self,
        user_id: Uuid,
        address: &str,
        replace: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Wallet> {
        let mut state = self.state();

        let wallet = state
            .wallets
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound("Wallet"))?;
        if wallet.wallet_address.is_none() || replace {
            wallet.wallet_address = Some(address.to_string());
            wallet.updated_at = now;
        }

        Ok(wallet.clone())
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self
            .state()
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        sort_newest_first(&mut transactions, |t| t.created_at);
        transactions.truncate(limit.max(0) as usize);

        Ok(transactions)
    }
}

#[async_trait]
impl AccessCodeRepository for MemoryStore {
    async fn insert_code(&self, access_code: &AccessCode) -> RepositoryResult<AccessCode> {
        self.state()
            .access_codes
            .insert(access_code.id, access_code.clone());
        Ok(access_code.clone())
    }

    async fn list_codes(&self) -> RepositoryResult<Vec<AccessCodeSummary>> {
        let state = self.state();
        let mut codes: Vec<AccessCodeSummary> = state
            .access_codes
            .values()
            .map(|code| AccessCodeSummary {
                access_code: code.clone(),
                redemptions: state
                    .code_redemptions
                    .iter()
                    .filter(|(code_id, _)| *code_id == code.id)
                    .count() as i64,
            })
            .collect();
        sort_newest_first(&mut codes, |summary| summary.access_code.created_at);

        Ok(codes)
    }

    async fn set_active(
        &self,
        code_id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<AccessCode> {
        let mut state = self.state();
        let code = state
            .access_codes
            .get_mut(&code_id)
            .ok_or(RepositoryError::NotFound("Access code"))?;
        code.is_active = active;
        code.updated_at = now;

        Ok(code.clone())
    }

    async fn redeem_code(
        &self,
        code: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<AccessCodeRedemption> {
        let mut state = self.state();

        let access_code = state
            .access_codes
            .values()
            .find(|c| c.code == code)
            .ok_or(Rejection::UnknownAccessCode)?;
        access_code.check_redeemable(now)?;

        let code_id = access_code.id;
        if state
            .code_redemptions
            .iter()
            .any(|(id, user)| *id == code_id && *user == user_id)
        {
            return Err(Rejection::AccessCodeAlreadyUsed.into());
        }

        let tier = match state.access_codes.get_mut(&code_id) {
            Some(access_code) => {
                access_code.record_use(now);
                access_code.tier.clone()
            }
            None => return Err(RepositoryError::NotFound("Access code")),
        };
        state.code_redemptions.push((code_id, user_id));
        state
            .roles
            .entry(user_id)
            .or_default()
            .insert(AppRole::Business);

        Ok(AccessCodeRedemption { tier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        access_codes::{self, AccessCodeGrant, AccessTier},
        quests::{NewQuest, QuestDifficulty},
    };
    use chrono::Duration;

    fn auth_user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "player@gami.app".to_string(),
            full_name: Some("Player One".to_string()),
        }
    }

    async fn provisioned(store: &MemoryStore) -> Uuid {
        let user = auth_user();
        store
            .provision_user(&user, 100, false, Utc::now())
            .await
            .unwrap();
        user.id
    }

    async fn published_quest(store: &MemoryStore, reward: i64, max_participants: Option<i32>) -> Quest {
        let new_quest = NewQuest {
            title: "Invite 3 Friends".to_string(),
            description: "Bring friends along".to_string(),
            reward_amount: reward,
            reward_token: None,
            difficulty: QuestDifficulty::Medium,
            max_participants,
            requirements: None,
            start_date: None,
            end_date: None,
            publish: true,
        };
        let quest = Quest::from_new(Uuid::new_v4(), new_quest, Utc::now());
        store.create_quest(&quest).await.unwrap()
    }

    fn code(max_uses: i32, expires_at: Option<DateTime<Utc>>) -> AccessCode {
        let grant = AccessCodeGrant {
            tier: AccessTier::Starter,
            max_uses,
            expires_at,
        };
        AccessCode::issue(grant, access_codes::generate_code(), Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn provisioning_is_idempotent() {
        let store = MemoryStore::new();
        let user = auth_user();

        store.provision_user(&user, 100, false, Utc::now()).await.unwrap();
        store.provision_user(&user, 500, true, Utc::now()).await.unwrap();

        let airdrop = store.get_airdrop(user.id).await.unwrap().unwrap();
        assert_eq!(airdrop.base_allocation, 100);
        assert_eq!(
            store.get_roles(user.id).await.unwrap(),
            vec![AppRole::User, AppRole::Admin]
        );
        assert_eq!(store.get_wallet(user.id).await.unwrap().unwrap().xp, 0);
    }

    #[tokio::test]
    async fn claiming_twice_credits_once() {
        let store = MemoryStore::new();
        let user = provisioned(&store).await;
        let quest = published_quest(&store, 750, None).await;
        let participant = store.join_quest(quest.id, user, Utc::now()).await.unwrap();

        let receipt = store
            .claim_reward(participant.id, user, 750, Utc::now())
            .await
            .unwrap();
        assert_eq!(receipt.new_xp, 750);
        assert_eq!(receipt.airdrop.total_allocation, 175);

        let second = store
            .claim_reward(participant.id, user, 750, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            second,
            RepositoryError::Rejected(Rejection::AlreadyClaimed)
        ));

        let wallet = store.get_wallet(user).await.unwrap().unwrap();
        assert_eq!(wallet.xp, 750);
        let ledger = store.list_transactions(user, 100).await.unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_credit_once() {
        let store = MemoryStore::new();
        let user = provisioned(&store).await;
        let quest = published_quest(&store, 1200, None).await;
        let participant = store.join_quest(quest.id, user, Utc::now()).await.unwrap();

        let participant_id = participant.id;
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim_reward(participant_id, user, 1200, Utc::now()).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        let wallet = store.get_wallet(user).await.unwrap().unwrap();
        assert_eq!(wallet.xp, 1200);
        assert_eq!(wallet.level, 2);
    }

    #[tokio::test]
    async fn tampered_reward_changes_nothing() {
        let store = MemoryStore::new();
        let user = provisioned(&store).await;
        let quest = published_quest(&store, 500, None).await;
        let participant = store.join_quest(quest.id, user, Utc::now()).await.unwrap();

        let err = store
            .claim_reward(participant.id, user, 50_000, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::RewardMismatch)));

        assert_eq!(store.get_wallet(user).await.unwrap().unwrap().xp, 0);
        let participations = store.list_participations(user).await.unwrap();
        assert_eq!(participations[0].status, QuestStatus::Active);
    }

    #[tokio::test]
    async fn claim_by_another_user_is_refused() {
        let store = MemoryStore::new();
        let owner = provisioned(&store).await;
        let intruder = provisioned(&store).await;
        let quest = published_quest(&store, 500, None).await;
        let participant = store.join_quest(quest.id, owner, Utc::now()).await.unwrap();

        let err = store
            .claim_reward(participant.id, intruder, 500, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::NotParticipant)));
    }

    #[tokio::test]
    async fn redemption_fails_instead_of_underflowing() {
        let store = MemoryStore::new();
        let user = provisioned(&store).await;
        let quest = published_quest(&store, 1500, None).await;
        let participant = store.join_quest(quest.id, user, Utc::now()).await.unwrap();
        store
            .claim_reward(participant.id, user, 1500, Utc::now())
            .await
            .unwrap();

        let err = store
            .redeem_reward(user, "Premium NFT Avatar", 5000, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Rejected(Rejection::InsufficientXp {
                available: 1500,
                required: 5000
            })
        ));

        let receipt = store
            .redeem_reward(user, "Exclusive Discord Role", 1500, Utc::now())
            .await
            .unwrap();
        assert_eq!(receipt, RedemptionReceipt { new_xp: 0, new_level: 1 });

        // Level bonus already earned stays on the allocation.
        let airdrop = store.get_airdrop(user).await.unwrap().unwrap();
        assert_eq!(airdrop.level_bonus, 10);

        let ledger = store.list_transactions(user, 100).await.unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn claim_after_redemption_keeps_airdrop_level_bonus() {
        let store = MemoryStore::new();
        let user = provisioned(&store).await;

        let big = published_quest(&store, 5000, None).await;
        let participant = store.join_quest(big.id, user, Utc::now()).await.unwrap();
        store
            .claim_reward(participant.id, user, 5000, Utc::now())
            .await
            .unwrap();
        let before = store.get_airdrop(user).await.unwrap().unwrap();
        assert_eq!(before.level_bonus, 50);
        assert_eq!(before.total_allocation, 650);

        store
            .redeem_reward(user, "Premium NFT Avatar", 5000, Utc::now())
            .await
            .unwrap();

        let small = published_quest(&store, 100, None).await;
        let participant = store.join_quest(small.id, user, Utc::now()).await.unwrap();
        let receipt = store
            .claim_reward(participant.id, user, 100, Utc::now())
            .await
            .unwrap();
        assert_eq!(receipt.new_level, 1);

        let after = store.get_airdrop(user).await.unwrap().unwrap();
        assert_eq!(after.level_bonus, 50);
        assert_eq!(after.quest_bonus, 510);
        assert_eq!(after.total_allocation, 660);
    }

    #[tokio::test]
    async fn joins_stop_at_participant_limit() {
        let store = MemoryStore::new();
        let quest = published_quest(&store, 100, Some(2)).await;

        let first = provisioned(&store).await;
        let second = provisioned(&store).await;
        let third = provisioned(&store).await;

        store.join_quest(quest.id, first, Utc::now()).await.unwrap();
        let again = store.join_quest(quest.id, first, Utc::now()).await.unwrap_err();
        assert!(matches!(again, RepositoryError::Rejected(Rejection::AlreadyJoined)));

        store.join_quest(quest.id, second, Utc::now()).await.unwrap();
        let full = store.join_quest(quest.id, third, Utc::now()).await.unwrap_err();
        assert!(matches!(full, RepositoryError::Rejected(Rejection::QuestFull)));

        let stored = store.get_quest(quest.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 2);
    }

    #[tokio::test]
    async fn only_the_owner_manages_a_quest() {
        let store = MemoryStore::new();
        let quest = published_quest(&store, 100, None).await;
        let player = provisioned(&store).await;
        let participant = store.join_quest(quest.id, player, Utc::now()).await.unwrap();
        let stranger = Uuid::new_v4();

        let err = store
            .update_quest_status(quest.id, stranger, QuestStatus::Completed, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::NotQuestOwner)));

        let err = store
            .update_progress(participant.id, stranger, 40, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::NotQuestOwner)));

        let updated = store
            .update_progress(participant.id, quest.business_id, 40, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.progress, 40);

        let listed = store
            .list_participants(quest.id, quest.business_id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let closed = store
            .update_quest_status(quest.id, quest.business_id, QuestStatus::Completed, Utc::now())
            .await
            .unwrap();
        assert_eq!(closed.status, QuestStatus::Completed);

        let err = store
            .claim_reward(participant.id, player, 100, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::QuestNotActive)));
    }

    #[tokio::test]
    async fn access_code_uses_never_exceed_limit() {
        let store = MemoryStore::new();
        let access_code = store.insert_code(&code(2, None)).await.unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            let user = provisioned(&store).await;
            outcomes.push(store.redeem_code(&access_code.code, user, Utc::now()).await);
        }

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 2);
        assert!(matches!(
            outcomes.last(),
            Some(Err(RepositoryError::Rejected(Rejection::AccessCodeExhausted)))
        ));

        let summaries = store.list_codes().await.unwrap();
        assert_eq!(summaries[0].redemptions, 2);
        assert_eq!(summaries[0].access_code.current_uses, 2);
    }

    #[tokio::test]
    async fn access_code_redemption_rules() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = provisioned(&store).await;

        let expired = store
            .insert_code(&code(5, Some(now - Duration::minutes(1))))
            .await
            .unwrap();
        let err = store.redeem_code(&expired.code, user, now).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::AccessCodeExpired)));

        let err = store.redeem_code("NOPE-NOPE-NOPE-NOPE", user, now).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::UnknownAccessCode)));

        let valid = store.insert_code(&code(5, None)).await.unwrap();
        store.set_active(valid.id, false, now).await.unwrap();
        let err = store.redeem_code(&valid.code, user, now).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::AccessCodeInactive)));

        store.set_active(valid.id, true, now).await.unwrap();
        let redemption = store.redeem_code(&valid.code, user, now).await.unwrap();
        assert_eq!(redemption.tier, "starter");
        assert!(store.has_role(user, AppRole::Business).await.unwrap());

        let err = store.redeem_code(&valid.code, user, now).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Rejected(Rejection::AccessCodeAlreadyUsed)));
    }

    #[tokio::test]
    async fn generated_address_is_kept_unless_replaced() {
        let store = MemoryStore::new();
        let user = provisioned(&store).await;
        let first = "0x1111111111111111111111111111111111111111";
        let second = "0x2222222222222222222222222222222222222222";

        let wallet = store.assign_wallet_address(user, first, false, Utc::now()).await.unwrap();
        assert_eq!(wallet.wallet_address.as_deref(), Some(first));

        let wallet = store.assign_wallet_address(user, second, false, Utc::now()).await.unwrap();
        assert_eq!(wallet.wallet_address.as_deref(), Some(first));

        let wallet = store.assign_wallet_address(user, second, true, Utc::now()).await.unwrap();
        assert_eq!(wallet.wallet_address.as_deref(), Some(second));
    }
}

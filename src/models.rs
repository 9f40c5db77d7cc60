pub mod access_codes;
pub mod airdrops;
pub mod checkout;
pub mod quests;
pub mod transactions;
pub mod users;
pub mod wallets;

/// A request the domain rules refuse. Messages are shown to end users as-is.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Quest reward already claimed")]
    AlreadyClaimed,
    #[error("Reward amount does not match quest")]
    RewardMismatch,
    #[error("Quest is not active")]
    QuestNotActive,
    #[error("Quest is not open for participation")]
    QuestClosed,
    #[error("Quest has reached its participant limit")]
    QuestFull,
    #[error("Already participating in this quest")]
    AlreadyJoined,
    #[error("Participation does not belong to this user")]
    NotParticipant,
    #[error("Quest does not belong to this business")]
    NotQuestOwner,
    #[error("Cannot change quest status from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },
    #[error("Insufficient XP: {available} available, {required} required")]
    InsufficientXp { available: i64, required: i64 },
    #[error("Invalid access code")]
    UnknownAccessCode,
    #[error("Access code is inactive")]
    AccessCodeInactive,
    #[error("Access code has expired")]
    AccessCodeExpired,
    #[error("Access code usage limit reached")]
    AccessCodeExhausted,
    #[error("Access code already used")]
    AccessCodeAlreadyUsed,
    #[error("Invalid wallet address format")]
    InvalidWalletAddress,
}

impl Rejection {
    pub fn invalid(message: impl Into<String>) -> Self {
        Rejection::InvalidInput(message.into())
    }

    /// Rejections caused by state that already exists, as opposed to bad input.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Rejection::AlreadyClaimed | Rejection::AlreadyJoined | Rejection::AccessCodeAlreadyUsed
        )
    }

    /// Rejections for acting on a row owned by someone else.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Rejection::NotQuestOwner | Rejection::NotParticipant)
    }
}

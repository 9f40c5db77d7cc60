use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::Rejection;

pub const XP_PER_LEVEL: i64 = 1000;
pub const MAX_LEVEL: i32 = 100;
pub const MAX_REDEMPTION_COST: i64 = 100_000;
pub const MAX_REWARD_NAME_LEN: usize = 120;
pub const DEFAULT_TOKEN: &str = "GAMI";

/// `min(floor(xp / 1000) + 1, 100)`. Negative input is treated as zero.
pub fn level_for_xp(xp: i64) -> i32 {
    let level = xp.max(0) / XP_PER_LEVEL + 1;
    level.min(MAX_LEVEL as i64) as i32
}

/// Total XP needed to reach the level after `level`, or 0 at the cap.
pub fn xp_for_next_level(level: i32) -> i64 {
    if level >= MAX_LEVEL {
        return 0;
    }
    level as i64 * XP_PER_LEVEL
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub xp: i64,
    pub level: i32,
    pub balance: i64,
    pub token: String,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Wallet {
            id: Uuid::new_v4(),
            user_id,
            xp: 0,
            level: 1,
            balance: 0,
            token: DEFAULT_TOKEN.to_string(),
            wallet_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds XP and recomputes the level. Returns the previous level.
    pub fn credit_xp(&mut self, amount: i64) -> Result<i32, Rejection> {
        if amount <= 0 {
            return Err(Rejection::invalid("XP amount must be positive"));
        }
        let previous = self.level;
        self.xp = self
            .xp
            .checked_add(amount)
            .ok_or_else(|| Rejection::invalid("XP amount too large"))?;
        self.level = level_for_xp(self.xp);
        Ok(previous)
    }

    pub fn debit_xp(&mut self, cost: i64) -> Result<(), Rejection> {
        if cost <= 0 {
            return Err(Rejection::invalid("Reward cost must be positive"));
        }
        if self.xp < cost {
            return Err(Rejection::InsufficientXp {
                available: self.xp,
                required: cost,
            });
        }
        self.xp -= cost;
        self.level = level_for_xp(self.xp);
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RedeemReward {
    pub reward_name: String,
    pub cost: i64,
}

impl RedeemReward {
    pub fn validate(&self) -> Result<(), Rejection> {
        let name = self.reward_name.trim();
        if name.is_empty() || name.chars().count() > MAX_REWARD_NAME_LEN {
            return Err(Rejection::invalid("Reward name is invalid"));
        }
        if self.cost <= 0 || self.cost > MAX_REDEMPTION_COST {
            return Err(Rejection::invalid("Reward cost is out of range"));
        }
        Ok(())
    }
}

/// A wallet as shown to its owner, with the XP target for the next level.
#[derive(Clone, Debug, Serialize)]
pub struct WalletSummary {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub next_level_xp: i64,
}

impl From<Wallet> for WalletSummary {
    fn from(wallet: Wallet) -> Self {
        let next_level_xp = xp_for_next_level(wallet.level);
        WalletSummary {
            wallet,
            next_level_xp,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RedemptionReceipt {
    pub new_xp: i64,
    pub new_level: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LinkWalletAddress {
    pub address: String,
}

/// Accepts `0x` followed by exactly 40 hex digits.
pub fn is_valid_wallet_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Derives an address from the last 20 bytes of `sha256(user_id || nonce)`.
pub fn derive_wallet_address(user_id: &Uuid, nonce: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(nonce);
    let digest = hasher.finalize();

    let hex: String = digest[12..].iter().map(|b| format!("{:02x}", b)).collect();
    format!("0x{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_with_xp(xp: i64) -> Wallet {
        let mut wallet = Wallet::new(Uuid::new_v4(), Utc::now());
        wallet.xp = xp;
        wallet.level = level_for_xp(xp);
        wallet
    }

    #[test]
    fn level_follows_fixed_step_formula() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(999), 1);
        assert_eq!(level_for_xp(1000), 2);
        assert_eq!(level_for_xp(12_845), 13);
        assert_eq!(level_for_xp(98_999), 99);
        assert_eq!(level_for_xp(99_000), 100);
        assert_eq!(level_for_xp(5_000_000), 100);
    }

    #[test]
    fn level_matches_formula_across_range() {
        for xp in (0..250_000).step_by(37) {
            let expected = std::cmp::min(xp / 1000 + 1, 100) as i32;
            assert_eq!(level_for_xp(xp), expected, "xp = {}", xp);
        }
    }

    #[test]
    fn next_level_threshold_stops_at_cap() {
        assert_eq!(xp_for_next_level(1), 1000);
        assert_eq!(xp_for_next_level(42), 42_000);
        assert_eq!(xp_for_next_level(MAX_LEVEL), 0);
    }

    #[test]
    fn credit_recomputes_level() {
        let mut wallet = wallet_with_xp(900);
        let previous = wallet.credit_xp(250).unwrap();

        assert_eq!(previous, 1);
        assert_eq!(wallet.xp, 1150);
        assert_eq!(wallet.level, 2);
    }

    #[test]
    fn credit_rejects_non_positive_amounts() {
        let mut wallet = wallet_with_xp(10);
        assert!(wallet.credit_xp(0).is_err());
        assert!(wallet.credit_xp(-5).is_err());
        assert_eq!(wallet.xp, 10);
    }

    #[test]
    fn debit_never_underflows() {
        let mut wallet = wallet_with_xp(1500);
        let err = wallet.debit_xp(2000).unwrap_err();

        assert_eq!(
            err,
            Rejection::InsufficientXp {
                available: 1500,
                required: 2000
            }
        );
        assert_eq!(wallet.xp, 1500);
        assert_eq!(wallet.level, 2);
    }

    #[test]
    fn debit_can_drop_level() {
        let mut wallet = wallet_with_xp(2100);
        wallet.debit_xp(1500).unwrap();

        assert_eq!(wallet.xp, 600);
        assert_eq!(wallet.level, 1);
    }

    #[test]
    fn debit_of_entire_balance_is_allowed() {
        let mut wallet = wallet_with_xp(5000);
        wallet.debit_xp(5000).unwrap();
        assert_eq!(wallet.xp, 0);
        assert_eq!(wallet.level, 1);
    }

    #[test]
    fn redemption_request_bounds() {
        let ok = RedeemReward {
            reward_name: "Premium NFT Avatar".to_string(),
            cost: 5000,
        };
        assert!(ok.validate().is_ok());

        let blank = RedeemReward {
            reward_name: "  ".to_string(),
            cost: 5000,
        };
        assert!(blank.validate().is_err());

        let too_expensive = RedeemReward {
            reward_name: "Yacht".to_string(),
            cost: MAX_REDEMPTION_COST + 1,
        };
        assert!(too_expensive.validate().is_err());
    }

    #[test]
    fn wallet_address_format() {
        assert!(is_valid_wallet_address(
            "0x52908400098527886E0F7030069857D2E4169EE7"
        ));
        assert!(!is_valid_wallet_address(
            "52908400098527886E0F7030069857D2E4169EE7"
        ));
        assert!(!is_valid_wallet_address("0x1234...5678"));
        assert!(!is_valid_wallet_address(
            "0x52908400098527886E0F7030069857D2E4169EE7aa"
        ));
    }

    #[test]
    fn derived_addresses_are_valid_and_nonce_dependent() {
        let user = Uuid::new_v4();
        let a = derive_wallet_address(&user, b"one");
        let b = derive_wallet_address(&user, b"two");

        assert!(is_valid_wallet_address(&a));
        assert_eq!(a, a.to_lowercase());
        assert_ne!(a, b);
        assert_eq!(a, derive_wallet_address(&user, b"one"));
    }
}

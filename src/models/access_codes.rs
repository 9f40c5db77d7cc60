use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::Rejection;

pub const MAX_USES_LIMIT: i64 = 10_000;
pub const MAX_EXPIRY_DAYS: i64 = 3650;

const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    Starter,
    Growth,
    Enterprise,
    Free,
}

impl AccessTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::Starter => "starter",
            AccessTier::Growth => "growth",
            AccessTier::Enterprise => "enterprise",
            AccessTier::Free => "free",
        }
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessTier {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(AccessTier::Starter),
            "growth" => Ok(AccessTier::Growth),
            "enterprise" => Ok(AccessTier::Enterprise),
            "free" => Ok(AccessTier::Free),
            _ => Err(Rejection::invalid(
                "Invalid tier. Must be one of: starter, growth, enterprise, free",
            )),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct AccessCode {
    pub id: Uuid,
    pub code: String,
    pub tier: String,
    pub max_uses: i32,
    pub current_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessCode {
    pub fn issue(grant: AccessCodeGrant, code: String, created_by: Uuid, now: DateTime<Utc>) -> Self {
        AccessCode {
            id: Uuid::new_v4(),
            code,
            tier: grant.tier.to_string(),
            max_uses: grant.max_uses,
            current_uses: 0,
            expires_at: grant.expires_at,
            is_active: true,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), Rejection> {
        if !self.is_active {
            return Err(Rejection::AccessCodeInactive);
        }
        if matches!(self.expires_at, Some(expires_at) if expires_at <= now) {
            return Err(Rejection::AccessCodeExpired);
        }
        if self.current_uses >= self.max_uses {
            return Err(Rejection::AccessCodeExhausted);
        }
        Ok(())
    }

    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.current_uses += 1;
        self.updated_at = now;
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct AccessCodeSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub access_code: AccessCode,
    pub redemptions: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenerateAccessCode {
    pub tier: String,
    pub max_uses: Option<i64>,
    pub expires_in_days: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessCodeGrant {
    pub tier: AccessTier,
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl GenerateAccessCode {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<AccessCodeGrant, Rejection> {
        let tier = self.tier.parse::<AccessTier>()?;

        let max_uses = self.max_uses.unwrap_or(1);
        if !(1..=MAX_USES_LIMIT).contains(&max_uses) {
            return Err(Rejection::invalid("max_uses must be between 1 and 10000"));
        }

        let expires_at = match self.expires_in_days {
            Some(days) if (1..=MAX_EXPIRY_DAYS).contains(&days) => Some(now + Duration::days(days)),
            Some(_) => {
                return Err(Rejection::invalid(
                    "expires_in_days must be between 1 and 3650 (10 years)",
                ))
            }
            None => None,
        };

        Ok(AccessCodeGrant {
            tier,
            max_uses: max_uses as i32,
            expires_at,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RedeemAccessCode {
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessCodeRedemption {
    pub tier: String,
}

/// Formats 16 bytes as `XXXX-XXXX-XXXX-XXXX` over the base62 alphabet.
pub fn format_code(bytes: &[u8; 16]) -> String {
    let chars: Vec<char> = bytes
        .iter()
        .map(|b| BASE62[(*b as usize) % BASE62.len()] as char)
        .collect();

    chars
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

/// 16 bytes taken from hashing two v4 uuids, so every byte is uniformly spread.
pub fn random_code_bytes() -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes
}

pub fn generate_code() -> String {
    format_code(&random_code_bytes())
}

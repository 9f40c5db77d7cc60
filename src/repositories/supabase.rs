use anyhow::bail;
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::users::AuthUser;

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl From<SupabaseUser> for AuthUser {
    fn from(user: SupabaseUser) -> Self {
        let full_name = user
            .user_metadata
            .get("full_name")
            .and_then(|name| name.as_str())
            .map(str::to_string);

        AuthUser {
            id: user.id,
            email: user.email.unwrap_or_default(),
            full_name,
        }
    }
}

/// Client for the Supabase Auth (GoTrue) REST API.
pub struct SupabaseAuthApi {
    url: String,
    anon_key: String,
    client: reqwest::Client,
}

impl SupabaseAuthApi {
    pub fn new(url: String, anon_key: String) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            client: reqwest::Client::new(),
        }
    }

    /// Resolves an access token to its user. `Ok(None)` means the token was refused.
    pub async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, anyhow::Error> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Ok(None),
            status if !status.is_success() => bail!("Supabase: unexpected status {}.", status),
            _ => {}
        }

        let user: SupabaseUser = response.json().await?;
        Ok(Some(user.into()))
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Supabase {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_token_cache_secs")]
    pub token_cache_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Stripe {
    pub secret_key: String,
    #[serde(default = "default_stripe_url")]
    pub api_url: String,
    #[serde(default = "default_origin")]
    pub default_origin: String,
    #[serde(default = "default_min_response_ms")]
    pub min_response_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Gamification {
    #[serde(default = "default_base_allocation")]
    pub base_allocation: i64,
    /// Users granted the admin role when first provisioned.
    #[serde(default)]
    pub admin_users: Vec<Uuid>,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            listen: default_listen(),
        }
    }
}

impl Default for Postgres {
    fn default() -> Self {
        Postgres {
            url: String::new(),
            max_connections: default_max_connections(),
            run_migrations: true,
        }
    }
}

impl Default for Gamification {
    fn default() -> Self {
        Gamification {
            base_allocation: default_base_allocation(),
            admin_users: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Only read with `--storage postgres`.
    #[serde(default)]
    pub postgres: Postgres,
    #[serde(default)]
    pub server: Server,
    pub supabase: Supabase,
    pub stripe: Stripe,
    #[serde(default)]
    pub gamification: Gamification,
}

impl Settings {
    /// Loads `path`, then lets `GAMI__SECTION__KEY` environment variables
    /// override individual values.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("GAMI")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("gamification.admin_users")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_token_cache_secs() -> u64 {
    60
}

fn default_stripe_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_min_response_ms() -> u64 {
    300
}

fn default_base_allocation() -> i64 {
    100
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sqlx::postgres::PgPoolOptions;

mod models;
mod repositories;
pub mod services;
pub mod settings;

use repositories::{memory::MemoryStore, Repositories};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Storage {
    Postgres,
    /// Process-local state, lost on exit.
    Memory,
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Overrides `server.listen`.
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    #[arg(long, value_enum, default_value_t = Storage::Postgres)]
    storage: Storage,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log4rs)?;
    let mut settings =
        settings::Settings::new(&args.config).context("Failed to load settings.")?;
    if let Some(listen) = args.listen {
        settings.server.listen = listen;
    }

    log::info!("Starting Gami backend.");

    let repositories = match args.storage {
        Storage::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(settings.postgres.max_connections)
                .connect(&settings.postgres.url)
                .await
                .context("Could not connect to database.")?;

            if settings.postgres.run_migrations {
                log::info!("Running database migrations.");
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Could not run database migrations.")?;
            }

            Repositories::postgres(pool)
        }
        Storage::Memory => {
            log::warn!("Using in-memory storage, nothing will be persisted.");
            Repositories::memory(MemoryStore::new())
        }
    };

    services::start_services(repositories, settings)
        .await
        .context("Could not start services.")
}

fn init_logging(path: &str) -> Result<()> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}

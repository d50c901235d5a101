//! Dhukuti API server
//!
//! Runs the HTTP API (`serve`, the default), seeds demo data (`seed`) or
//! prints a bearer token (`token --user-id N`).

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dhukuti_api::{seed, server, AppState, Cli, Command};
use dhukuti_core::circle::{Store, UserId};
use dhukuti_core::CircleManager;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli);

    let store = Store::new(&cli.database)
        .with_context(|| format!("failed to open database {}", cli.database.display()))?;
    let manager = Arc::new(CircleManager::from_store(store));

    match cli.command() {
        Command::Serve => {
            let addr = cli.listen_addr()?;
            let auth = Arc::new(cli.authenticator()?);
            tracing::info!(
                environment = %cli.environment,
                database = %cli.database.display(),
                "Starting Dhukuti API"
            );
            server::serve(addr, AppState::new(manager, auth)).await?;
        }
        Command::Seed => {
            let report = tokio::task::spawn_blocking(move || seed::run(&manager)).await??;
            tracing::info!(
                users = report.users.len(),
                circles = report.circles.len(),
                "Database seed completed"
            );
        }
        Command::Token { user_id } => {
            let user_id = UserId(user_id);
            if manager.get_user(user_id)?.is_none() {
                anyhow::bail!("user {user_id} not found");
            }
            let token = cli.authenticator()?.issue_token(user_id)?;
            println!("{token}");
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

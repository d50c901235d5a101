//! Process configuration.
//!
//! Every flag can also be set from the environment. `main` loads a `.env`
//! file first, when present.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::auth::JwtAuthenticator;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is missing or malformed
    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Dhukuti API server
#[derive(Debug, Parser)]
#[command(name = "dhukuti")]
#[command(about = "Dhukuti - savings circles run by unanimous consent", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Listen address
    #[arg(
        short,
        long,
        global = true,
        env = "DHUKUTI_LISTEN_ADDR",
        default_value = "0.0.0.0:8080"
    )]
    pub listen: String,

    /// SQLite database file
    #[arg(
        short,
        long,
        global = true,
        env = "DHUKUTI_DATABASE",
        default_value = "dhukuti.db"
    )]
    pub database: PathBuf,

    /// Secret for signing bearer tokens
    #[arg(long, global = true, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in hours
    #[arg(long, global = true, env = "JWT_EXPIRY_HOURS", default_value_t = 24)]
    pub jwt_expiry_hours: u64,

    /// Deployment environment
    #[arg(long, global = true, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    /// Log level
    #[arg(long, global = true, env = "DHUKUTI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true, env = "DHUKUTI_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to run
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Insert demo users and circles
    Seed,
    /// Print a bearer token for a user
    Token {
        /// User to issue the token for
        #[arg(long)]
        user_id: i64,
    },
}

impl Cli {
    /// Whether the process runs in development mode.
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(
            self.environment.to_lowercase().as_str(),
            "development" | "dev"
        )
    }

    /// Parses the listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid listen address: {e}")))
    }

    /// Builds the token authenticator.
    ///
    /// Development mode falls back to a built-in secret when none is set.
    ///
    /// # Errors
    ///
    /// Returns an error outside development if the secret is missing or
    /// too short.
    pub fn authenticator(&self) -> Result<JwtAuthenticator, ConfigError> {
        let expiry_seconds = self.jwt_expiry_hours.saturating_mul(3600);
        match self.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                match JwtAuthenticator::new(secret.to_string(), expiry_seconds) {
                    Err(_) if self.is_development() => {
                        tracing::warn!("JWT_SECRET is too short; using the development secret");
                        Ok(JwtAuthenticator::new_dev(expiry_seconds))
                    }
                    result => result,
                }
            }
            _ if self.is_development() => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                Ok(JwtAuthenticator::new_dev(expiry_seconds))
            }
            _ => Err(ConfigError::Invalid(
                "JWT_SECRET is required outside development".to_string(),
            )),
        }
    }

    /// The subcommand to run, defaulting to `serve`.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dhukuti").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&["--environment", "development"]);
        assert_eq!(cli.listen_addr().unwrap().port(), 8080);
        assert_eq!(cli.jwt_expiry_hours, 24);
        assert!(matches!(cli.command(), Command::Serve));
    }

    #[test]
    fn production_requires_a_long_secret() {
        let missing = parse(&["--environment", "production"]);
        if missing.jwt_secret.is_none() {
            assert!(missing.authenticator().is_err());
        }

        let short = parse(&["--environment", "production", "--jwt-secret", "short"]);
        assert!(short.authenticator().is_err());

        let secret = "s".repeat(32);
        let ok = parse(&["--environment", "production", "--jwt-secret", &secret]);
        assert!(ok.authenticator().is_ok());
    }

    #[test]
    fn development_falls_back_to_builtin_secret() {
        let cli = parse(&["--environment", "dev", "--jwt-secret", "short"]);
        assert!(cli.is_development());
        assert!(cli.authenticator().is_ok());
    }

    #[test]
    fn token_subcommand_accepts_global_flags_after_it() {
        let cli = parse(&["token", "--user-id", "7", "--database", "other.db"]);
        assert!(matches!(cli.command(), Command::Token { user_id: 7 }));
        assert_eq!(cli.database, PathBuf::from("other.db"));
    }

    #[test]
    fn malformed_listen_address() {
        let cli = parse(&["--listen", "not-an-address"]);
        assert!(cli.listen_addr().is_err());
    }
}

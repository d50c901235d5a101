//! Dhukuti API
//!
//! HTTP surface for Dhukuti savings circles:
//! - Bearer-token authentication
//! - Circle, admission, amount and contribution routes under `/api/v1`
//! - Request tracing with `x-request-id`
//! - `seed` and `token` maintenance commands

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod server;
pub mod state;

pub use auth::{Authenticator, Caller, JwtAuthenticator};
pub use config::{Cli, Command, ConfigError};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

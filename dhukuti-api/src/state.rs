//! Application state for API handlers

use std::sync::Arc;

use dhukuti_core::CircleManager;

use crate::auth::Authenticator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Circle operations
    pub circles: Arc<CircleManager>,

    /// Bearer-token verifier
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    /// Create new application state
    pub fn new(circles: Arc<CircleManager>, auth: Arc<dyn Authenticator>) -> Self {
        Self { circles, auth }
    }
}

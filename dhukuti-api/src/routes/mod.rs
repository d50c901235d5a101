//! API router configuration

mod circles;
mod health;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use circles::{AddMemberRequest, CreateCircleRequest, ProposeAmountRequest, RoundResponse};
pub use health::HealthResponse;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Circles
        .route(
            "/circles",
            get(circles::list_circles).post(circles::create_circle),
        )
        .route("/circles/:id", get(circles::get_circle))
        // Admission
        .route("/circles/:id/members", post(circles::add_member))
        .route("/circles/:id/approve/:user_id", post(circles::approve_member))
        // Amount
        .route("/circles/:id/propose-amount", post(circles::propose_amount))
        .route("/circles/:id/approve-amount", post(circles::approve_amount))
        // Contributions
        .route(
            "/circles/:id/contributions",
            get(circles::list_contributions).post(circles::record_contribution),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
        .with_state(state)
}

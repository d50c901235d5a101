//! Circle handlers
//!
//! Each handler runs one `CircleManager` call on the blocking pool; the
//! manager holds the store lock for the whole transaction.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use dhukuti_core::circle::{
    CircleConfig, CircleError, CircleId, CircleView, ContributionView, Result as CircleResult, Role,
    UserId,
};
use dhukuti_core::CircleManager;
use serde::{Deserialize, Serialize};

use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Create circle request
#[derive(Debug, Deserialize)]
pub struct CreateCircleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "amountPerMember")]
    pub amount_per_member: u64,
}

/// Invite member request
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    #[serde(alias = "userId")]
    pub user_id: i64,
    /// `admin` or `member`; defaults to `member`
    #[serde(default)]
    pub role: Option<String>,
}

/// Propose amount request
#[derive(Debug, Deserialize)]
pub struct ProposeAmountRequest {
    #[serde(alias = "newAmount")]
    pub new_amount: u64,
}

/// Outcome of a consensus action
#[derive(Debug, Serialize)]
pub struct RoundResponse {
    pub message: &'static str,
    /// Whether this call completed the round
    pub finalized: bool,
}

/// Recorded contribution
#[derive(Debug, Serialize)]
pub struct ContributionResponse {
    pub message: &'static str,
    pub id: i64,
    pub amount: u64,
    pub month: String,
}

async fn run<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&CircleManager) -> CircleResult<T> + Send + 'static,
    T: Send + 'static,
{
    let circles = Arc::clone(&state.circles);
    tokio::task::spawn_blocking(move || f(&circles))
        .await
        .map_err(|e| ApiError::Internal(format!("circle task failed: {e}")))?
        .map_err(ApiError::from)
}

fn parse_role(role: Option<&str>) -> CircleResult<Role> {
    match role.map(str::trim) {
        None | Some("") => Ok(Role::default()),
        Some(value) => Role::parse(value)
            .ok_or_else(|| CircleError::Validation("role must be admin or member".to_string())),
    }
}

/// List the caller's circles
pub async fn list_circles(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<CircleView>>> {
    run(&state, move |m| m.list_circles(caller)).await.map(Json)
}

/// Create a circle with the caller as admin
pub async fn create_circle(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<CreateCircleRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CircleView>)> {
    let Json(req) = payload?;
    let config =
        CircleConfig::new(req.name, req.amount_per_member).with_description(req.description);

    let view = run(&state, move |m| {
        let circle = m.create_circle(caller, &config)?;
        m.get_circle(caller, circle.id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get one circle
pub async fn get_circle(
    State(state): State<AppState>,
    Caller(caller): Caller,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<CircleView>> {
    let Path(id) = path?;
    run(&state, move |m| m.get_circle(caller, CircleId(id)))
        .await
        .map(Json)
}

/// Invite a user, opening an admission round
pub async fn add_member(
    State(state): State<AppState>,
    Caller(caller): Caller,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AddMemberRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RoundResponse>)> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let role = parse_role(req.role.as_deref());

    // Only an admin learns that the requested role is malformed.
    let outcome = run(&state, move |m| {
        let circle_id = CircleId(id);
        let role = match role {
            Ok(role) => role,
            Err(e) => {
                m.require_admin(circle_id, caller, "add members")?;
                return Err(e);
            }
        };
        m.invite_member(circle_id, UserId(req.user_id), caller, role)
    })
    .await?;

    let message = if outcome.finalized {
        "Member added"
    } else {
        "Invitation sent. Requires approval from all members."
    };
    Ok((
        StatusCode::CREATED,
        Json(RoundResponse {
            message,
            finalized: outcome.finalized,
        }),
    ))
}

/// Cast an admission vote
pub async fn approve_member(
    State(state): State<AppState>,
    Caller(caller): Caller,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> ApiResult<Json<RoundResponse>> {
    let Path((id, pending_user)) = path?;
    let outcome = run(&state, move |m| {
        m.approve_member(CircleId(id), UserId(pending_user), caller)
    })
    .await?;

    Ok(Json(RoundResponse {
        message: "Member approved",
        finalized: outcome.finalized,
    }))
}

/// Propose a new amount, opening an amount round
pub async fn propose_amount(
    State(state): State<AppState>,
    Caller(caller): Caller,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProposeAmountRequest>, JsonRejection>,
) -> ApiResult<Json<RoundResponse>> {
    let Path(id) = path?;
    let Json(req) = payload?;

    let outcome = run(&state, move |m| {
        m.propose_amount(CircleId(id), caller, req.new_amount)
    })
    .await?;

    let message = if outcome.finalized {
        "Amount change applied"
    } else {
        "Amount change proposed and requires member approval"
    };
    Ok(Json(RoundResponse {
        message,
        finalized: outcome.finalized,
    }))
}

/// Cast an amount vote
pub async fn approve_amount(
    State(state): State<AppState>,
    Caller(caller): Caller,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<RoundResponse>> {
    let Path(id) = path?;
    let outcome = run(&state, move |m| m.approve_amount(CircleId(id), caller)).await?;

    Ok(Json(RoundResponse {
        message: "Amount change approved",
        finalized: outcome.finalized,
    }))
}

/// Record the caller's contribution for this month
pub async fn record_contribution(
    State(state): State<AppState>,
    Caller(caller): Caller,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<(StatusCode, Json<ContributionResponse>)> {
    let Path(id) = path?;
    let contribution = run(&state, move |m| m.record_contribution(CircleId(id), caller)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ContributionResponse {
            message: "Contribution recorded",
            id: contribution.id,
            amount: contribution.amount,
            month: contribution.month,
        }),
    ))
}

/// List a circle's contributions
pub async fn list_contributions(
    State(state): State<AppState>,
    Caller(caller): Caller,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<ContributionView>>> {
    let Path(id) = path?;
    run(&state, move |m| m.contributions(CircleId(id), caller))
        .await
        .map(Json)
}

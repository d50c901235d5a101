//! Contribution log.
//!
//! Records that an active member paid the circle's current amount for the
//! current month. Payment itself happens elsewhere.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::{CircleError, Result};
use super::ledger;
use super::storage::StoreTx;
use super::types::{CircleId, Contribution, MemberStatus, UserId};

/// A contribution annotated with the contributor's directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionView {
    /// Row identifier.
    pub id: i64,
    /// Contributing member.
    pub user_id: UserId,
    /// Contributor's display name, empty if the user has left the directory.
    pub user_name: String,
    /// Contributor's email, empty if the user has left the directory.
    pub user_email: String,
    /// Amount recorded.
    pub amount: u64,
    /// Calendar month (`YYYY-MM`).
    pub month: String,
    /// When the contribution was recorded (Unix timestamp).
    pub created_at: i64,
}

/// Formats the calendar month a timestamp falls in, in UTC.
pub(crate) fn month_of(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .format("%Y-%m")
        .to_string()
}

/// Records a contribution of the circle's current amount.
pub(crate) fn record(
    tx: &StoreTx<'_>,
    circle_id: CircleId,
    user_id: UserId,
    now: i64,
) -> Result<Contribution> {
    let circle = ledger::require_circle(tx, circle_id)?;

    match tx.get_member(circle_id, user_id)? {
        Some(member) if member.status == MemberStatus::Active => {}
        _ => {
            return Err(CircleError::Forbidden(
                "only active members can contribute".to_string(),
            ))
        }
    }

    let contribution = tx.insert_contribution(
        circle_id,
        user_id,
        circle.amount_per_member,
        &month_of(now),
        now,
    )?;

    tracing::info!(
        circle_id = %circle_id,
        user_id = %user_id,
        amount = contribution.amount,
        month = %contribution.month,
        "Recorded contribution"
    );
    Ok(contribution)
}

/// Lists a circle's contributions, newest first.
///
/// Pending members may read the log too.
pub(crate) fn list(
    tx: &StoreTx<'_>,
    circle_id: CircleId,
    caller_id: UserId,
) -> Result<Vec<ContributionView>> {
    if tx.get_member(circle_id, caller_id)?.is_none() {
        return Err(CircleError::Forbidden(
            "circle not found or you are not a member".to_string(),
        ));
    }

    let contributions = tx.contributions_for_circle(circle_id)?;

    let mut user_ids: Vec<UserId> = contributions.iter().map(|c| c.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let users: HashMap<_, _> = tx
        .users_by_ids(&user_ids)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(contributions
        .into_iter()
        .map(|c| {
            let (user_name, user_email) = users
                .get(&c.user_id)
                .map(|u| (u.name.clone(), u.email.clone()))
                .unwrap_or_default();
            ContributionView {
                id: c.id,
                user_id: c.user_id,
                user_name,
                user_email,
                amount: c.amount,
                month: c.month,
                created_at: c.created_at,
            }
        })
        .collect())
}

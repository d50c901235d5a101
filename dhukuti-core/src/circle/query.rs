//! Circle read-models.
//!
//! Summarizes ledger and ballot rows for one caller. Nothing here mutates
//! state. Listing uses one query per entity type across every circle and
//! groups the rows in memory.

use std::collections::HashMap;

use serde::Serialize;

use super::error::{CircleError, Result};
use super::storage::StoreTx;
use super::types::{
    AmountApproval, Circle, CircleId, CircleMember, MemberApproval, MemberStatus, Role, User,
    UserId,
};

/// A member of a circle with their directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Role within the circle.
    pub role: Role,
    /// Admission status.
    pub status: MemberStatus,
}

/// One active member's position on the open amount proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalStatus {
    /// Active member.
    pub user_id: UserId,
    /// Display name.
    pub user_name: String,
    /// Whether the member has approved. `false` when no round is open.
    pub approved: bool,
}

/// A circle as seen by one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircleView {
    /// Circle identifier.
    pub id: CircleId,
    /// Circle name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Current effective periodic contribution.
    pub amount_per_member: u64,
    /// Amount under vote, 0 when no proposal is open.
    pub proposed_amount: u64,
    /// User who created the circle.
    pub creator_id: UserId,
    /// Every member, pending or active.
    pub members: Vec<MemberView>,
    /// Pending users the caller still owes an admission vote.
    pub pending_approvals: Vec<UserId>,
    /// Whether the caller still owes a vote on the open amount proposal.
    pub needs_amount_approval: bool,
    /// Every active member's vote on the open amount proposal.
    pub amount_approvals: Vec<ApprovalStatus>,
}

/// Loads one circle for a caller who belongs to it.
///
/// Absent circles and circles the caller is not part of are
/// indistinguishable.
pub(crate) fn get_circle(
    tx: &StoreTx<'_>,
    caller_id: UserId,
    circle_id: CircleId,
) -> Result<CircleView> {
    let not_found = || CircleError::NotFound("circle not found or you are not a member".to_string());

    let circle = tx.get_circle(circle_id)?.ok_or_else(not_found)?;
    if tx.get_member(circle_id, caller_id)?.is_none() {
        return Err(not_found());
    }

    let mut views = assemble(tx, caller_id, vec![circle])?;
    views.pop().ok_or_else(not_found)
}

/// Loads every circle the caller belongs to, newest first.
pub(crate) fn list_circles(tx: &StoreTx<'_>, caller_id: UserId) -> Result<Vec<CircleView>> {
    let circles = tx.circles_for_user(caller_id)?;
    assemble(tx, caller_id, circles)
}

/// Builds views for `circles` with three batched queries, keeping order.
fn assemble(tx: &StoreTx<'_>, caller_id: UserId, circles: Vec<Circle>) -> Result<Vec<CircleView>> {
    if circles.is_empty() {
        return Ok(Vec::new());
    }
    let circle_ids: Vec<CircleId> = circles.iter().map(|c| c.id).collect();

    let mut members = group(tx.members_for_circles(&circle_ids)?, |(m, _)| m.circle_id);
    let mut owed = group(tx.owed_member_approvals(&circle_ids, caller_id)?, |a| a.circle_id);
    let mut ballots = group(tx.amount_approvals_for_circles(&circle_ids)?, |a| a.circle_id);

    Ok(circles
        .into_iter()
        .map(|circle| {
            let id = circle.id;
            build_view(
                circle,
                caller_id,
                members.remove(&id).unwrap_or_default(),
                owed.remove(&id).unwrap_or_default(),
                ballots.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}

fn group<T>(rows: Vec<T>, key: impl Fn(&T) -> CircleId) -> HashMap<CircleId, Vec<T>> {
    let mut grouped: HashMap<CircleId, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

fn build_view(
    circle: Circle,
    caller_id: UserId,
    members: Vec<(CircleMember, User)>,
    owed: Vec<MemberApproval>,
    ballots: Vec<AmountApproval>,
) -> CircleView {
    let votes: HashMap<UserId, bool> = ballots.iter().map(|b| (b.approver_id, b.approved)).collect();
    let needs_amount_approval = ballots
        .iter()
        .any(|b| b.approver_id == caller_id && !b.approved);

    let amount_approvals = members
        .iter()
        .filter(|(m, _)| m.status == MemberStatus::Active)
        .map(|(m, user)| ApprovalStatus {
            user_id: m.user_id,
            user_name: user.name.clone(),
            approved: votes.get(&m.user_id).copied().unwrap_or(false),
        })
        .collect();

    let members = members
        .into_iter()
        .map(|(m, user)| MemberView {
            id: m.user_id,
            name: user.name,
            email: user.email,
            role: m.role,
            status: m.status,
        })
        .collect();

    CircleView {
        id: circle.id,
        name: circle.name,
        description: circle.description,
        amount_per_member: circle.amount_per_member,
        proposed_amount: circle.proposed_amount,
        creator_id: circle.creator_id,
        members,
        pending_approvals: owed.into_iter().map(|a| a.pending_user_id).collect(),
        needs_amount_approval,
        amount_approvals,
    }
}

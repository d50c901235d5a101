//! Admission consensus.
//!
//! Inviting a user opens a round with one ballot per member that is
//! active at that moment. The invitee becomes active once every ballot of
//! the round is approved. Ballots stay in storage after the round
//! completes and serve as the admission record.
//!
//! Quorum is fixed when the round opens: members admitted later never gain
//! a vote in a round that is already running.

use super::error::{CircleError, Result};
use super::ledger;
use super::storage::StoreTx;
use super::types::{
    CircleId, CircleMember, MemberApproval, MemberStatus, Role, RoundOutcome, UserId,
};

/// Opens an admission round for `pending_user_id`.
///
/// The inviter's own ballot is pre-approved. When the inviter is the only
/// active member the round completes immediately.
pub(crate) fn open_round(
    tx: &StoreTx<'_>,
    circle_id: CircleId,
    pending_user_id: UserId,
    inviter_id: UserId,
    role: Role,
    now: i64,
) -> Result<RoundOutcome> {
    ledger::require_circle(tx, circle_id)?;
    ledger::require_active_admin(tx, circle_id, inviter_id, "add members")?;

    if tx.get_user(pending_user_id)?.is_none() {
        return Err(CircleError::NotFound(format!("user {pending_user_id} not found")));
    }
    if tx.get_member(circle_id, pending_user_id)?.is_some() {
        return Err(CircleError::Conflict(
            "user is already a member of this circle".to_string(),
        ));
    }

    tx.insert_member(&CircleMember {
        circle_id,
        user_id: pending_user_id,
        role,
        status: MemberStatus::Pending,
        created_at: now,
    })?;

    let voters = ledger::active_members(tx, circle_id)?;
    for voter in &voters {
        tx.insert_member_approval(
            &MemberApproval {
                circle_id,
                pending_user_id,
                approver_user_id: voter.user_id,
                approved: voter.user_id == inviter_id,
            },
            now,
        )?;
    }

    tracing::info!(
        circle_id = %circle_id,
        pending_user_id = %pending_user_id,
        inviter_id = %inviter_id,
        voters = voters.len(),
        "Opened admission round"
    );

    check_completion(tx, circle_id, pending_user_id)
}

/// Records `approver_id`'s vote to admit `pending_user_id`.
///
/// Fails with `NotFound` when the approver has no unapproved ballot in
/// the round, which covers both repeat votes and non-voters.
pub(crate) fn cast_vote(
    tx: &StoreTx<'_>,
    circle_id: CircleId,
    pending_user_id: UserId,
    approver_id: UserId,
) -> Result<RoundOutcome> {
    let flipped = tx.cast_member_approval(circle_id, pending_user_id, approver_id)?;
    if flipped == 0 {
        return Err(CircleError::NotFound(
            "approval record not found or you are not an approver".to_string(),
        ));
    }

    tracing::debug!(
        circle_id = %circle_id,
        pending_user_id = %pending_user_id,
        approver_id = %approver_id,
        "Cast admission vote"
    );

    check_completion(tx, circle_id, pending_user_id)
}

/// Activates the pending member if the round is unanimous.
///
/// Safe to run repeatedly: activation only touches a member that is still
/// pending, so at most one call reports `finalized`.
pub(crate) fn check_completion(
    tx: &StoreTx<'_>,
    circle_id: CircleId,
    pending_user_id: UserId,
) -> Result<RoundOutcome> {
    let tally = tx.member_tally(circle_id, pending_user_id)?;
    tracing::debug!(
        circle_id = %circle_id,
        pending_user_id = %pending_user_id,
        total = tally.total,
        approved = tally.approved,
        "Evaluated admission tally"
    );

    let finalized = tally.is_unanimous() && tx.activate_member(circle_id, pending_user_id)? > 0;
    if finalized {
        tracing::info!(
            circle_id = %circle_id,
            user_id = %pending_user_id,
            "Admission approved by all members"
        );
    }

    Ok(RoundOutcome { tally, finalized })
}

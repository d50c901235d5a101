//! Amount consensus.
//!
//! An admin proposes a new periodic contribution; every member active at
//! proposal time must approve it before it takes effect. A circle has at
//! most one open round: a new proposal discards the ballots of the previous
//! one, approved or not. Ballots are deleted once the round completes.

use super::error::{CircleError, Result};
use super::ledger;
use super::storage::StoreTx;
use super::types::{AmountApproval, CircleId, RoundOutcome, UserId};

/// Opens a new amount round, superseding any open one.
///
/// Must run inside a single transaction: the purge and the reseed are
/// never visible separately.
pub(crate) fn propose(
    tx: &StoreTx<'_>,
    circle_id: CircleId,
    proposer_id: UserId,
    new_amount: u64,
    now: i64,
) -> Result<RoundOutcome> {
    ledger::validate_amount(new_amount, "new amount")?;
    ledger::require_circle(tx, circle_id)?;
    ledger::require_active_admin(tx, circle_id, proposer_id, "propose amount changes")?;

    tx.set_proposed_amount(circle_id, new_amount)?;

    let superseded = tx.delete_amount_approvals(circle_id)?;
    if superseded > 0 {
        tracing::info!(
            circle_id = %circle_id,
            discarded_ballots = superseded,
            "Discarded previous amount round"
        );
    }

    let voters = ledger::active_members(tx, circle_id)?;
    for voter in &voters {
        tx.insert_amount_approval(
            &AmountApproval {
                circle_id,
                proposer_id,
                proposed_amount: new_amount,
                approver_id: voter.user_id,
                approved: voter.user_id == proposer_id,
            },
            now,
        )?;
    }

    tracing::info!(
        circle_id = %circle_id,
        proposer_id = %proposer_id,
        new_amount,
        voters = voters.len(),
        "Opened amount round"
    );

    finalize_if_unanimous(tx, circle_id)
}

/// Records `approver_id`'s vote for the circle's open proposal.
///
/// Fails with `NotFound` when the approver has no unapproved ballot,
/// which covers both repeat votes and non-voters.
pub(crate) fn approve(
    tx: &StoreTx<'_>,
    circle_id: CircleId,
    approver_id: UserId,
) -> Result<RoundOutcome> {
    let flipped = tx.cast_amount_approval(circle_id, approver_id)?;
    if flipped == 0 {
        return Err(CircleError::NotFound(format!(
            "no pending amount approval found for user {approver_id} in circle {circle_id}"
        )));
    }

    tracing::debug!(circle_id = %circle_id, approver_id = %approver_id, "Cast amount vote");

    finalize_if_unanimous(tx, circle_id)
}

/// Applies the proposed amount if every ballot is approved.
///
/// Writes the new amount and the cleared proposal together, then deletes
/// the round's ballots. A second call after finalization finds no ballots
/// and does nothing.
fn finalize_if_unanimous(tx: &StoreTx<'_>, circle_id: CircleId) -> Result<RoundOutcome> {
    let tally = tx.amount_tally(circle_id)?;
    tracing::debug!(
        circle_id = %circle_id,
        total = tally.total,
        approved = tally.approved,
        "Evaluated amount tally"
    );

    if !tally.is_unanimous() {
        return Ok(RoundOutcome {
            tally,
            finalized: false,
        });
    }

    let ballot = tx.first_amount_approval(circle_id)?.ok_or_else(|| {
        CircleError::Storage(format!("amount round for circle {circle_id} vanished"))
    })?;

    tx.apply_amount(circle_id, ballot.proposed_amount)?;
    tx.delete_amount_approvals(circle_id)?;

    tracing::info!(
        circle_id = %circle_id,
        amount = ballot.proposed_amount,
        "Amount change approved by all members"
    );

    Ok(RoundOutcome {
        tally,
        finalized: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circle::admission;
    use crate::circle::storage::Store;
    use crate::circle::types::{Circle, CircleConfig, Role, Tally, MAX_AMOUNT};

    struct Fixture {
        store: Store,
        circle: CircleId,
        alice: UserId,
        bob: UserId,
        dave: UserId,
    }

    /// Circle with active members Alice (admin), Bob and Dave.
    fn fixture() -> Fixture {
        let store = Store::in_memory().unwrap();
        let (circle, alice, bob, dave) = store
            .transaction(|tx| {
                let alice = tx.insert_user("Alice", "alice@example.com", 1)?.id;
                let bob = tx.insert_user("Bob", "bob@example.com", 1)?.id;
                let dave = tx.insert_user("Dave", "dave@example.com", 1)?.id;
                let circle = ledger::create_circle(tx, alice, &CircleConfig::new("Family", 100), 1)?;
                admission::open_round(tx, circle.id, bob, alice, Role::Member, 2)?;
                admission::open_round(tx, circle.id, dave, alice, Role::Member, 3)?;
                admission::cast_vote(tx, circle.id, dave, bob)?;
                Ok((circle.id, alice, bob, dave))
            })
            .unwrap();
        Fixture {
            store,
            circle,
            alice,
            bob,
            dave,
        }
    }

    fn circle(f: &Fixture) -> Circle {
        f.store.read(|tx| ledger::require_circle(tx, f.circle)).unwrap()
    }

    fn ballots(f: &Fixture) -> Vec<AmountApproval> {
        f.store
            .read(|tx| tx.amount_approvals_for_circles(&[f.circle]))
            .unwrap()
    }

    #[test]
    fn unanimous_round_applies_amount_and_purges_ballots() {
        let f = fixture();

        let opened = f
            .store
            .transaction(|tx| propose(tx, f.circle, f.alice, 500, 10))
            .unwrap();
        assert!(!opened.finalized);
        assert_eq!(opened.tally, Tally { total: 3, approved: 1 });

        let rows = ballots(&f);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|b| b.proposer_id == f.alice && b.proposed_amount == 500));
        assert!(rows.iter().find(|b| b.approver_id == f.alice).unwrap().approved);

        let first = f
            .store
            .transaction(|tx| approve(tx, f.circle, f.bob))
            .unwrap();
        assert!(!first.finalized);
        let open = circle(&f);
        assert_eq!(open.amount_per_member, 100);
        assert_eq!(open.proposed_amount, 500);

        let last = f
            .store
            .transaction(|tx| approve(tx, f.circle, f.dave))
            .unwrap();
        assert!(last.finalized);
        assert_eq!(last.tally, Tally { total: 3, approved: 3 });

        let done = circle(&f);
        assert_eq!(done.amount_per_member, 500);
        assert_eq!(done.proposed_amount, 0);
        assert!(ballots(&f).is_empty());
    }

    #[test]
    fn new_proposal_discards_previous_votes() {
        let f = fixture();
        f.store
            .transaction(|tx| {
                propose(tx, f.circle, f.alice, 500, 10)?;
                approve(tx, f.circle, f.bob)
            })
            .unwrap();

        let reopened = f
            .store
            .transaction(|tx| propose(tx, f.circle, f.alice, 750, 11))
            .unwrap();
        assert_eq!(reopened.tally, Tally { total: 3, approved: 1 });

        let rows = ballots(&f);
        assert!(rows.iter().all(|b| b.proposed_amount == 750));
        assert!(!rows.iter().find(|b| b.approver_id == f.bob).unwrap().approved);
        assert_eq!(circle(&f).proposed_amount, 750);

        // Bob must vote again for the new proposal.
        let outcome = f
            .store
            .transaction(|tx| {
                approve(tx, f.circle, f.bob)?;
                approve(tx, f.circle, f.dave)
            })
            .unwrap();
        assert!(outcome.finalized);
        assert_eq!(circle(&f).amount_per_member, 750);
    }

    #[test]
    fn repeated_approval_is_not_found() {
        let f = fixture();
        f.store
            .transaction(|tx| {
                propose(tx, f.circle, f.alice, 500, 10)?;
                approve(tx, f.circle, f.bob)
            })
            .unwrap();

        let again = f.store.transaction(|tx| approve(tx, f.circle, f.bob));
        assert!(matches!(again, Err(CircleError::NotFound(_))));

        let proposer = f.store.transaction(|tx| approve(tx, f.circle, f.alice));
        assert!(matches!(proposer, Err(CircleError::NotFound(_))));
    }

    #[test]
    fn approval_without_round_is_not_found() {
        let f = fixture();
        let result = f.store.transaction(|tx| approve(tx, f.circle, f.bob));
        assert!(matches!(result, Err(CircleError::NotFound(_))));
        assert_eq!(circle(&f).amount_per_member, 100);
    }

    #[test]
    fn propose_validates_and_checks_admin() {
        let f = fixture();

        let zero = f.store.transaction(|tx| propose(tx, f.circle, f.alice, 0, 10));
        assert!(matches!(zero, Err(CircleError::Validation(_))));

        let huge = f
            .store
            .transaction(|tx| propose(tx, f.circle, f.alice, MAX_AMOUNT + 1, 10));
        assert!(matches!(huge, Err(CircleError::Validation(_))));

        let member = f.store.transaction(|tx| propose(tx, f.circle, f.bob, 500, 10));
        assert!(matches!(member, Err(CircleError::Forbidden(_))));

        let missing = f.store.transaction(|tx| propose(tx, CircleId(404), f.alice, 500, 10));
        assert!(matches!(missing, Err(CircleError::NotFound(_))));

        assert!(ballots(&f).is_empty());
        assert_eq!(circle(&f).proposed_amount, 0);
    }

    #[test]
    fn sole_member_proposal_applies_immediately() {
        let store = Store::in_memory().unwrap();
        let (circle_id, outcome) = store
            .transaction(|tx| {
                let alice = tx.insert_user("Alice", "alice@example.com", 1)?.id;
                let circle = ledger::create_circle(tx, alice, &CircleConfig::new("Solo", 100), 1)?;
                let outcome = propose(tx, circle.id, alice, 250, 2)?;
                Ok((circle.id, outcome))
            })
            .unwrap();

        assert!(outcome.finalized);
        let circle = store.read(|tx| ledger::require_circle(tx, circle_id)).unwrap();
        assert_eq!(circle.amount_per_member, 250);
        assert_eq!(circle.proposed_amount, 0);
    }

    #[test]
    fn failed_approval_leaves_no_partial_vote() {
        let f = fixture();
        f.store
            .transaction(|tx| propose(tx, f.circle, f.alice, 500, 10))
            .unwrap();

        let result: Result<()> = f.store.transaction(|tx| {
            approve(tx, f.circle, f.bob)?;
            Err(CircleError::Storage("simulated failure".to_string()))
        });
        assert!(result.is_err());

        let bob = ballots(&f)
            .into_iter()
            .find(|b| b.approver_id == f.bob)
            .unwrap();
        assert!(!bob.approved);
    }
}

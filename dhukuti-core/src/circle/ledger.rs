//! Membership ledger.
//!
//! Tracks each user's role and status within a circle and answers the
//! question every round asks first: who must vote.

use super::error::{CircleError, Result};
use super::storage::StoreTx;
use super::types::{
    Circle, CircleConfig, CircleId, CircleMember, MemberStatus, Role, UserId, MAX_AMOUNT,
};

/// Loads a circle or fails with `NotFound`.
pub(crate) fn require_circle(tx: &StoreTx<'_>, circle_id: CircleId) -> Result<Circle> {
    tx.get_circle(circle_id)?
        .ok_or_else(|| CircleError::NotFound(format!("circle {circle_id} not found")))
}

/// Loads the caller's membership and checks it is an active admin.
pub(crate) fn require_active_admin(
    tx: &StoreTx<'_>,
    circle_id: CircleId,
    user_id: UserId,
    action: &str,
) -> Result<CircleMember> {
    match tx.get_member(circle_id, user_id)? {
        Some(member) if member.is_active_admin() => Ok(member),
        _ => Err(CircleError::Forbidden(format!("only circle admins can {action}"))),
    }
}

/// Checks that `amount` is between 1 and `MAX_AMOUNT`.
pub(crate) fn validate_amount(amount: u64, field: &str) -> Result<()> {
    if amount < 1 {
        return Err(CircleError::Validation(format!("{field} must be at least 1")));
    }
    if amount > MAX_AMOUNT {
        return Err(CircleError::Validation(format!(
            "{field} must be at most {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

/// Members whose votes a round opened now must collect.
pub(crate) fn active_members(tx: &StoreTx<'_>, circle_id: CircleId) -> Result<Vec<CircleMember>> {
    tx.members_with_status(circle_id, MemberStatus::Active)
}

/// Creates a circle with its creator as the sole active admin.
pub(crate) fn create_circle(
    tx: &StoreTx<'_>,
    creator_id: UserId,
    config: &CircleConfig,
    now: i64,
) -> Result<Circle> {
    let name = config.name.trim();
    if name.is_empty() {
        return Err(CircleError::Validation("circle name is required".to_string()));
    }
    validate_amount(config.amount_per_member, "amount per member")?;
    if tx.get_user(creator_id)?.is_none() {
        return Err(CircleError::NotFound(format!("user {creator_id} not found")));
    }

    let config = CircleConfig {
        name: name.to_string(),
        ..config.clone()
    };
    let circle = tx.insert_circle(&config, creator_id, now)?;
    tx.insert_member(&CircleMember {
        circle_id: circle.id,
        user_id: creator_id,
        role: Role::Admin,
        status: MemberStatus::Active,
        created_at: now,
    })?;

    tracing::info!(circle_id = %circle.id, creator_id = %creator_id, "Created circle");
    Ok(circle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circle::storage::Store;

    #[test]
    fn creator_becomes_active_admin() {
        let store = Store::in_memory().unwrap();
        let (circle, member) = store
            .transaction(|tx| {
                let alice = tx.insert_user("Alice", "alice@example.com", 1)?;
                let circle = create_circle(tx, alice.id, &CircleConfig::new(" Family ", 100), 1)?;
                let member = require_active_admin(tx, circle.id, alice.id, "test")?;
                Ok((circle, member))
            })
            .unwrap();

        assert_eq!(circle.name, "Family");
        assert_eq!(member.role, Role::Admin);
        assert_eq!(member.status, MemberStatus::Active);
    }

    #[test]
    fn create_circle_validates_input() {
        let store = Store::in_memory().unwrap();
        let alice = store
            .transaction(|tx| tx.insert_user("Alice", "alice@example.com", 1))
            .unwrap();

        let blank = store.transaction(|tx| create_circle(tx, alice.id, &CircleConfig::new("  ", 100), 1));
        assert!(matches!(blank, Err(CircleError::Validation(_))));

        let zero = store.transaction(|tx| create_circle(tx, alice.id, &CircleConfig::new("Pot", 0), 1));
        assert!(matches!(zero, Err(CircleError::Validation(_))));

        let huge = store.transaction(|tx| {
            create_circle(tx, alice.id, &CircleConfig::new("Pot", MAX_AMOUNT + 1), 1)
        });
        assert!(matches!(huge, Err(CircleError::Validation(_))));

        let largest = store
            .transaction(|tx| create_circle(tx, alice.id, &CircleConfig::new("Pot", MAX_AMOUNT), 1))
            .unwrap();
        assert_eq!(largest.amount_per_member, MAX_AMOUNT);

        let ghost = store.transaction(|tx| create_circle(tx, UserId(99), &CircleConfig::new("Pot", 1), 1));
        assert!(matches!(ghost, Err(CircleError::NotFound(_))));
    }

    #[test]
    fn pending_admin_is_not_an_active_admin() {
        let store = Store::in_memory().unwrap();
        let result = store.transaction(|tx| {
            let alice = tx.insert_user("Alice", "alice@example.com", 1)?;
            let bob = tx.insert_user("Bob", "bob@example.com", 1)?;
            let circle = create_circle(tx, alice.id, &CircleConfig::new("Pot", 1), 1)?;
            tx.insert_member(&CircleMember {
                circle_id: circle.id,
                user_id: bob.id,
                role: Role::Admin,
                status: MemberStatus::Pending,
                created_at: 2,
            })?;
            require_active_admin(tx, circle.id, bob.id, "add members")
        });

        match result {
            Err(CircleError::Forbidden(msg)) => assert!(msg.contains("add members")),
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn missing_circle_is_not_found() {
        let store = Store::in_memory().unwrap();
        let result = store.read(|tx| require_circle(tx, CircleId(42)));
        assert!(matches!(result, Err(CircleError::NotFound(_))));
    }
}

//! Demo data for local development.
//!
//! Safe to run repeatedly: existing users, circles and memberships are
//! left alone.

use dhukuti_core::circle::{Circle, CircleConfig, CircleError, Result, Role, User};
use dhukuti_core::CircleManager;

const USERS: [(&str, &str); 3] = [
    ("Alice Smith", "alice@example.com"),
    ("Bob Johnson", "bob@example.com"),
    ("Charlie Brown", "charlie@example.com"),
];

/// What a seed run produced
#[derive(Debug)]
pub struct SeedReport {
    pub users: Vec<User>,
    pub circles: Vec<Circle>,
}

/// Inserts the demo users and circles.
///
/// Alice owns "Family Circle" and Bob owns "Friends Group". Bob joins
/// Alice's circle through the admission engine.
///
/// # Errors
///
/// Returns an error if any store operation fails.
pub fn run(manager: &CircleManager) -> Result<SeedReport> {
    let users = USERS
        .iter()
        .map(|&(name, email)| ensure_user(manager, name, email))
        .collect::<Result<Vec<_>>>()?;
    let (alice, bob) = (&users[0], &users[1]);

    let family = ensure_circle(
        manager,
        alice,
        CircleConfig::new("Family Circle", 1000).with_description("Family savings and expenses"),
    )?;
    let friends = ensure_circle(
        manager,
        bob,
        CircleConfig::new("Friends Group", 500).with_description("Friends' shared expenses"),
    )?;

    match manager.invite_member(family.id, bob.id, alice.id, Role::Member) {
        Ok(outcome) => tracing::info!(finalized = outcome.finalized, "Added Bob to Family Circle"),
        Err(CircleError::Conflict(_)) => {
            tracing::info!("Bob is already in Family Circle, skipping");
        }
        Err(e) => return Err(e),
    }

    Ok(SeedReport {
        users,
        circles: vec![family, friends],
    })
}

fn ensure_user(manager: &CircleManager, name: &str, email: &str) -> Result<User> {
    if let Some(user) = manager.find_user(email)? {
        tracing::info!(email, "User already exists, skipping");
        return Ok(user);
    }
    let user = manager.add_user(name, email)?;
    tracing::info!(email, user_id = %user.id, "Created user");
    Ok(user)
}

fn ensure_circle(manager: &CircleManager, creator: &User, config: CircleConfig) -> Result<Circle> {
    if let Some(circle) = manager.find_circle(&config.name, creator.id)? {
        tracing::info!(name = %circle.name, "Circle already exists, skipping");
        return Ok(circle);
    }
    let circle = manager.create_circle(creator.id, &config)?;
    tracing::info!(name = %circle.name, circle_id = %circle.id, "Created circle");
    Ok(circle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhukuti_core::circle::{MemberStatus, Store};

    #[test]
    fn seed_is_idempotent() {
        let manager = CircleManager::from_store(Store::in_memory().unwrap());

        let first = run(&manager).unwrap();
        let second = run(&manager).unwrap();

        assert_eq!(first.users, second.users);
        assert_eq!(first.circles[0].id, second.circles[0].id);

        let bob = &first.users[1];
        let family = manager.get_circle(bob.id, first.circles[0].id).unwrap();
        assert_eq!(family.members.len(), 2);
        assert!(family.members.iter().all(|m| m.status == MemberStatus::Active));
        assert_eq!(manager.list_circles(bob.id).unwrap().len(), 2);
    }
}

//! Integration tests for the circle module.
//!
//! These tests drive `CircleManager` against an on-disk database and verify:
//! - Admission and amount rounds end to end
//! - Ballot retention (admission) versus purge (amount)
//! - Superseded proposals
//! - Concurrent last votes finalize exactly once
//! - State survives reopening the database

use std::sync::{Arc, Barrier};
use std::thread;

use dhukuti_core::circle::{
    CircleConfig, CircleError, CircleId, CircleManager, MemberStatus, Role, Store, UserId,
};
use tempfile::TempDir;

struct World {
    _dir: TempDir,
    manager: Arc<CircleManager>,
}

fn world() -> World {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(CircleManager::new(dir.path()).unwrap());
    World { _dir: dir, manager }
}

fn add_users(manager: &CircleManager, names: &[&str]) -> Vec<UserId> {
    names
        .iter()
        .map(|name| {
            manager
                .add_user(name, &format!("{}@example.com", name.to_lowercase()))
                .unwrap()
                .id
        })
        .collect()
}

/// Creates a circle owned by `users[0]` with every other user active.
fn circle_with_active(manager: &CircleManager, users: &[UserId]) -> CircleId {
    let admin = users[0];
    let circle = manager
        .create_circle(admin, &CircleConfig::new("Family", 100))
        .unwrap();

    for (i, &user) in users.iter().enumerate().skip(1) {
        let outcome = manager
            .invite_member(circle.id, user, admin, Role::Member)
            .unwrap();
        // Every active member other than the inviter must vote.
        let mut finalized = outcome.finalized;
        for &voter in &users[1..i] {
            finalized = manager.approve_member(circle.id, user, voter).unwrap().finalized;
        }
        assert!(finalized, "user {user} should be active");
    }
    circle.id
}

// ============================================================================
// Admission
// ============================================================================

#[test]
fn test_invite_into_three_member_circle() {
    let w = world();
    let users = add_users(&w.manager, &["Alice", "Bob", "Dave", "Erin"]);
    let (alice, bob, dave, erin) = (users[0], users[1], users[2], users[3]);
    let circle = circle_with_active(&w.manager, &users[..3]);

    let opened = w
        .manager
        .invite_member(circle, erin, alice, Role::Member)
        .unwrap();
    assert!(!opened.finalized);
    assert_eq!(opened.tally.total, 3);
    assert_eq!(opened.tally.approved, 1);

    let view = w.manager.get_circle(bob, circle).unwrap();
    assert_eq!(view.pending_approvals, vec![erin]);

    w.manager.approve_member(circle, erin, bob).unwrap();
    let view = w.manager.get_circle(alice, circle).unwrap();
    let erin_view = view.members.iter().find(|m| m.id == erin).unwrap();
    assert_eq!(erin_view.status, MemberStatus::Pending);

    assert!(w.manager.approve_member(circle, erin, dave).unwrap().finalized);

    let ballots = w
        .manager
        .store()
        .read(|tx| tx.member_approvals(circle, erin))
        .unwrap();
    assert_eq!(ballots.len(), 3);
    assert!(ballots.iter().all(|b| b.approved));
}

#[test]
fn test_duplicate_vote_is_not_found() {
    let w = world();
    let users = add_users(&w.manager, &["Alice", "Bob", "Dave"]);
    let circle = circle_with_active(&w.manager, &users[..2]);

    w.manager
        .invite_member(circle, users[2], users[0], Role::Member)
        .unwrap();
    w.manager.approve_member(circle, users[2], users[1]).unwrap();

    let again = w.manager.approve_member(circle, users[2], users[1]);
    assert!(matches!(again, Err(CircleError::NotFound(_))));
}

#[test]
fn test_invited_admin_can_invite_once_active() {
    let w = world();
    let users = add_users(&w.manager, &["Alice", "Bob", "Dave"]);
    let circle = w
        .manager
        .create_circle(users[0], &CircleConfig::new("Pot", 10))
        .unwrap();

    w.manager
        .invite_member(circle.id, users[1], users[0], Role::Admin)
        .unwrap();
    let outcome = w
        .manager
        .invite_member(circle.id, users[2], users[1], Role::Member)
        .unwrap();
    assert_eq!(outcome.tally.total, 2);
}

// ============================================================================
// Amount
// ============================================================================

#[test]
fn test_amount_round_scenario() {
    let w = world();
    let users = add_users(&w.manager, &["Alice", "Bob", "Dave"]);
    let (alice, bob, dave) = (users[0], users[1], users[2]);
    let circle = circle_with_active(&w.manager, &users);

    w.manager.propose_amount(circle, alice, 500).unwrap();
    assert!(w.manager.get_circle(bob, circle).unwrap().needs_amount_approval);
    assert!(w.manager.get_circle(dave, circle).unwrap().needs_amount_approval);

    w.manager.approve_amount(circle, bob).unwrap();
    let view = w.manager.get_circle(alice, circle).unwrap();
    assert_eq!(view.amount_per_member, 100);
    assert_eq!(view.proposed_amount, 500);

    assert!(w.manager.approve_amount(circle, dave).unwrap().finalized);
    let view = w.manager.get_circle(alice, circle).unwrap();
    assert_eq!(view.amount_per_member, 500);
    assert_eq!(view.proposed_amount, 0);

    let ballots = w
        .manager
        .store()
        .read(|tx| tx.amount_approvals_for_circles(&[circle]))
        .unwrap();
    assert!(ballots.is_empty());
}

#[test]
fn test_superseding_proposal_resets_votes() {
    let w = world();
    let users = add_users(&w.manager, &["Alice", "Bob", "Dave"]);
    let (alice, bob, dave) = (users[0], users[1], users[2]);
    let circle = circle_with_active(&w.manager, &users);

    w.manager.propose_amount(circle, alice, 500).unwrap();
    w.manager.approve_amount(circle, bob).unwrap();
    w.manager.propose_amount(circle, alice, 900).unwrap();

    assert!(w.manager.get_circle(bob, circle).unwrap().needs_amount_approval);
    assert!(!w.manager.approve_amount(circle, dave).unwrap().finalized);
    assert!(w.manager.approve_amount(circle, bob).unwrap().finalized);
    assert_eq!(w.manager.get_circle(alice, circle).unwrap().amount_per_member, 900);
}

#[test]
fn test_member_cannot_propose() {
    let w = world();
    let users = add_users(&w.manager, &["Alice", "Bob"]);
    let circle = circle_with_active(&w.manager, &users);

    let result = w.manager.propose_amount(circle, users[1], 500);
    assert!(matches!(result, Err(CircleError::Forbidden(_))));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_amount_votes_finalize_once() {
    let w = world();
    let names: Vec<String> = (0..8).map(|i| format!("User{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let users = add_users(&w.manager, &name_refs);
    let circle = circle_with_active(&w.manager, &users);

    w.manager.propose_amount(circle, users[0], 750).unwrap();

    let voters = &users[1..];
    let barrier = Arc::new(Barrier::new(voters.len()));
    let handles: Vec<_> = voters
        .iter()
        .map(|&voter| {
            let manager = Arc::clone(&w.manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.approve_amount(circle, voter).unwrap().finalized
            })
        })
        .collect();

    let finalizations = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|finalized| *finalized)
        .count();
    assert_eq!(finalizations, 1);

    let view = w.manager.get_circle(users[0], circle).unwrap();
    assert_eq!(view.amount_per_member, 750);
    assert_eq!(view.proposed_amount, 0);
}

#[test]
fn test_concurrent_admission_votes_finalize_once() {
    let w = world();
    let names: Vec<String> = (0..7).map(|i| format!("User{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let users = add_users(&w.manager, &name_refs);
    let (newcomer, members) = users.split_last().unwrap();
    let circle = circle_with_active(&w.manager, members);

    w.manager
        .invite_member(circle, *newcomer, members[0], Role::Member)
        .unwrap();

    let voters = &members[1..];
    let barrier = Arc::new(Barrier::new(voters.len()));
    let handles: Vec<_> = voters
        .iter()
        .map(|&voter| {
            let manager = Arc::clone(&w.manager);
            let barrier = Arc::clone(&barrier);
            let newcomer = *newcomer;
            thread::spawn(move || {
                barrier.wait();
                manager.approve_member(circle, newcomer, voter).unwrap().finalized
            })
        })
        .collect();

    let finalizations = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|finalized| *finalized)
        .count();
    assert_eq!(finalizations, 1);

    let ballots = w
        .manager
        .store()
        .read(|tx| tx.member_approvals(circle, *newcomer))
        .unwrap();
    assert_eq!(ballots.len(), members.len());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_open_round_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let (circle, users) = {
        let manager = CircleManager::new(dir.path()).unwrap();
        let users = add_users(&manager, &["Alice", "Bob"]);
        let circle = circle_with_active(&manager, &users);
        manager.propose_amount(circle, users[0], 300).unwrap();
        (circle, users)
    };

    let store = Store::new(&dir.path().join("dhukuti.db")).unwrap();
    let manager = CircleManager::from_store(store);
    let view = manager.get_circle(users[1], circle).unwrap();
    assert_eq!(view.proposed_amount, 300);
    assert!(view.needs_amount_approval);

    assert!(manager.approve_amount(circle, users[1]).unwrap().finalized);
}

#[test]
fn test_list_circles_across_many_circles() {
    let w = world();
    let users = add_users(&w.manager, &["Alice", "Bob"]);
    for i in 0..5 {
        let circle = w
            .manager
            .create_circle(users[0], &CircleConfig::new(format!("Circle {i}"), 10 + i))
            .unwrap();
        w.manager
            .invite_member(circle.id, users[1], users[0], Role::Member)
            .unwrap();
    }

    let views = w.manager.list_circles(users[1]).unwrap();
    assert_eq!(views.len(), 5);
    assert!(views.iter().all(|v| v.members.len() == 2));
    assert!(views.windows(2).all(|pair| pair[0].id > pair[1].id));
}

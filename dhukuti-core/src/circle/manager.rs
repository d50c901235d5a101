//! High-level circle management API.
//!
//! This module provides the [`CircleManager`], which runs every circle
//! operation as one [`Store`] transaction. Engines never hold state between
//! calls; each operation re-reads the ledger and ballot rows it needs.

use std::path::Path;

use chrono::Utc;

use super::admission;
use super::amount;
use super::contribution::{self, ContributionView};
use super::error::{CircleError, Result};
use super::ledger;
use super::query::{self, CircleView};
use super::storage::Store;
use super::types::{Circle, CircleConfig, CircleId, Contribution, Role, RoundOutcome, User, UserId};

/// High-level API for circle management.
///
/// Safe to share across threads: the store serializes transactions.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use dhukuti_core::circle::{CircleConfig, CircleManager};
///
/// let manager = CircleManager::new(Path::new("/var/lib/dhukuti"))?;
/// let circle = manager.create_circle(alice, &CircleConfig::new("Family", 1000))?;
/// manager.invite_member(circle.id, bob, alice, Role::Member)?;
/// ```
pub struct CircleManager {
    store: Store,
}

impl CircleManager {
    /// Creates a new circle manager.
    ///
    /// Creates `data_dir` and the database inside it if they don't exist.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Base directory for all Dhukuti data
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| CircleError::Storage(format!("Failed to create data directory: {e}")))?;

        let db_path = data_dir.join("dhukuti.db");
        Ok(Self::from_store(Store::new(&db_path)?))
    }

    /// Wraps an already opened store.
    #[must_use]
    pub const fn from_store(store: Store) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    // ==================== Directory ====================

    /// Adds a user to the directory projection.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank name or email, `Conflict` if the
    /// email is already registered.
    pub fn add_user(&self, name: &str, email: &str) -> Result<User> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() {
            return Err(CircleError::Validation(
                "name and email are required".to_string(),
            ));
        }

        self.store.transaction(|tx| {
            if tx.find_user_by_email(email)?.is_some() {
                return Err(CircleError::Conflict(format!(
                    "a user with email {email} already exists"
                )));
            }
            tx.insert_user(name, email, now())
        })
    }

    /// Looks up a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_user(&self, email: &str) -> Result<Option<User>> {
        self.store.read(|tx| tx.find_user_by_email(email))
    }

    /// Looks up a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.store.read(|tx| tx.get_user(user_id))
    }

    // ==================== Circles ====================

    /// Creates a circle with `creator_id` as its sole active admin.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank name or an amount below 1, and
    /// `NotFound` if the creator is unknown.
    pub fn create_circle(&self, creator_id: UserId, config: &CircleConfig) -> Result<Circle> {
        self.store
            .transaction(|tx| ledger::create_circle(tx, creator_id, config, now()))
    }

    /// Finds a circle by name among those created by `creator_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_circle(&self, name: &str, creator_id: UserId) -> Result<Option<Circle>> {
        self.store.read(|tx| tx.find_circle_by_name(name, creator_id))
    }

    /// Returns one circle as seen by `caller_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the circle is absent or the caller is not a
    /// member.
    pub fn get_circle(&self, caller_id: UserId, circle_id: CircleId) -> Result<CircleView> {
        self.store
            .read(|tx| query::get_circle(tx, caller_id, circle_id))
    }

    /// Returns every circle `caller_id` belongs to, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_circles(&self, caller_id: UserId) -> Result<Vec<CircleView>> {
        self.store.read(|tx| query::list_circles(tx, caller_id))
    }

    // ==================== Admission ====================

    /// Checks that `user_id` is an active admin of the circle.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the circle is missing or `Forbidden` if the
    /// user is not an active admin.
    pub fn require_admin(&self, circle_id: CircleId, user_id: UserId, action: &str) -> Result<()> {
        self.store.read(|tx| {
            ledger::require_circle(tx, circle_id)?;
            ledger::require_active_admin(tx, circle_id, user_id, action)?;
            Ok(())
        })
    }

    /// Invites `user_id` into a circle, opening an admission round.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` (circle or user), `Forbidden` (inviter is not an
    /// active admin) or `Conflict` (already a member).
    pub fn invite_member(
        &self,
        circle_id: CircleId,
        user_id: UserId,
        inviter_id: UserId,
        role: Role,
    ) -> Result<RoundOutcome> {
        self.store.transaction(|tx| {
            admission::open_round(tx, circle_id, user_id, inviter_id, role, now())
        })
    }

    /// Casts `approver_id`'s vote to admit `pending_user_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the approver has no outstanding ballot for
    /// this pending member.
    pub fn approve_member(
        &self,
        circle_id: CircleId,
        pending_user_id: UserId,
        approver_id: UserId,
    ) -> Result<RoundOutcome> {
        self.store
            .transaction(|tx| admission::cast_vote(tx, circle_id, pending_user_id, approver_id))
    }

    // ==================== Amount ====================

    /// Proposes a new periodic amount, discarding any open proposal.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an amount below 1, `NotFound` for an
    /// unknown circle and `Forbidden` if the proposer is not an active admin.
    pub fn propose_amount(
        &self,
        circle_id: CircleId,
        proposer_id: UserId,
        new_amount: u64,
    ) -> Result<RoundOutcome> {
        self.store
            .transaction(|tx| amount::propose(tx, circle_id, proposer_id, new_amount, now()))
    }

    /// Casts `approver_id`'s vote for the open amount proposal.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the approver has no outstanding ballot.
    pub fn approve_amount(&self, circle_id: CircleId, approver_id: UserId) -> Result<RoundOutcome> {
        self.store
            .transaction(|tx| amount::approve(tx, circle_id, approver_id))
    }

    // ==================== Contributions ====================

    /// Records a contribution of the circle's current amount.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown circle and `Forbidden` unless the
    /// user is an active member.
    pub fn record_contribution(&self, circle_id: CircleId, user_id: UserId) -> Result<Contribution> {
        self.store
            .transaction(|tx| contribution::record(tx, circle_id, user_id, now()))
    }

    /// Lists a circle's contributions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` unless the caller is a member.
    pub fn contributions(
        &self,
        circle_id: CircleId,
        caller_id: UserId,
    ) -> Result<Vec<ContributionView>> {
        self.store
            .read(|tx| contribution::list(tx, circle_id, caller_id))
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

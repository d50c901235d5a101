//! Core types for circle management.
//!
//! This module defines the stored entities (circles, members, ballots and
//! contributions) along with the strongly-typed identifiers used across
//! the consensus engines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest contribution amount the store can hold.
pub const MAX_AMOUNT: u64 = i64::MAX.unsigned_abs();

/// Identifier of a user, as produced by the authentication boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircleId(pub i64);

impl fmt::Display for CircleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a member within a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May invite members and propose amount changes.
    Admin,
    /// Regular member.
    #[default]
    Member,
}

impl Role {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

/// Membership status in a circle.
///
/// A member moves from `Pending` to `Active` only through admission
/// consensus and never moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Invited, waiting for every active member to approve.
    Pending,
    /// Admitted; counts toward quorum for new rounds.
    Active,
}

impl MemberStatus {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            _ => None,
        }
    }
}

/// A user known to the directory.
///
/// Registration lives outside this crate; only the fields needed to check
/// existence and to label members are kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

/// A savings circle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circle {
    /// Circle identifier.
    pub id: CircleId,
    /// Circle name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Current effective periodic contribution.
    pub amount_per_member: u64,
    /// Candidate amount of the open proposal, 0 when none is open.
    pub proposed_amount: u64,
    /// User who created the circle.
    pub creator_id: UserId,
    /// When the circle was created (Unix timestamp).
    pub created_at: i64,
}

impl Circle {
    /// Returns whether an amount proposal is currently open.
    #[must_use]
    pub const fn has_open_proposal(&self) -> bool {
        self.proposed_amount != 0
    }
}

/// A user's membership in a circle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircleMember {
    /// Circle the membership belongs to.
    pub circle_id: CircleId,
    /// Member user.
    pub user_id: UserId,
    /// Role within the circle.
    pub role: Role,
    /// Admission status.
    pub status: MemberStatus,
    /// When the membership row was created (Unix timestamp).
    pub created_at: i64,
}

impl CircleMember {
    /// Returns whether this member may run admin actions.
    #[must_use]
    pub fn is_active_admin(&self) -> bool {
        self.role == Role::Admin && self.status == MemberStatus::Active
    }
}

/// One admission ballot: `approver` votes on letting `pending_user` in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberApproval {
    /// Circle being joined.
    pub circle_id: CircleId,
    /// User awaiting admission.
    pub pending_user_id: UserId,
    /// Active member who must vote.
    pub approver_user_id: UserId,
    /// Whether the vote has been cast.
    pub approved: bool,
}

/// One ballot in the circle's current amount proposal round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountApproval {
    /// Circle whose amount is being changed.
    pub circle_id: CircleId,
    /// Admin who opened the round.
    pub proposer_id: UserId,
    /// Amount under vote.
    pub proposed_amount: u64,
    /// Active member who must vote.
    pub approver_id: UserId,
    /// Whether the vote has been cast.
    pub approved: bool,
}

/// A recorded periodic contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    /// Row identifier.
    pub id: i64,
    /// Circle contributed to.
    pub circle_id: CircleId,
    /// Contributing member.
    pub user_id: UserId,
    /// Amount recorded, equal to the circle amount at recording time.
    pub amount: u64,
    /// Calendar month the contribution counts for (`YYYY-MM`).
    pub month: String,
    /// When the contribution was recorded (Unix timestamp).
    pub created_at: i64,
}

/// Ballot counts for one round, read inside the voting transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    /// Ballots created when the round opened.
    pub total: u64,
    /// Ballots cast in favour.
    pub approved: u64,
}

impl Tally {
    /// Returns whether every ballot of the round has been approved.
    ///
    /// A round with no ballots never completes.
    #[must_use]
    pub const fn is_unanimous(&self) -> bool {
        self.total > 0 && self.total == self.approved
    }
}

/// Result of opening a round or casting a vote in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Ballot counts observed by the completion check.
    pub tally: Tally,
    /// Whether this call applied the round's outcome.
    pub finalized: bool,
}

/// Configuration for creating a new circle.
#[derive(Debug, Clone)]
pub struct CircleConfig {
    /// Circle name.
    pub name: String,
    /// Optional description.
    pub description: String,
    /// Initial periodic contribution.
    pub amount_per_member: u64,
}

impl CircleConfig {
    /// Creates a new circle configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, amount_per_member: u64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            amount_per_member,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

//! Circle management for rotating savings groups.
//!
//! A circle is a group of people who pay the same amount every month.
//! Admitting a member and changing the amount both need the consent of
//! every active member.
//!
//! # Architecture
//!
//! ```text
//! CircleManager (high-level API, one transaction per call)
//!     ├── ledger        (roles, statuses, who must vote)
//!     ├── admission     (MemberApproval rounds, ballots retained)
//!     ├── amount        (AmountApproval rounds, ballots purged)
//!     ├── contribution  (monthly contribution log)
//!     ├── query         (per-caller read-models, batched)
//!     └── Store         (SQLite, one connection behind a mutex)
//! ```
//!
//! # Quorum
//!
//! A round's electorate is fixed when it opens: one ballot per member that
//! is active at that moment. The round completes when every ballot is
//! approved, evaluated by [`Tally::is_unanimous`] inside the transaction
//! that cast the last vote.
//!
//! # Types
//!
//! - [`Circle`]: A savings group and its current amount
//! - [`CircleMember`]: A user's role and status in a circle
//! - [`MemberApproval`] / [`AmountApproval`]: Ballots
//! - [`CircleView`]: What one caller sees of a circle

mod admission;
mod amount;
mod contribution;
mod error;
mod ledger;
mod manager;
mod query;
mod storage;
pub mod types;

pub use contribution::ContributionView;
pub use error::{CircleError, Result};
pub use manager::CircleManager;
pub use query::{ApprovalStatus, CircleView, MemberView};
pub use storage::{Store, StoreTx};
pub use types::{
    AmountApproval, Circle, CircleConfig, CircleId, CircleMember, Contribution, MemberApproval,
    MemberStatus, Role, RoundOutcome, Tally, User, UserId, MAX_AMOUNT,
};

//! `SQLite` storage for circle management.
//!
//! This module provides persistent storage for users, circles, memberships,
//! ballots and contributions. Every read or write goes through a
//! [`StoreTx`] handed out by [`Store::transaction`] or [`Store::read`], so
//! the engines never observe a half-applied round.
//!
//! # Concurrency
//!
//! A single connection sits behind a mutex and every transaction holds the
//! lock until it commits or rolls back. Vote-and-finalize flows therefore
//! run one at a time per store, and a finalizer always sees the ballots
//! written by every transaction that committed before it.

// SQLite operations need to hold the lock for the duration of the transaction.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use super::error::{CircleError, Result};
use super::types::{
    AmountApproval, Circle, CircleConfig, CircleId, CircleMember, Contribution, MemberApproval,
    MemberStatus, Role, Tally, User, UserId,
};

/// How long a writer waits on a database locked by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite`-based entity store.
///
/// Thread-safe wrapper around a `SQLite` connection. Engines receive it by
/// reference and run each operation inside one store transaction.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) the store at the given path.
    ///
    /// Creates the database file and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Locks the connection, recovering it if a previous holder panicked.
    ///
    /// Unwinding drops the open transaction, which rolls it back; any
    /// transaction still open afterwards is rolled back here.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        match self.conn.lock() {
            Ok(conn) => Ok(conn),
            Err(poisoned) => {
                tracing::warn!("Recovering database connection after a panicked transaction");
                self.conn.clear_poison();
                let conn = poisoned.into_inner();
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK")?;
                }
                Ok(conn)
            }
        }
    }

    /// Initializes the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;

            -- Directory projection; registration happens elsewhere
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS circles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                amount_per_member INTEGER NOT NULL DEFAULT 0,
                proposed_amount INTEGER NOT NULL DEFAULT 0,
                creator_id INTEGER NOT NULL REFERENCES users(id),
                created_at INTEGER NOT NULL
            );

            -- Membership ledger (admin/member, pending/active)
            CREATE TABLE IF NOT EXISTS circle_members (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                circle_id INTEGER NOT NULL REFERENCES circles(id),
                user_id INTEGER NOT NULL REFERENCES users(id),
                role TEXT NOT NULL DEFAULT 'member',
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                UNIQUE (circle_id, user_id)
            );

            -- Admission ballots, kept after the round completes
            CREATE TABLE IF NOT EXISTS member_approvals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                circle_id INTEGER NOT NULL REFERENCES circles(id),
                pending_user_id INTEGER NOT NULL,
                approver_user_id INTEGER NOT NULL,
                approved INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                UNIQUE (circle_id, pending_user_id, approver_user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_member_approvals_approver
                ON member_approvals (approver_user_id, approved);

            -- Ballots of the current amount round only
            CREATE TABLE IF NOT EXISTS amount_approvals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                circle_id INTEGER NOT NULL REFERENCES circles(id),
                proposer_id INTEGER NOT NULL,
                proposed_amount INTEGER NOT NULL,
                approver_id INTEGER NOT NULL,
                approved INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                UNIQUE (circle_id, approver_id)
            );

            CREATE TABLE IF NOT EXISTS contributions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                circle_id INTEGER NOT NULL REFERENCES circles(id),
                user_id INTEGER NOT NULL REFERENCES users(id),
                amount INTEGER NOT NULL,
                month TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_contributions_circle
                ON contributions (circle_id, created_at);
            ",
        )?;

        Ok(())
    }

    /// Runs `f` inside a write transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`; any error rolls
    /// back every write made by `f`.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`, or a database error if the
    /// transaction cannot begin or commit.
    pub fn transaction<T>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T>) -> Result<T> {
        self.run(TransactionBehavior::Immediate, f)
    }

    /// Runs `f` inside a read transaction for a consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`, or a database error.
    pub fn read<T>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T>) -> Result<T> {
        self.run(TransactionBehavior::Deferred, f)
    }

    fn run<T>(
        &self,
        behavior: TransactionBehavior,
        f: impl FnOnce(&StoreTx<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(behavior)?;
        let value = f(&StoreTx { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }
}

/// Handle to an open store transaction.
///
/// All entity reads and writes are methods on this type; it cannot
/// outlive the transaction it was created for.
pub struct StoreTx<'a> {
    conn: &'a Connection,
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn parse_role(s: &str) -> Result<Role> {
    Role::parse(s).ok_or_else(|| CircleError::InvalidData(format!("Invalid role: {s}")))
}

fn parse_status(s: &str) -> Result<MemberStatus> {
    MemberStatus::parse(s).ok_or_else(|| CircleError::InvalidData(format!("Invalid status: {s}")))
}

type MemberRow = (i64, i64, String, String, i64);

fn member_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn member_from_parts((circle_id, user_id, role, status, created_at): MemberRow) -> Result<CircleMember> {
    Ok(CircleMember {
        circle_id: CircleId(circle_id),
        user_id: UserId(user_id),
        role: parse_role(&role)?,
        status: parse_status(&status)?,
        created_at,
    })
}

fn circle_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Circle> {
    Ok(Circle {
        id: CircleId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        amount_per_member: row.get(3)?,
        proposed_amount: row.get(4)?,
        creator_id: UserId(row.get(5)?),
        created_at: row.get(6)?,
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

fn member_approval_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberApproval> {
    Ok(MemberApproval {
        circle_id: CircleId(row.get(0)?),
        pending_user_id: UserId(row.get(1)?),
        approver_user_id: UserId(row.get(2)?),
        approved: row.get(3)?,
    })
}

fn amount_approval_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AmountApproval> {
    Ok(AmountApproval {
        circle_id: CircleId(row.get(0)?),
        proposer_id: UserId(row.get(1)?),
        proposed_amount: row.get(2)?,
        approver_id: UserId(row.get(3)?),
        approved: row.get(4)?,
    })
}

fn tally_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tally> {
    Ok(Tally {
        total: row.get(0)?,
        approved: row.get(1)?,
    })
}

const CIRCLE_COLUMNS: &str =
    "circles.id, circles.name, circles.description, circles.amount_per_member, \
     circles.proposed_amount, circles.creator_id, circles.created_at";

impl StoreTx<'_> {
    // ==================== User Operations ====================

    /// Inserts a user into the directory projection.
    ///
    /// # Errors
    ///
    /// Returns an error if the email is taken or the database operation fails.
    pub fn insert_user(&self, name: &str, email: &str, now: i64) -> Result<User> {
        self.conn.execute(
            "INSERT INTO users (name, email, created_at) VALUES (?1, ?2, ?3)",
            params![name, email, now],
        )?;

        Ok(User {
            id: UserId(self.conn.last_insert_rowid()),
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    /// Retrieves a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email FROM users WHERE id = ?1",
                params![user_id.0],
                user_from_row,
            )
            .optional()?)
    }

    /// Retrieves a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email FROM users WHERE email = ?1",
                params![email],
                user_from_row,
            )
            .optional()?)
    }

    /// Retrieves every listed user in one query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn users_by_ids(&self, user_ids: &[UserId]) -> Result<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, name, email FROM users WHERE id IN ({})",
            placeholders(user_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map(params_from_iter(user_ids.iter().map(|u| u.0)), user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // ==================== Circle Operations ====================

    /// Inserts a circle with no open proposal.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_circle(
        &self,
        config: &CircleConfig,
        creator_id: UserId,
        now: i64,
    ) -> Result<Circle> {
        self.conn.execute(
            r"
            INSERT INTO circles (name, description, amount_per_member, proposed_amount, creator_id, created_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5)
            ",
            params![
                &config.name,
                &config.description,
                config.amount_per_member,
                creator_id.0,
                now,
            ],
        )?;

        Ok(Circle {
            id: CircleId(self.conn.last_insert_rowid()),
            name: config.name.clone(),
            description: config.description.clone(),
            amount_per_member: config.amount_per_member,
            proposed_amount: 0,
            creator_id,
            created_at: now,
        })
    }

    /// Retrieves a circle by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_circle(&self, circle_id: CircleId) -> Result<Option<Circle>> {
        let sql = format!("SELECT {CIRCLE_COLUMNS} FROM circles WHERE circles.id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![circle_id.0], circle_from_row)
            .optional()?)
    }

    /// Retrieves a circle by name and creator.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_circle_by_name(&self, name: &str, creator_id: UserId) -> Result<Option<Circle>> {
        let sql = format!(
            "SELECT {CIRCLE_COLUMNS} FROM circles WHERE circles.name = ?1 AND circles.creator_id = ?2"
        );
        Ok(self
            .conn
            .query_row(&sql, params![name, creator_id.0], circle_from_row)
            .optional()?)
    }

    /// Retrieves every circle the user belongs to, in any status.
    ///
    /// Newest circles come first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn circles_for_user(&self, user_id: UserId) -> Result<Vec<Circle>> {
        let sql = format!(
            r"
            SELECT {CIRCLE_COLUMNS}
            FROM circles
            JOIN circle_members ON circle_members.circle_id = circles.id
            WHERE circle_members.user_id = ?1
            ORDER BY circles.created_at DESC, circles.id DESC
            "
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let circles = stmt
            .query_map(params![user_id.0], circle_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(circles)
    }

    /// Records the candidate amount of a newly opened proposal.
    ///
    /// Returns the number of circles updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_proposed_amount(&self, circle_id: CircleId, amount: u64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE circles SET proposed_amount = ?1 WHERE id = ?2",
            params![amount, circle_id.0],
        )?)
    }

    /// Makes `amount` the effective contribution and clears the proposal.
    ///
    /// Both columns are always written in one statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn apply_amount(&self, circle_id: CircleId, amount: u64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE circles SET amount_per_member = ?1, proposed_amount = 0 WHERE id = ?2",
            params![amount, circle_id.0],
        )?)
    }

    // ==================== Membership Operations ====================

    /// Inserts a membership row.
    ///
    /// # Errors
    ///
    /// Returns an error if the user is already a member or the database
    /// operation fails.
    pub fn insert_member(&self, member: &CircleMember) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO circle_members (circle_id, user_id, role, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                member.circle_id.0,
                member.user_id.0,
                member.role.as_str(),
                member.status.as_str(),
                member.created_at,
            ],
        )?;
        Ok(())
    }

    /// Retrieves a user's membership in a circle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_member(&self, circle_id: CircleId, user_id: UserId) -> Result<Option<CircleMember>> {
        self.conn
            .query_row(
                r"
                SELECT circle_id, user_id, role, status, created_at
                FROM circle_members
                WHERE circle_id = ?1 AND user_id = ?2
                ",
                params![circle_id.0, user_id.0],
                member_from_row,
            )
            .optional()?
            .map(member_from_parts)
            .transpose()
    }

    /// Retrieves the members of a circle with the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn members_with_status(
        &self,
        circle_id: CircleId,
        status: MemberStatus,
    ) -> Result<Vec<CircleMember>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT circle_id, user_id, role, status, created_at
            FROM circle_members
            WHERE circle_id = ?1 AND status = ?2
            ORDER BY id
            ",
        )?;
        let rows = stmt
            .query_map(params![circle_id.0, status.as_str()], member_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(member_from_parts).collect()
    }

    /// Retrieves the members of every listed circle together with their
    /// directory entries, in one query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn members_for_circles(&self, circle_ids: &[CircleId]) -> Result<Vec<(CircleMember, User)>> {
        if circle_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r"
            SELECT m.circle_id, m.user_id, m.role, m.status, m.created_at, u.name, u.email
            FROM circle_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.circle_id IN ({})
            ORDER BY m.circle_id, m.id
            ",
            placeholders(circle_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(circle_ids.iter().map(|c| c.0)), |row| {
                Ok((member_from_row(row)?, row.get::<_, String>(5)?, row.get::<_, String>(6)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(parts, name, email)| {
                let member = member_from_parts(parts)?;
                let user = User {
                    id: member.user_id,
                    name,
                    email,
                };
                Ok((member, user))
            })
            .collect()
    }

    /// Flips a pending member to active.
    ///
    /// Returns the number of rows changed; activating an already active
    /// member changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn activate_member(&self, circle_id: CircleId, user_id: UserId) -> Result<usize> {
        Ok(self.conn.execute(
            r"
            UPDATE circle_members SET status = 'active'
            WHERE circle_id = ?1 AND user_id = ?2 AND status = 'pending'
            ",
            params![circle_id.0, user_id.0],
        )?)
    }

    // ==================== Admission Ballot Operations ====================

    /// Inserts an admission ballot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_member_approval(&self, approval: &MemberApproval, now: i64) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO member_approvals (circle_id, pending_user_id, approver_user_id, approved, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                approval.circle_id.0,
                approval.pending_user_id.0,
                approval.approver_user_id.0,
                approval.approved,
                now,
            ],
        )?;
        Ok(())
    }

    /// Marks an unapproved admission ballot as approved.
    ///
    /// Returns the number of ballots flipped (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn cast_member_approval(
        &self,
        circle_id: CircleId,
        pending_user_id: UserId,
        approver_user_id: UserId,
    ) -> Result<usize> {
        Ok(self.conn.execute(
            r"
            UPDATE member_approvals SET approved = 1
            WHERE circle_id = ?1 AND pending_user_id = ?2 AND approver_user_id = ?3 AND approved = 0
            ",
            params![circle_id.0, pending_user_id.0, approver_user_id.0],
        )?)
    }

    /// Counts the ballots of an admission round.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn member_tally(&self, circle_id: CircleId, pending_user_id: UserId) -> Result<Tally> {
        Ok(self.conn.query_row(
            r"
            SELECT COUNT(*), COALESCE(SUM(approved), 0)
            FROM member_approvals
            WHERE circle_id = ?1 AND pending_user_id = ?2
            ",
            params![circle_id.0, pending_user_id.0],
            tally_from_row,
        )?)
    }

    /// Retrieves the ballots of an admission round.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn member_approvals(
        &self,
        circle_id: CircleId,
        pending_user_id: UserId,
    ) -> Result<Vec<MemberApproval>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT circle_id, pending_user_id, approver_user_id, approved
            FROM member_approvals
            WHERE circle_id = ?1 AND pending_user_id = ?2
            ORDER BY id
            ",
        )?;
        let approvals = stmt
            .query_map(params![circle_id.0, pending_user_id.0], member_approval_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(approvals)
    }

    /// Retrieves the admission ballots `approver` still owes across the
    /// listed circles, in one query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn owed_member_approvals(
        &self,
        circle_ids: &[CircleId],
        approver_user_id: UserId,
    ) -> Result<Vec<MemberApproval>> {
        if circle_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r"
            SELECT circle_id, pending_user_id, approver_user_id, approved
            FROM member_approvals
            WHERE circle_id IN ({}) AND approver_user_id = ? AND approved = 0
            ORDER BY id
            ",
            placeholders(circle_ids.len())
        );
        let values = circle_ids
            .iter()
            .map(|c| c.0)
            .chain(std::iter::once(approver_user_id.0));
        let mut stmt = self.conn.prepare(&sql)?;
        let approvals = stmt
            .query_map(params_from_iter(values), member_approval_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(approvals)
    }

    // ==================== Amount Ballot Operations ====================

    /// Inserts an amount ballot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_amount_approval(&self, approval: &AmountApproval, now: i64) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO amount_approvals (circle_id, proposer_id, proposed_amount, approver_id, approved, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                approval.circle_id.0,
                approval.proposer_id.0,
                approval.proposed_amount,
                approval.approver_id.0,
                approval.approved,
                now,
            ],
        )?;
        Ok(())
    }

    /// Hard-deletes every amount ballot of a circle.
    ///
    /// Returns the number of ballots removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_amount_approvals(&self, circle_id: CircleId) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM amount_approvals WHERE circle_id = ?1",
            params![circle_id.0],
        )?)
    }

    /// Marks the approver's unapproved amount ballot as approved.
    ///
    /// Returns the number of ballots flipped (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn cast_amount_approval(&self, circle_id: CircleId, approver_id: UserId) -> Result<usize> {
        Ok(self.conn.execute(
            r"
            UPDATE amount_approvals SET approved = 1
            WHERE circle_id = ?1 AND approver_id = ?2 AND approved = 0
            ",
            params![circle_id.0, approver_id.0],
        )?)
    }

    /// Counts the ballots of the circle's current amount round.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn amount_tally(&self, circle_id: CircleId) -> Result<Tally> {
        Ok(self.conn.query_row(
            r"
            SELECT COUNT(*), COALESCE(SUM(approved), 0)
            FROM amount_approvals
            WHERE circle_id = ?1
            ",
            params![circle_id.0],
            tally_from_row,
        )?)
    }

    /// Retrieves any one ballot of the current amount round.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn first_amount_approval(&self, circle_id: CircleId) -> Result<Option<AmountApproval>> {
        Ok(self
            .conn
            .query_row(
                r"
                SELECT circle_id, proposer_id, proposed_amount, approver_id, approved
                FROM amount_approvals
                WHERE circle_id = ?1
                ORDER BY id
                LIMIT 1
                ",
                params![circle_id.0],
                amount_approval_from_row,
            )
            .optional()?)
    }

    /// Retrieves the amount ballots of every listed circle in one query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn amount_approvals_for_circles(
        &self,
        circle_ids: &[CircleId],
    ) -> Result<Vec<AmountApproval>> {
        if circle_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r"
            SELECT circle_id, proposer_id, proposed_amount, approver_id, approved
            FROM amount_approvals
            WHERE circle_id IN ({})
            ORDER BY id
            ",
            placeholders(circle_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let approvals = stmt
            .query_map(
                params_from_iter(circle_ids.iter().map(|c| c.0)),
                amount_approval_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(approvals)
    }

    // ==================== Contribution Operations ====================

    /// Inserts a contribution.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_contribution(
        &self,
        circle_id: CircleId,
        user_id: UserId,
        amount: u64,
        month: &str,
        now: i64,
    ) -> Result<Contribution> {
        self.conn.execute(
            r"
            INSERT INTO contributions (circle_id, user_id, amount, month, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![circle_id.0, user_id.0, amount, month, now],
        )?;

        Ok(Contribution {
            id: self.conn.last_insert_rowid(),
            circle_id,
            user_id,
            amount,
            month: month.to_string(),
            created_at: now,
        })
    }

    /// Retrieves a circle's contributions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn contributions_for_circle(&self, circle_id: CircleId) -> Result<Vec<Contribution>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, circle_id, user_id, amount, month, created_at
            FROM contributions
            WHERE circle_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )?;
        let contributions = stmt
            .query_map(params![circle_id.0], |row| {
                Ok(Contribution {
                    id: row.get(0)?,
                    circle_id: CircleId(row.get(1)?),
                    user_id: UserId(row.get(2)?),
                    amount: row.get(3)?,
                    month: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contributions)
    }
}

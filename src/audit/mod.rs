//! Audit ledger: append-only SQLite record of sensitive operations.
//!
//! Every vault mutation and every sensitive read appends one row to
//! `audit_logs`.  Rows are never updated or deleted: the schema carries
//! triggers that abort any attempt to do so.
//!
//! The ledger owns its own connection, so each entry commits in its own
//! transaction, independently of the operation that triggered it.
//! Writing is best-effort: `log` never fails the caller.  A write that
//! cannot be persisted is rolled back and reported on the tracing error
//! channel, and the calling operation carries on.  Use `record` when the
//! outcome matters (tests, tooling).

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::errors::Result;
use crate::identity::User;

/// Actor name recorded when no identity is attached to an event.
pub const ANONYMOUS: &str = "anonymous";

/// Kinds of audited operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    SecretCreated,
    SecretViewed,
    SecretUpdated,
    SecretDeleted,
    SecretShared,
    SecretUnshared,
    PasswordCopied,
    SecretsExported,
    SecretsImported,
    FolderCreated,
    FolderDeleted,
    Login,
    LoginFailed,
    UserCreated,
    RoleChanged,
    GroupCreated,
    GroupMemberAdded,
    GroupMemberRemoved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SecretCreated => "secret_created",
            AuditAction::SecretViewed => "secret_viewed",
            AuditAction::SecretUpdated => "secret_updated",
            AuditAction::SecretDeleted => "secret_deleted",
            AuditAction::SecretShared => "secret_shared",
            AuditAction::SecretUnshared => "secret_unshared",
            AuditAction::PasswordCopied => "password_copied",
            AuditAction::SecretsExported => "secrets_exported",
            AuditAction::SecretsImported => "secrets_imported",
            AuditAction::FolderCreated => "folder_created",
            AuditAction::FolderDeleted => "folder_deleted",
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::UserCreated => "user_created",
            AuditAction::RoleChanged => "role_changed",
            AuditAction::GroupCreated => "group_created",
            AuditAction::GroupMemberAdded => "group_member_added",
            AuditAction::GroupMemberRemoved => "group_member_removed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event about to be written to the ledger.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
    pub resource_type: Option<&'static str>,
    pub resource_id: Option<i64>,
    pub resource_name: Option<String>,
    pub details: Option<String>,
    pub origin: Option<String>,
    pub success: bool,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            actor_id: None,
            actor_name: None,
            resource_type: None,
            resource_id: None,
            resource_name: None,
            details: None,
            origin: None,
            success: true,
        }
    }

    /// Attribute the event to a known user.
    pub fn actor(mut self, user: &User) -> Self {
        self.actor_id = Some(user.id);
        self.actor_name = Some(user.username.clone());
        self
    }

    /// Attribute the event to a bare name (e.g. a failed login attempt).
    pub fn actor_name(mut self, name: impl Into<String>) -> Self {
        self.actor_name = Some(name.into());
        self
    }

    pub fn resource(mut self, kind: &'static str, id: i64, name: impl Into<String>) -> Self {
        self.resource_type = Some(kind);
        self.resource_id = Some(id);
        self.resource_name = Some(name.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn origin(mut self, origin: Option<&str>) -> Self {
        self.origin = origin.map(str::to_string);
        self
    }

    /// Mark the event as a failed or denied attempt.
    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// A single persisted audit entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub actor_id: Option<i64>,
    pub actor_name: String,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<i64>,
    pub resource_name: Option<String>,
    pub details: Option<String>,
    pub origin: Option<String>,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Filters for `AuditLedger::query`.  All filters are optional.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Maximum number of entries (most recent first). `None` = no limit.
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
    pub action: Option<String>,
    pub actor_id: Option<i64>,
    pub resource_id: Option<i64>,
}

/// SQLite-backed audit ledger.
pub struct AuditLedger {
    conn: Connection,
}

impl AuditLedger {
    /// Open a dedicated ledger connection to the vault database.
    ///
    /// The schema is expected to exist (`Database::open` creates it).
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            conn: db::open_connection(db_path)?,
        })
    }

    /// Wrap an existing connection.
    pub fn with_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Record an event, swallowing any failure.
    ///
    /// An audit outage never fails or rolls back the audited operation;
    /// failures are reported through `tracing` instead.
    pub fn log(&self, event: AuditEvent) {
        if let Err(e) = self.record(&event) {
            tracing::warn!(
                action = event.action.as_str(),
                resource_id = ?event.resource_id,
                error = %e,
                "audit ledger write failed"
            );
        }
    }

    /// Record an event and return the new entry id.
    ///
    /// Runs in its own transaction, which is rolled back on failure.
    pub fn record(&self, event: &AuditEvent) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO audit_logs
                (user_id, username, action, resource_type, resource_id,
                 resource_name, details, ip_address, success, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.actor_id,
                event
                    .actor_name
                    .as_deref()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or(ANONYMOUS),
                event.action.as_str(),
                event.resource_type,
                event.resource_id,
                event.resource_name,
                event.details,
                event.origin,
                event.success,
                Utc::now(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Query audit entries, most recent first.
    pub fn query(&self, filter: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let limit = filter
            .limit
            .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, username, action, resource_type, resource_id,
                    resource_name, details, ip_address, success, created_at
             FROM audit_logs
             WHERE (?1 IS NULL OR created_at >= ?1)
               AND (?2 IS NULL OR action = ?2)
               AND (?3 IS NULL OR user_id = ?3)
               AND (?4 IS NULL OR resource_id = ?4)
             ORDER BY id DESC
             LIMIT ?5",
        )?;

        let rows = stmt.query_map(
            params![
                filter.since,
                filter.action,
                filter.actor_id,
                filter.resource_id,
                limit
            ],
            entry_from_row,
        )?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Fetch a single entry by id.
    pub fn get(&self, id: i64) -> Result<Option<AuditEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, user_id, username, action, resource_type, resource_id,
                        resource_name, details, ip_address, success, created_at
                 FROM audit_logs WHERE id = ?1",
                [id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        actor_name: row.get(2)?,
        action: row.get(3)?,
        resource_type: row.get(4)?,
        resource_id: row.get(5)?,
        resource_name: row.get(6)?,
        details: row.get(7)?,
        origin: row.get(8)?,
        success: row.get(9)?,
        created_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    fn ledger(dir: &TempDir) -> AuditLedger {
        let path = dir.path().join("keyvault.db");
        Database::open(&path).unwrap();
        AuditLedger::open(&path).unwrap()
    }

    #[test]
    fn record_and_query_roundtrip() {
        let dir = TempDir::new().unwrap();
        let audit = ledger(&dir);

        audit.log(AuditEvent::new(AuditAction::SecretCreated).resource("secret", 1, "DB"));
        audit.log(AuditEvent::new(AuditAction::SecretViewed).resource("secret", 1, "DB"));
        audit.log(AuditEvent::new(AuditAction::SecretDeleted).resource("secret", 1, "DB"));

        let entries = audit.query(&AuditQuery::default()).unwrap();
        assert_eq!(entries.len(), 3);

        // Most recent first.
        assert_eq!(entries[0].action, "secret_deleted");
        assert_eq!(entries[2].action, "secret_created");
    }

    #[test]
    fn missing_actor_is_recorded_as_anonymous() {
        let dir = TempDir::new().unwrap();
        let audit = ledger(&dir);

        let id = audit
            .record(&AuditEvent::new(AuditAction::LoginFailed).actor_name("  ").failed())
            .unwrap();
        let entry = audit.get(id).unwrap().unwrap();
        assert_eq!(entry.actor_name, ANONYMOUS);
        assert!(entry.actor_id.is_none());
        assert!(!entry.success);
    }

    #[test]
    fn query_filters_by_action_and_limit() {
        let dir = TempDir::new().unwrap();
        let audit = ledger(&dir);

        for i in 0..5 {
            audit.log(AuditEvent::new(AuditAction::SecretViewed).resource("secret", i, "x"));
        }
        audit.log(AuditEvent::new(AuditAction::Login));

        let viewed = audit
            .query(&AuditQuery {
                action: Some("secret_viewed".into()),
                limit: Some(3),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(viewed.len(), 3);
        assert!(viewed.iter().all(|e| e.action == "secret_viewed"));

        let for_resource = audit
            .query(&AuditQuery {
                resource_id: Some(2),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(for_resource.len(), 1);
    }

    #[test]
    fn query_with_since_filter() {
        let dir = TempDir::new().unwrap();
        let audit = ledger(&dir);

        audit.log(AuditEvent::new(AuditAction::Login));

        let past = Utc::now() - chrono::Duration::hours(1);
        let entries = audit
            .query(&AuditQuery {
                since: Some(past),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(entries.len(), 1);

        let future = Utc::now() + chrono::Duration::hours(1);
        let entries = audit
            .query(&AuditQuery {
                since: Some(future),
                ..AuditQuery::default()
            })
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn log_swallows_store_outage() {
        // A connection without the schema behaves like an unreachable store.
        let audit = AuditLedger::with_connection(Connection::open_in_memory().unwrap());

        audit.log(AuditEvent::new(AuditAction::SecretCreated));
        assert!(audit.record(&AuditEvent::new(AuditAction::SecretCreated)).is_err());
    }

    #[test]
    fn entries_are_immutable() {
        let dir = TempDir::new().unwrap();
        let audit = ledger(&dir);
        let id = audit.record(&AuditEvent::new(AuditAction::Login)).unwrap();

        assert!(audit
            .conn
            .execute("DELETE FROM audit_logs WHERE id = ?1", [id])
            .is_err());
        assert!(audit.get(id).unwrap().is_some());
    }
}

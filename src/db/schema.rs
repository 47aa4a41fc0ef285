//! Database schema.
//!
//! Created idempotently on every open and stamped with
//! `PRAGMA user_version` so later releases can migrate forward.

use rusqlite::Connection;

use crate::errors::{VaultError, Result};

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    username              TEXT NOT NULL UNIQUE,
    email                 TEXT UNIQUE,
    full_name             TEXT NOT NULL,
    display_name          TEXT,
    department            TEXT,
    title                 TEXT,
    role                  TEXT NOT NULL DEFAULT 'user'
                          CHECK (role IN ('admin', 'user', 'readonly')),
    failed_login_attempts INTEGER NOT NULL DEFAULT 0,
    locked_until          TEXT,
    last_login_at         TEXT,
    last_login_ip         TEXT,
    directory_dn          TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT
);

CREATE TABLE IF NOT EXISTS groups (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL UNIQUE,
    description  TEXT,
    directory_dn TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_groups (
    user_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    added_at TEXT NOT NULL,
    PRIMARY KEY (user_id, group_id)
);

CREATE TABLE IF NOT EXISTS folders (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    parent_id  INTEGER REFERENCES folders(id) ON DELETE SET NULL,
    owner_id   INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS secrets (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    name                   TEXT NOT NULL,
    description            TEXT,
    category               TEXT NOT NULL DEFAULT 'credential',
    encrypted_username     BLOB,
    encrypted_password     BLOB,
    encrypted_url          BLOB,
    encrypted_notes        BLOB,
    encrypted_api_key      BLOB,
    encrypted_extra_data   BLOB,
    url_domain             TEXT,
    folder_id              INTEGER REFERENCES folders(id) ON DELETE SET NULL,
    owner_id               INTEGER NOT NULL REFERENCES users(id),
    is_favorite            INTEGER NOT NULL DEFAULT 0,
    expires_at             TEXT,
    password_last_changed  TEXT,
    rotation_interval_days INTEGER,
    encryption_version     INTEGER NOT NULL DEFAULT 1,
    created_at             TEXT NOT NULL,
    updated_at             TEXT
);
CREATE INDEX IF NOT EXISTS idx_secrets_name ON secrets(name);
CREATE INDEX IF NOT EXISTS idx_secrets_owner ON secrets(owner_id);
CREATE INDEX IF NOT EXISTS idx_secrets_domain ON secrets(url_domain);

CREATE TABLE IF NOT EXISTS secret_tags (
    secret_id INTEGER NOT NULL REFERENCES secrets(id) ON DELETE CASCADE,
    tag_id    INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (secret_id, tag_id)
);

CREATE TABLE IF NOT EXISTS secret_shares (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    secret_id    INTEGER NOT NULL REFERENCES secrets(id) ON DELETE CASCADE,
    user_id      INTEGER REFERENCES users(id) ON DELETE CASCADE,
    group_id     INTEGER REFERENCES groups(id) ON DELETE CASCADE,
    permission   TEXT NOT NULL DEFAULT 'read'
                 CHECK (permission IN ('read', 'write')),
    shared_by_id INTEGER NOT NULL REFERENCES users(id),
    expires_at   TEXT,
    created_at   TEXT NOT NULL,
    CONSTRAINT share_target_check CHECK (user_id IS NOT NULL OR group_id IS NOT NULL)
);
CREATE INDEX IF NOT EXISTS idx_shares_secret ON secret_shares(secret_id);

CREATE TABLE IF NOT EXISTS audit_logs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER,
    username      TEXT NOT NULL,
    action        TEXT NOT NULL,
    resource_type TEXT,
    resource_id   INTEGER,
    resource_name TEXT,
    details       TEXT,
    ip_address    TEXT,
    success       INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_logs(action);
CREATE INDEX IF NOT EXISTS idx_audit_created ON audit_logs(created_at);

CREATE TRIGGER IF NOT EXISTS audit_logs_no_update
BEFORE UPDATE ON audit_logs
BEGIN
    SELECT RAISE(ABORT, 'audit entries are immutable');
END;

CREATE TRIGGER IF NOT EXISTS audit_logs_no_delete
BEFORE DELETE ON audit_logs
BEGIN
    SELECT RAISE(ABORT, 'audit entries are immutable');
END;
";

/// Create any missing tables and stamp the schema version.
///
/// Refuses to touch a database written by a newer release.
pub fn migrate(conn: &Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(VaultError::ConfigError(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    conn.execute_batch(SCHEMA)?;

    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tracing::debug!(from = version, to = SCHEMA_VERSION, "migrated database schema");
    }

    Ok(())
}

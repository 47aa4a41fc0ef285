//! Persistence for users, groups and group memberships.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Group, NewUser, Role, User};
use crate::errors::{VaultError, Result};

const USER_COLUMNS: &str = "id, username, email, full_name, display_name, department, title,
     role, failed_login_attempts, locked_until, last_login_at, last_login_ip,
     directory_dn, created_at";

/// Directory attributes copied onto the local account at login.
#[derive(Debug, Clone, Default)]
pub struct ProfileSync<'a> {
    pub email: Option<&'a str>,
    pub full_name: &'a str,
    pub display_name: Option<&'a str>,
    pub department: Option<&'a str>,
    pub title: Option<&'a str>,
    pub directory_dn: Option<&'a str>,
}

/// Users and groups over a borrowed connection or transaction.
pub struct UserStore<'c> {
    conn: &'c Connection,
}

impl<'c> UserStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn get(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = self.conn.query_row(&sql, [id], user_from_row).optional()?;
        self.with_groups(user)
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        let user = self
            .conn
            .query_row(&sql, [username], user_from_row)
            .optional()?;
        self.with_groups(user)
    }

    /// Fetch a user that must exist.
    pub fn require(&self, id: i64) -> Result<User> {
        self.get(id)?
            .ok_or_else(|| VaultError::not_found("user", id))
    }

    /// Fetch a user by name that must exist.
    pub fn require_username(&self, username: &str) -> Result<User> {
        self.find_by_username(username)?
            .ok_or_else(|| VaultError::not_found("user", username))
    }

    /// All users, sorted by username.
    pub fn list(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], user_from_row)?;

        let mut users = Vec::new();
        for row in rows {
            let mut user = row?;
            user.group_ids = self.group_ids_for(user.id)?;
            users.push(user);
        }
        Ok(users)
    }

    pub fn create(&self, new: &NewUser) -> Result<User> {
        let username = new.username.trim();
        if username.is_empty() {
            return Err(VaultError::Validation("username cannot be empty".into()));
        }
        if self.find_by_username(username)?.is_some() {
            return Err(VaultError::Validation(format!(
                "user '{username}' already exists"
            )));
        }

        self.conn.execute(
            "INSERT INTO users (username, email, full_name, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                username,
                new.email,
                new.full_name.trim(),
                new.role.as_str(),
                Utc::now()
            ],
        )?;
        self.require(self.conn.last_insert_rowid())
    }

    pub fn set_role(&self, id: i64, role: Role) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
            params![role.as_str(), Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(VaultError::not_found("user", id));
        }
        Ok(())
    }

    /// Count a failed login and lock the account once `max_attempts`
    /// is reached.  Returns the updated user.
    pub fn record_failed_login(
        &self,
        id: i64,
        max_attempts: u32,
        lockout: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let user = self.require(id)?;
        let attempts = user.failed_login_attempts.saturating_add(1);
        let locked_until = if attempts >= max_attempts {
            Some(now + lockout)
        } else {
            user.locked_until
        };

        self.conn.execute(
            "UPDATE users SET failed_login_attempts = ?1, locked_until = ?2, updated_at = ?3
             WHERE id = ?4",
            params![attempts, locked_until, now, id],
        )?;
        self.require(id)
    }

    /// Apply a successful login: sync directory attributes, reset the
    /// failure counter and lock, and stamp the login time and origin.
    pub fn record_login(
        &self,
        id: i64,
        profile: &ProfileSync<'_>,
        role: Role,
        origin: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<User> {
        self.conn.execute(
            "UPDATE users SET
                email = ?1, full_name = ?2, display_name = ?3, department = ?4,
                title = ?5, directory_dn = ?6, role = ?7,
                failed_login_attempts = 0, locked_until = NULL,
                last_login_at = ?8, last_login_ip = ?9, updated_at = ?8
             WHERE id = ?10",
            params![
                profile.email,
                profile.full_name,
                profile.display_name,
                profile.department,
                profile.title,
                profile.directory_dn,
                role.as_str(),
                now,
                origin,
                id
            ],
        )?;
        self.require(id)
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::Validation("group name cannot be empty".into()));
        }
        if self.find_group(name)?.is_some() {
            return Err(VaultError::Validation(format!(
                "group '{name}' already exists"
            )));
        }

        self.conn.execute(
            "INSERT INTO groups (name, description, created_at) VALUES (?1, ?2, ?3)",
            params![name, description, Utc::now()],
        )?;
        self.require_group(self.conn.last_insert_rowid())
    }

    pub fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT id, name, description, directory_dn, created_at FROM groups WHERE id = ?1",
                [id],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    pub fn require_group(&self, id: i64) -> Result<Group> {
        self.get_group(id)?
            .ok_or_else(|| VaultError::not_found("group", id))
    }

    pub fn find_group(&self, name: &str) -> Result<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT id, name, description, directory_dn, created_at FROM groups WHERE name = ?1",
                [name],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, directory_dn, created_at FROM groups ORDER BY name",
        )?;
        let rows = stmt.query_map([], group_from_row)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    /// Add a membership; adding an existing membership is a no-op.
    /// Returns whether a row was inserted.
    pub fn add_member(&self, user_id: i64, group_id: i64) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id, added_at) VALUES (?1, ?2, ?3)",
            params![user_id, group_id, Utc::now()],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a membership.  Returns whether one existed.
    pub fn remove_member(&self, user_id: i64, group_id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM user_groups WHERE user_id = ?1 AND group_id = ?2",
            params![user_id, group_id],
        )?;
        Ok(removed > 0)
    }

    pub fn group_ids_for(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT group_id FROM user_groups WHERE user_id = ?1 ORDER BY group_id")?;
        let rows = stmt.query_map([user_id], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn with_groups(&self, user: Option<User>) -> Result<Option<User>> {
        match user {
            Some(mut user) => {
                user.group_ids = self.group_ids_for(user.id)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(7)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        display_name: row.get(4)?,
        department: row.get(5)?,
        title: row.get(6)?,
        role,
        failed_login_attempts: row.get(8)?,
        locked_until: row.get(9)?,
        last_login_at: row.get(10)?,
        last_login_ip: row.get(11)?,
        directory_dn: row.get(12)?,
        group_ids: Vec::new(),
        created_at: row.get(13)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        directory_dn: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn create_and_find_user() {
        let db = Database::open_in_memory().unwrap();
        let store = UserStore::new(db.conn());

        let created = store.create(&NewUser::new("alice", Role::User)).unwrap();
        let found = store.find_by_username("alice").unwrap().unwrap();
        assert_eq!(created, found);
        assert_eq!(found.role, Role::User);
        assert!(store.find_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let store = UserStore::new(db.conn());

        store.create(&NewUser::new("alice", Role::User)).unwrap();
        let err = store.create(&NewUser::new("alice", Role::Admin)).unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[test]
    fn memberships_are_loaded_with_user() {
        let db = Database::open_in_memory().unwrap();
        let store = UserStore::new(db.conn());

        let user = store.create(&NewUser::new("alice", Role::User)).unwrap();
        let ops = store.create_group("ops", None).unwrap();
        let dev = store.create_group("dev", Some("developers")).unwrap();

        assert!(store.add_member(user.id, ops.id).unwrap());
        assert!(!store.add_member(user.id, ops.id).unwrap());
        store.add_member(user.id, dev.id).unwrap();

        let reloaded = store.require(user.id).unwrap();
        assert!(reloaded.in_group(ops.id));
        assert!(reloaded.in_group(dev.id));

        assert!(store.remove_member(user.id, ops.id).unwrap());
        assert!(!store.require(user.id).unwrap().in_group(ops.id));
    }

    #[test]
    fn failed_logins_lock_after_max_attempts() {
        let db = Database::open_in_memory().unwrap();
        let store = UserStore::new(db.conn());
        let user = store.create(&NewUser::new("alice", Role::User)).unwrap();
        let now = Utc::now();
        let lockout = chrono::Duration::minutes(15);

        let after_one = store.record_failed_login(user.id, 2, lockout, now).unwrap();
        assert_eq!(after_one.failed_login_attempts, 1);
        assert!(!after_one.is_locked(now));

        let after_two = store.record_failed_login(user.id, 2, lockout, now).unwrap();
        assert_eq!(after_two.failed_login_attempts, 2);
        assert!(after_two.is_locked(now));
        assert!(!after_two.is_locked(now + lockout));
    }

    #[test]
    fn set_role_on_missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let store = UserStore::new(db.conn());
        assert!(matches!(
            store.set_role(99, Role::Admin),
            Err(VaultError::NotFound { .. })
        ));
    }
}

//! SQLite persistence for secrets, their tags and their shares.
//!
//! `SecretStore` never sees plaintext: it moves `Sealed` ciphertext
//! between `Secret` values and BLOB columns.  Access control is not
//! enforced here; callers go through `VaultService`.

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::secret::{Category, Secret, SecretFilter};
use super::share::{NewShare, Permission, Share, ShareTarget};
use crate::errors::{VaultError, Result};
use crate::identity::User;

const SECRET_COLUMNS: &str = "s.id, s.name, s.description, s.category, s.owner_id, s.folder_id,
     s.encrypted_username, s.encrypted_password, s.encrypted_url, s.encrypted_notes,
     s.encrypted_api_key, s.encrypted_extra_data, s.url_domain, s.is_favorite,
     s.expires_at, s.password_last_changed, s.rotation_interval_days,
     s.encryption_version, s.created_at, s.updated_at";

const SHARE_COLUMNS: &str =
    "id, secret_id, user_id, group_id, permission, shared_by_id, expires_at, created_at";

/// Secrets, tags and shares over a borrowed connection or transaction.
pub struct SecretStore<'c> {
    conn: &'c Connection,
}

impl<'c> SecretStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------------
    // Secrets
    // ------------------------------------------------------------------

    pub fn get(&self, id: i64) -> Result<Option<Secret>> {
        let sql = format!("SELECT {SECRET_COLUMNS} FROM secrets s WHERE s.id = ?1");
        let secret = self
            .conn
            .query_row(&sql, [id], secret_from_row)
            .optional()?;
        match secret {
            Some(mut secret) => {
                secret.tags = self.tags_for(secret.id)?;
                Ok(Some(secret))
            }
            None => Ok(None),
        }
    }

    /// Fetch a secret that must exist.
    pub fn require(&self, id: i64) -> Result<Secret> {
        self.get(id)?
            .ok_or_else(|| VaultError::not_found("secret", id))
    }

    /// Insert a drafted secret and its tags; returns the stored record.
    pub fn insert(&self, secret: &Secret) -> Result<Secret> {
        self.conn.execute(
            "INSERT INTO secrets
                (name, description, category, owner_id, folder_id,
                 encrypted_username, encrypted_password, encrypted_url, encrypted_notes,
                 encrypted_api_key, encrypted_extra_data, url_domain, is_favorite,
                 expires_at, password_last_changed, rotation_interval_days,
                 encryption_version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                secret.name,
                secret.description,
                secret.category.as_str(),
                secret.owner_id,
                secret.folder_id,
                secret.username,
                secret.password,
                secret.url,
                secret.notes,
                secret.api_key,
                secret.extra_data,
                secret.url_domain,
                secret.is_favorite,
                secret.expires_at,
                secret.password_last_changed,
                secret.rotation_interval_days,
                secret.encryption_version,
                secret.created_at,
                secret.updated_at,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.replace_tags(id, &secret.tags)?;
        self.require(id)
    }

    /// Write back every column of an existing secret, tags included.
    pub fn update(&self, secret: &Secret) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE secrets SET
                name = ?1, description = ?2, category = ?3, folder_id = ?4,
                encrypted_username = ?5, encrypted_password = ?6, encrypted_url = ?7,
                encrypted_notes = ?8, encrypted_api_key = ?9, encrypted_extra_data = ?10,
                url_domain = ?11, is_favorite = ?12, expires_at = ?13,
                password_last_changed = ?14, rotation_interval_days = ?15,
                encryption_version = ?16, updated_at = ?17
             WHERE id = ?18",
            params![
                secret.name,
                secret.description,
                secret.category.as_str(),
                secret.folder_id,
                secret.username,
                secret.password,
                secret.url,
                secret.notes,
                secret.api_key,
                secret.extra_data,
                secret.url_domain,
                secret.is_favorite,
                secret.expires_at,
                secret.password_last_changed,
                secret.rotation_interval_days,
                secret.encryption_version,
                secret.updated_at,
                secret.id,
            ],
        )?;
        if changed == 0 {
            return Err(VaultError::not_found("secret", secret.id));
        }
        self.replace_tags(secret.id, &secret.tags)
    }

    /// Delete a secret.  Shares and tag links go with it (FK cascade).
    /// Returns whether a row was removed.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM secrets WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    /// Flip the favorite flag without touching `updated_at`.
    pub fn set_favorite(&self, id: i64, favorite: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE secrets SET is_favorite = ?1 WHERE id = ?2",
            params![favorite, id],
        )?;
        Ok(())
    }

    /// Secrets that may be visible to `viewer`, after applying `filter`.
    ///
    /// With `include_all` every secret is a candidate (admin view);
    /// otherwise only owned secrets and secrets with any share row
    /// reaching the viewer.  Share expiry and permission are not checked
    /// here: the caller runs each candidate through the access policy.
    ///
    /// Ordered by last update (never-updated first), then creation,
    /// newest first.
    pub fn candidates(
        &self,
        viewer: &User,
        include_all: bool,
        filter: &SecretFilter,
    ) -> Result<Vec<Secret>> {
        let sql = format!(
            "SELECT {SECRET_COLUMNS} FROM secrets s
             WHERE (?1 = 1 OR s.owner_id = ?2 OR EXISTS (
                     SELECT 1 FROM secret_shares sh
                     WHERE sh.secret_id = s.id
                       AND (sh.user_id = ?2
                            OR sh.group_id IN (SELECT group_id FROM user_groups WHERE user_id = ?2))))
               AND (?3 IS NULL OR s.folder_id = ?3)
               AND (?4 IS NULL OR s.category = ?4)
               AND (?5 IS NULL
                    OR s.name LIKE ?5 ESCAPE '\\'
                    OR s.description LIKE ?5 ESCAPE '\\'
                    OR s.url_domain LIKE ?5 ESCAPE '\\')
               AND (?6 = 0 OR s.is_favorite = 1)
             ORDER BY s.updated_at IS NOT NULL, s.updated_at DESC, s.created_at DESC, s.id DESC"
        );

        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(like_pattern);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                include_all,
                viewer.id,
                filter.folder_id,
                filter.category.map(|c| c.as_str()),
                pattern,
                filter.favorites_only,
            ],
            secret_from_row,
        )?;

        let mut secrets = Vec::new();
        for row in rows {
            let mut secret = row?;
            secret.tags = self.tags_for(secret.id)?;
            secrets.push(secret);
        }
        Ok(secrets)
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    pub fn tags_for(&self, secret_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name FROM tags t
             JOIN secret_tags st ON st.tag_id = t.id
             WHERE st.secret_id = ?1
             ORDER BY t.name",
        )?;
        let rows = stmt.query_map([secret_id], |row| row.get(0))?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    /// Replace a secret's tag set, creating unknown tags by exact name.
    fn replace_tags(&self, secret_id: i64, tags: &[String]) -> Result<()> {
        self.conn
            .execute("DELETE FROM secret_tags WHERE secret_id = ?1", [secret_id])?;
        for name in tags {
            let tag_id = self.find_or_create_tag(name)?;
            self.conn.execute(
                "INSERT OR IGNORE INTO secret_tags (secret_id, tag_id) VALUES (?1, ?2)",
                params![secret_id, tag_id],
            )?;
        }
        Ok(())
    }

    fn find_or_create_tag(&self, name: &str) -> Result<i64> {
        self.conn
            .execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
        let id = self
            .conn
            .query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))?;
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Shares
    // ------------------------------------------------------------------

    /// All shares on a secret, expired ones included.
    pub fn shares_for(&self, secret_id: i64) -> Result<Vec<Share>> {
        let sql = format!("SELECT {SHARE_COLUMNS} FROM secret_shares WHERE secret_id = ?1 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([secret_id], share_from_row)?;

        let mut shares = Vec::new();
        for row in rows {
            shares.push(row?);
        }
        Ok(shares)
    }

    pub fn get_share(&self, id: i64) -> Result<Option<Share>> {
        let sql = format!("SELECT {SHARE_COLUMNS} FROM secret_shares WHERE id = ?1");
        let share = self.conn.query_row(&sql, [id], share_from_row).optional()?;
        Ok(share)
    }

    pub fn insert_share(&self, secret_id: i64, new: &NewShare, shared_by_id: i64) -> Result<Share> {
        let (user_id, group_id) = match new.target {
            ShareTarget::User(id) => (Some(id), None),
            ShareTarget::Group(id) => (None, Some(id)),
        };
        self.conn.execute(
            "INSERT INTO secret_shares
                (secret_id, user_id, group_id, permission, shared_by_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                secret_id,
                user_id,
                group_id,
                new.permission.as_str(),
                shared_by_id,
                new.expires_at,
                Utc::now()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_share(id)?
            .ok_or_else(|| VaultError::not_found("share", id))
    }

    /// Remove a share.  Returns whether one existed.
    pub fn delete_share(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM secret_shares WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }
}

/// `%query%` with LIKE wildcards in the query escaped.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn conversion_error(idx: usize, err: VaultError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn secret_from_row(row: &Row<'_>) -> rusqlite::Result<Secret> {
    let category: String = row.get(3)?;
    let category = category
        .parse::<Category>()
        .map_err(|e| conversion_error(3, e))?;

    Ok(Secret {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category,
        owner_id: row.get(4)?,
        folder_id: row.get(5)?,
        tags: Vec::new(),
        username: row.get(6)?,
        password: row.get(7)?,
        url: row.get(8)?,
        notes: row.get(9)?,
        api_key: row.get(10)?,
        extra_data: row.get(11)?,
        url_domain: row.get(12)?,
        is_favorite: row.get(13)?,
        expires_at: row.get(14)?,
        password_last_changed: row.get(15)?,
        rotation_interval_days: row.get(16)?,
        encryption_version: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

fn share_from_row(row: &Row<'_>) -> rusqlite::Result<Share> {
    let user_id: Option<i64> = row.get(2)?;
    let group_id: Option<i64> = row.get(3)?;
    let target = match (user_id, group_id) {
        (Some(id), _) => ShareTarget::User(id),
        (None, Some(id)) => ShareTarget::Group(id),
        (None, None) => {
            return Err(conversion_error(
                2,
                VaultError::Validation("share has no target".into()),
            ))
        }
    };
    let permission: String = row.get(4)?;
    let permission = permission
        .parse::<Permission>()
        .map_err(|e| conversion_error(4, e))?;

    Ok(Share {
        id: row.get(0)?,
        secret_id: row.get(1)?,
        target,
        permission,
        shared_by_id: row.get(5)?,
        expires_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

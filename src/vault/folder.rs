//! Folders group a user's secrets.  Deleting a folder leaves its
//! secrets in place, unfiled.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::{VaultError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

pub struct FolderStore<'c> {
    conn: &'c Connection,
}

impl<'c> FolderStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn create(&self, owner_id: i64, name: &str, parent_id: Option<i64>) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::Validation("folder name cannot be empty".into()));
        }
        if let Some(parent) = parent_id {
            let parent = self.require(parent)?;
            if parent.owner_id != owner_id {
                return Err(VaultError::Validation(
                    "parent folder belongs to another user".into(),
                ));
            }
        }

        self.conn.execute(
            "INSERT INTO folders (name, parent_id, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, parent_id, owner_id, Utc::now()],
        )?;
        self.require(self.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<Folder>> {
        let folder = self
            .conn
            .query_row(
                "SELECT id, name, parent_id, owner_id, created_at FROM folders WHERE id = ?1",
                [id],
                folder_from_row,
            )
            .optional()?;
        Ok(folder)
    }

    pub fn require(&self, id: i64) -> Result<Folder> {
        self.get(id)?
            .ok_or_else(|| VaultError::not_found("folder", id))
    }

    /// Folders owned by `owner_id`, sorted by name.
    pub fn list_for(&self, owner_id: i64) -> Result<Vec<Folder>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, parent_id, owner_id, created_at FROM folders
             WHERE owner_id = ?1 ORDER BY name, id",
        )?;
        let rows = stmt.query_map([owner_id], folder_from_row)?;

        let mut folders = Vec::new();
        for row in rows {
            folders.push(row?);
        }
        Ok(folders)
    }

    /// Delete a folder; its secrets and child folders are detached.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM folders WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }
}

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        owner_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::identity::{NewUser, Role, UserStore};

    #[test]
    fn deleting_folder_unfiles_its_secrets() {
        let db = Database::open_in_memory().unwrap();
        let owner = UserStore::new(db.conn())
            .create(&NewUser::new("owner", Role::User))
            .unwrap();
        let folders = FolderStore::new(db.conn());
        let infra = folders.create(owner.id, " infra ", None).unwrap();
        assert_eq!(infra.name, "infra");

        db.conn()
            .execute(
                "INSERT INTO secrets (name, owner_id, folder_id, created_at) VALUES ('s', ?1, ?2, ?3)",
                params![owner.id, infra.id, Utc::now()],
            )
            .unwrap();

        assert!(folders.delete(infra.id).unwrap());
        let folder_id: Option<i64> = db
            .conn()
            .query_row("SELECT folder_id FROM secrets", [], |row| row.get(0))
            .unwrap();
        assert!(folder_id.is_none());
    }

    #[test]
    fn blank_name_and_missing_parent_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        let owner = UserStore::new(db.conn())
            .create(&NewUser::new("owner", Role::User))
            .unwrap();
        let folders = FolderStore::new(db.conn());

        assert!(matches!(
            folders.create(owner.id, "  ", None),
            Err(VaultError::Validation(_))
        ));
        assert!(matches!(
            folders.create(owner.id, "child", Some(42)),
            Err(VaultError::NotFound { .. })
        ));
        assert!(folders.list_for(owner.id).unwrap().is_empty());
    }
}

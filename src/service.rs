//! Vault service: the only entry point that combines policy, storage
//! and auditing.
//!
//! Every operation follows the same shape: load, gate through
//! `AccessPolicy`, mutate inside a transaction on the main connection,
//! commit, then write one audit entry through the ledger's own
//! connection.  A denial is audited as a failed attempt with the denial
//! reason in the details; not-found and validation errors are not.

use std::path::Path;

use chrono::Utc;

use crate::audit::{AuditAction, AuditEntry, AuditEvent, AuditLedger, AuditQuery};
use crate::config::Settings;
use crate::crypto::Cipher;
use crate::db::Database;
use crate::errors::{Denial, VaultError, Result};
use crate::identity::{self, Directory, Group, NewUser, Role, User, UserStore};
use crate::policy::{AccessMode, AccessPolicy};
use crate::transfer::{ExportDocument, ExportItem};
use crate::vault::{
    Folder, FolderStore, NewSecret, NewShare, RevealedSecret, Secret, SecretFilter, SecretPatch,
    SecretStore, SecretSummary, Share, ShareTarget,
};

/// The acting user plus where the request came from.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub origin: Option<String>,
}

impl Caller {
    pub fn new(user: User) -> Self {
        Self { user, origin: None }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    fn event(&self, action: AuditAction) -> AuditEvent {
        AuditEvent::new(action).actor(&self.user).origin(self.origin())
    }
}

/// Orchestrates every vault operation.
pub struct VaultService {
    db: Database,
    ledger: AuditLedger,
    cipher: Cipher,
}

impl VaultService {
    pub fn new(db: Database, ledger: AuditLedger, cipher: Cipher) -> Self {
        Self { db, ledger, cipher }
    }

    /// Open the vault in `instance_dir`, creating the directory, master
    /// key and database on first use.
    pub fn open(instance_dir: &Path, settings: &Settings) -> Result<Self> {
        std::fs::create_dir_all(instance_dir)?;

        let cipher = Cipher::load_or_create(&settings.key_path(instance_dir))?;
        let db_path = settings.database_path(instance_dir);
        let db = Database::open(&db_path)?;
        let ledger = AuditLedger::open(&db_path)?;

        tracing::debug!(
            instance = %instance_dir.display(),
            key = cipher.fingerprint(),
            "vault opened"
        );
        Ok(Self::new(db, ledger, cipher))
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// Record a denial and turn it into the error returned to the caller.
    fn denied(&self, event: AuditEvent, denial: Denial) -> VaultError {
        tracing::info!(
            action = event.action.as_str(),
            resource_id = ?event.resource_id,
            reason = denial.as_str(),
            "access denied"
        );
        let details = match &event.details {
            Some(extra) => format!("denied: {denial}; {extra}"),
            None => format!("denied: {denial}"),
        };
        self.ledger.log(event.details(details).failed());
        VaultError::AccessDenied(denial)
    }

    // ------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------

    /// Create the first admin of an empty vault.  Audited as a system
    /// action with no actor.
    pub fn bootstrap_admin(&mut self, username: &str) -> Result<User> {
        let users = UserStore::new(self.db.conn());
        if !users.list()?.is_empty() {
            return Err(VaultError::Validation("vault already has users".into()));
        }
        let admin = users.create(&NewUser::new(username, Role::Admin))?;

        self.ledger.log(
            AuditEvent::new(AuditAction::UserCreated)
                .resource("user", admin.id, admin.username.clone())
                .details("bootstrap admin"),
        );
        Ok(admin)
    }

    /// Resolve a local user by name into a caller.
    pub fn caller(&self, username: &str, origin: Option<&str>) -> Result<Caller> {
        let user = UserStore::new(self.db.conn()).require_username(username)?;
        Ok(Caller {
            user,
            origin: origin.map(str::to_string),
        })
    }

    /// Authenticate through `directory` and return the resulting caller.
    pub fn login(
        &self,
        directory: &dyn Directory,
        settings: &Settings,
        username: &str,
        password: &str,
        origin: Option<&str>,
    ) -> Result<Caller> {
        let user = identity::login(
            self.db.conn(),
            &self.ledger,
            directory,
            settings,
            username,
            password,
            origin,
        )?;
        Ok(Caller {
            user,
            origin: origin.map(str::to_string),
        })
    }

    /// Every account.  Readonly callers are refused (not audited).
    pub fn list_users(&self, caller: &Caller) -> Result<Vec<User>> {
        AccessPolicy::now()
            .can_browse_directory(&caller.user)
            .map_err(VaultError::AccessDenied)?;
        UserStore::new(self.db.conn()).list()
    }

    /// Every group.  Same rule as [`Self::list_users`].
    pub fn list_groups(&self, caller: &Caller) -> Result<Vec<Group>> {
        AccessPolicy::now()
            .can_browse_directory(&caller.user)
            .map_err(VaultError::AccessDenied)?;
        UserStore::new(self.db.conn()).list_groups()
    }

    pub fn create_user(&mut self, caller: &Caller, new: &NewUser) -> Result<User> {
        let event = caller.event(AuditAction::UserCreated);
        if let Err(denial) = AccessPolicy::now().require_admin(&caller.user) {
            return Err(self.denied(event.details(new.username.clone()), denial));
        }

        let user = UserStore::new(self.db.conn()).create(new)?;
        self.ledger.log(
            event
                .resource("user", user.id, user.username.clone())
                .details(format!("role={}", user.role)),
        );
        Ok(user)
    }

    pub fn set_role(&mut self, caller: &Caller, user_id: i64, role: Role) -> Result<User> {
        let event = caller.event(AuditAction::RoleChanged);
        if let Err(denial) = AccessPolicy::now().require_admin(&caller.user) {
            return Err(self.denied(event, denial));
        }

        let tx = self.db.transaction()?;
        let users = UserStore::new(&tx);
        let before = users.require(user_id)?;
        users.set_role(user_id, role)?;
        let after = users.require(user_id)?;
        tx.commit()?;

        self.ledger.log(
            event
                .resource("user", after.id, after.username.clone())
                .details(format!("{} -> {}", before.role, after.role)),
        );
        Ok(after)
    }

    pub fn create_group(&mut self, caller: &Caller, name: &str, description: Option<&str>) -> Result<Group> {
        let event = caller.event(AuditAction::GroupCreated);
        if let Err(denial) = AccessPolicy::now().require_admin(&caller.user) {
            return Err(self.denied(event, denial));
        }

        let group = UserStore::new(self.db.conn()).create_group(name, description)?;
        self.ledger
            .log(event.resource("group", group.id, group.name.clone()));
        Ok(group)
    }

    /// Add a user to a group.  Returns whether the membership is new.
    pub fn add_member(&mut self, caller: &Caller, group_id: i64, user_id: i64) -> Result<bool> {
        self.change_membership(caller, group_id, user_id, true)
    }

    /// Remove a user from a group.  Returns whether a membership existed.
    pub fn remove_member(&mut self, caller: &Caller, group_id: i64, user_id: i64) -> Result<bool> {
        self.change_membership(caller, group_id, user_id, false)
    }

    fn change_membership(&mut self, caller: &Caller, group_id: i64, user_id: i64, add: bool) -> Result<bool> {
        let event = caller.event(if add {
            AuditAction::GroupMemberAdded
        } else {
            AuditAction::GroupMemberRemoved
        });
        if let Err(denial) = AccessPolicy::now().require_admin(&caller.user) {
            return Err(self.denied(event, denial));
        }

        let tx = self.db.transaction()?;
        let users = UserStore::new(&tx);
        let group = users.require_group(group_id)?;
        let member = users.require(user_id)?;
        let changed = if add {
            users.add_member(user_id, group_id)?
        } else {
            users.remove_member(user_id, group_id)?
        };
        tx.commit()?;

        if changed {
            self.ledger.log(
                event
                    .resource("group", group.id, group.name)
                    .details(format!("user={}", member.username)),
            );
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Secrets
    // ------------------------------------------------------------------

    pub fn create_secret(&mut self, caller: &Caller, new: &NewSecret) -> Result<Secret> {
        let event = caller.event(AuditAction::SecretCreated);
        if let Err(denial) = AccessPolicy::now().can_create(&caller.user) {
            return Err(self.denied(event.details(new.name.clone()), denial));
        }

        let now = Utc::now();
        let draft = Secret::draft(&self.cipher, caller.user.id, new, now)?;

        let tx = self.db.transaction()?;
        check_folder(&tx, &caller.user, draft.folder_id)?;
        let secret = SecretStore::new(&tx).insert(&draft)?;
        tx.commit()?;

        tracing::debug!(secret_id = secret.id, "secret created");
        self.ledger
            .log(event.resource("secret", secret.id, secret.name.clone()));
        Ok(secret)
    }

    /// Read and decrypt a secret.  Fields that fail to decrypt come back
    /// as `Revealed::Failed`; the read itself still succeeds.
    pub fn read_secret(&self, caller: &Caller, id: i64) -> Result<RevealedSecret> {
        let secret = self.readable(caller, id, AuditAction::SecretViewed)?;
        let revealed = secret.reveal(&self.cipher);

        self.ledger.log(
            caller
                .event(AuditAction::SecretViewed)
                .resource("secret", secret.id, secret.name.clone()),
        );
        Ok(revealed)
    }

    /// Decrypt just the password for copying.  Audited as
    /// `password_copied`.  Unlike `read_secret`, a decryption failure
    /// is an error here since there is nothing else to return.
    pub fn copy_password(&self, caller: &Caller, id: i64) -> Result<Option<String>> {
        let secret = self.readable(caller, id, AuditAction::PasswordCopied)?;
        let password = secret.password().reveal(&self.cipher)?;

        self.ledger.log(
            caller
                .event(AuditAction::PasswordCopied)
                .resource("secret", secret.id, secret.name.clone()),
        );
        Ok(password)
    }

    /// Evaluate the policy without touching anything or auditing.
    pub fn can_access(&self, caller: &Caller, id: i64, mode: AccessMode) -> Result<bool> {
        let store = SecretStore::new(self.db.conn());
        let secret = store.require(id)?;
        let shares = store.shares_for(id)?;
        Ok(AccessPolicy::now().can_access(&caller.user, &secret, &shares, mode))
    }

    pub fn update_secret(&mut self, caller: &Caller, id: i64, patch: &SecretPatch) -> Result<Secret> {
        let policy = AccessPolicy::now();
        let event = caller.event(AuditAction::SecretUpdated);

        let tx = self.db.transaction()?;
        let store = SecretStore::new(&tx);
        let mut secret = store.require(id)?;
        let shares = store.shares_for(id)?;
        if let Err(denial) = policy.evaluate(&caller.user, &secret, &shares, AccessMode::Write) {
            drop(tx);
            let event = event.resource("secret", secret.id, secret.name);
            return Err(self.denied(event, denial));
        }

        secret.apply(&self.cipher, patch, policy.instant())?;
        if patch.folder_id.is_some() {
            check_folder(&tx, &caller.user, secret.folder_id)?;
        }
        store.update(&secret)?;
        let secret = store.require(id)?;
        tx.commit()?;

        self.ledger.log(
            event
                .resource("secret", secret.id, secret.name.clone())
                .details(format!("fields: {}", patch.field_names().join(", "))),
        );
        Ok(secret)
    }

    /// Delete a secret and its shares.  Owner or admin only; the audit
    /// entry keeps the name the secret had before removal.
    pub fn delete_secret(&mut self, caller: &Caller, id: i64) -> Result<()> {
        let event = caller.event(AuditAction::SecretDeleted);

        let tx = self.db.transaction()?;
        let store = SecretStore::new(&tx);
        let secret = store.require(id)?;
        let event = event.resource("secret", secret.id, secret.name.clone());
        if let Err(denial) = AccessPolicy::now().can_manage(&caller.user, secret.owner_id) {
            drop(tx);
            return Err(self.denied(event, denial));
        }

        store.delete(id)?;
        tx.commit()?;

        tracing::debug!(secret_id = id, "secret deleted");
        self.ledger.log(event);
        Ok(())
    }

    /// Secrets the caller may read, filtered.  Admins see everything
    /// unless `shared_only` is set, which limits any caller to secrets
    /// reaching them through an active share.
    pub fn list_secrets(&self, caller: &Caller, filter: &SecretFilter) -> Result<Vec<SecretSummary>> {
        let policy = AccessPolicy::now();
        let user = &caller.user;
        let store = SecretStore::new(self.db.conn());
        let include_all = user.is_admin() && !filter.shared_only;

        let mut summaries = Vec::new();
        for secret in store.candidates(user, include_all, filter)? {
            let visible = if filter.shared_only {
                secret.owner_id != user.id
                    && policy
                        .share_grant(user, secret.id, &store.shares_for(secret.id)?, AccessMode::Read)
                        .is_ok()
            } else if include_all || secret.owner_id == user.id {
                true
            } else {
                policy.can_access(user, &secret, &store.shares_for(secret.id)?, AccessMode::Read)
            };
            if visible {
                summaries.push(SecretSummary::new(&secret, &self.cipher, user.id));
            }
        }
        Ok(summaries)
    }

    /// Flip the favorite flag.  Needs read access; not audited.
    pub fn toggle_favorite(&mut self, caller: &Caller, id: i64) -> Result<bool> {
        let secret = self.readable(caller, id, AuditAction::SecretViewed)?;
        let favorite = !secret.is_favorite;
        SecretStore::new(self.db.conn()).set_favorite(id, favorite)?;
        Ok(favorite)
    }

    /// Load a secret and require read access, auditing a denial as a
    /// failed `action`.
    fn readable(&self, caller: &Caller, id: i64, action: AuditAction) -> Result<Secret> {
        let store = SecretStore::new(self.db.conn());
        let secret = store.require(id)?;
        let shares = store.shares_for(id)?;
        if let Err(denial) =
            AccessPolicy::now().evaluate(&caller.user, &secret, &shares, AccessMode::Read)
        {
            let event = caller
                .event(action)
                .resource("secret", secret.id, secret.name);
            return Err(self.denied(event, denial));
        }
        Ok(secret)
    }

    // ------------------------------------------------------------------
    // Shares
    // ------------------------------------------------------------------

    pub fn share_secret(&mut self, caller: &Caller, secret_id: i64, new: &NewShare) -> Result<Share> {
        let event = caller.event(AuditAction::SecretShared);

        let tx = self.db.transaction()?;
        let store = SecretStore::new(&tx);
        let secret = store.require(secret_id)?;
        let event = event.resource("secret", secret.id, secret.name.clone());
        if let Err(denial) = AccessPolicy::now().can_manage(&caller.user, secret.owner_id) {
            drop(tx);
            return Err(self.denied(event, denial));
        }

        let users = UserStore::new(&tx);
        let target = match new.target {
            ShareTarget::User(id) => {
                let user = users.require(id)?;
                if user.id == secret.owner_id {
                    return Err(VaultError::Validation(
                        "cannot share a secret with its owner".into(),
                    ));
                }
                format!("user={}", user.username)
            }
            ShareTarget::Group(id) => format!("group={}", users.require_group(id)?.name),
        };
        let share = store.insert_share(secret_id, new, caller.user.id)?;
        tx.commit()?;

        let expiry = share
            .expires_at
            .map(|at| format!(", expires={}", at.to_rfc3339()))
            .unwrap_or_default();
        self.ledger.log(event.details(format!(
            "{target}, permission={}{expiry}",
            share.permission
        )));
        Ok(share)
    }

    /// Remove a share from a secret.  A share id that does not belong
    /// to `secret_id` is reported as not found.
    pub fn unshare_secret(&mut self, caller: &Caller, secret_id: i64, share_id: i64) -> Result<()> {
        let event = caller.event(AuditAction::SecretUnshared);

        let tx = self.db.transaction()?;
        let store = SecretStore::new(&tx);
        let secret = store.require(secret_id)?;
        let event = event.resource("secret", secret.id, secret.name.clone());
        if let Err(denial) = AccessPolicy::now().can_manage(&caller.user, secret.owner_id) {
            drop(tx);
            return Err(self.denied(event, denial));
        }

        let share = store
            .get_share(share_id)?
            .filter(|s| s.secret_id == secret_id)
            .ok_or_else(|| VaultError::not_found("share", share_id))?;
        store.delete_share(share.id)?;
        tx.commit()?;

        self.ledger.log(event.details(format!("share={}", share.id)));
        Ok(())
    }

    /// Shares on a secret, expired ones included.  Owner or admin only.
    pub fn list_shares(&self, caller: &Caller, secret_id: i64) -> Result<Vec<Share>> {
        let store = SecretStore::new(self.db.conn());
        let secret = store.require(secret_id)?;
        if let Err(denial) = AccessPolicy::now().can_manage(&caller.user, secret.owner_id) {
            return Err(VaultError::AccessDenied(denial));
        }
        store.shares_for(secret_id)
    }

    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    pub fn create_folder(&mut self, caller: &Caller, name: &str, parent_id: Option<i64>) -> Result<Folder> {
        let event = caller.event(AuditAction::FolderCreated);
        if let Err(denial) = AccessPolicy::now().can_create(&caller.user) {
            return Err(self.denied(event, denial));
        }

        let folder = FolderStore::new(self.db.conn()).create(caller.user.id, name, parent_id)?;
        self.ledger
            .log(event.resource("folder", folder.id, folder.name.clone()));
        Ok(folder)
    }

    /// The caller's own folders.
    pub fn list_folders(&self, caller: &Caller) -> Result<Vec<Folder>> {
        FolderStore::new(self.db.conn()).list_for(caller.user.id)
    }

    pub fn delete_folder(&mut self, caller: &Caller, id: i64) -> Result<()> {
        let event = caller.event(AuditAction::FolderDeleted);

        let tx = self.db.transaction()?;
        let folders = FolderStore::new(&tx);
        let folder = folders.require(id)?;
        let event = event.resource("folder", folder.id, folder.name.clone());
        if let Err(denial) = AccessPolicy::now().can_manage(&caller.user, folder.owner_id) {
            drop(tx);
            return Err(self.denied(event, denial));
        }
        folders.delete(id)?;
        tx.commit()?;

        self.ledger.log(event);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    /// Export every secret the caller can read.
    pub fn export_secrets(&self, caller: &Caller, mask: bool) -> Result<ExportDocument> {
        let summaries = self.list_secrets(caller, &SecretFilter::default())?;
        let store = SecretStore::new(self.db.conn());
        let folders = FolderStore::new(self.db.conn());

        let mut items = Vec::with_capacity(summaries.len());
        for summary in &summaries {
            let secret = store.require(summary.id)?;
            let folder = match secret.folder_id {
                Some(id) => folders.get(id)?.map(|f| f.name),
                None => None,
            };
            items.push(ExportItem::from_revealed(
                &secret.reveal(&self.cipher),
                folder,
                mask,
            ));
        }
        let doc = ExportDocument::new(items);

        let details = if mask {
            format!("count={}, masked", doc.count)
        } else {
            format!("count={}", doc.count)
        };
        self.ledger
            .log(caller.event(AuditAction::SecretsExported).details(details));
        Ok(doc)
    }

    /// Create all `secrets` for the caller in one transaction.  Nothing
    /// is imported if any item is invalid.
    pub fn import_secrets(&mut self, caller: &Caller, secrets: &[NewSecret]) -> Result<Vec<Secret>> {
        let event = caller.event(AuditAction::SecretsImported);
        if let Err(denial) = AccessPolicy::now().can_create(&caller.user) {
            return Err(self.denied(event, denial));
        }

        let now = Utc::now();
        let tx = self.db.transaction()?;
        let store = SecretStore::new(&tx);
        let mut created = Vec::with_capacity(secrets.len());
        for new in secrets {
            let draft = Secret::draft(&self.cipher, caller.user.id, new, now)?;
            check_folder(&tx, &caller.user, draft.folder_id)?;
            created.push(store.insert(&draft)?);
        }
        tx.commit()?;

        tracing::debug!(count = created.len(), "secrets imported");
        self.ledger
            .log(event.details(format!("count={}", created.len())));
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Query the audit ledger.  Admin only.
    pub fn audit_log(&self, caller: &Caller, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        AccessPolicy::now()
            .require_admin(&caller.user)
            .map_err(VaultError::AccessDenied)?;
        self.ledger.query(query)
    }
}

/// A secret may only be filed into a folder owned by its actor
/// (admins may use any folder).
fn check_folder(conn: &rusqlite::Connection, actor: &User, folder_id: Option<i64>) -> Result<()> {
    let Some(id) = folder_id else {
        return Ok(());
    };
    let folder = FolderStore::new(conn)
        .get(id)?
        .ok_or_else(|| VaultError::Validation(format!("folder {id} does not exist")))?;
    if folder.owner_id != actor.id && !actor.is_admin() {
        return Err(VaultError::Validation(format!(
            "folder {id} belongs to another user"
        )));
    }
    Ok(())
}

//! Login through an external directory service.
//!
//! The directory only answers "who is this and which groups are they
//! in"; the account record, lockout policy and role mapping are local.

use chrono::Utc;
use rusqlite::Connection;

use super::store::ProfileSync;
use super::{NewUser, Role, RoleMapping, User, UserStore};
use crate::audit::{AuditAction, AuditEvent, AuditLedger};
use crate::config::Settings;
use crate::errors::{VaultError, Result};

/// Identity claims returned by the directory for a successful bind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryClaims {
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    /// Distinguished identity reference (e.g. an LDAP DN).
    pub dn: Option<String>,
    /// Group identifiers the user belongs to.
    pub groups: Vec<String>,
}

/// The authentication oracle.
pub trait Directory {
    /// Check credentials; `Ok(None)` means the credentials were rejected.
    ///
    /// `Err` is reserved for the directory itself being unreachable.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<DirectoryClaims>>;
}

/// Authenticate `username` against `directory` and upsert the local account.
///
/// Locked accounts are refused without consulting the directory.  A
/// rejected password counts toward the lockout threshold and is audited
/// as `login_failed`; success resets the counter, syncs directory
/// attributes, maps directory groups to a role and is audited as `login`.
pub fn login(
    conn: &Connection,
    ledger: &AuditLedger,
    directory: &dyn Directory,
    settings: &Settings,
    username: &str,
    password: &str,
    origin: Option<&str>,
) -> Result<User> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(VaultError::Validation(
            "username and password are required".into(),
        ));
    }

    let store = UserStore::new(conn);
    let now = Utc::now();
    let existing = store.find_by_username(username)?;

    if existing.as_ref().is_some_and(|u| u.is_locked(now)) {
        return Err(VaultError::AccountLocked);
    }

    let Some(claims) = directory.authenticate(username, password)? else {
        if let Some(user) = &existing {
            store.record_failed_login(
                user.id,
                settings.max_login_attempts,
                settings.lockout_duration(),
                now,
            )?;
        }
        ledger.log(
            AuditEvent::new(AuditAction::LoginFailed)
                .actor_name(username)
                .origin(origin)
                .failed(),
        );
        return Err(VaultError::AuthenticationFailed);
    };

    let user = match existing {
        Some(user) => user,
        None => {
            let canonical = if claims.username.trim().is_empty() {
                username
            } else {
                claims.username.trim()
            };
            let mut new = NewUser::new(canonical, Role::User);
            new.full_name = full_name(&claims, canonical);
            store.create(&new)?
        }
    };

    let role = resolve_role(&settings.role_mapping(), &claims, &user);
    let full_name = full_name(&claims, &user.username);
    let profile = ProfileSync {
        email: claims.email.as_deref(),
        full_name: &full_name,
        display_name: claims.display_name.as_deref(),
        department: claims.department.as_deref(),
        title: claims.title.as_deref(),
        directory_dn: claims.dn.as_deref(),
    };
    let user = store.record_login(user.id, &profile, role, origin, now)?;

    ledger.log(AuditEvent::new(AuditAction::Login).actor(&user).origin(origin));
    Ok(user)
}

/// Mapped role, or the account's current role when no tier matches.
/// New accounts start as `user`, so they keep that default.
fn resolve_role(mapping: &RoleMapping, claims: &DirectoryClaims, user: &User) -> Role {
    mapping.resolve(&claims.groups).unwrap_or(user.role)
}

fn full_name(claims: &DirectoryClaims, fallback: &str) -> String {
    claims
        .full_name
        .as_deref()
        .or(claims.display_name.as_deref())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}

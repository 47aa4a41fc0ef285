//! Local identities: users, roles, groups, and the mapping from
//! directory-service claims to local roles.
//!
//! Authentication itself is delegated to a `Directory` (see `login`);
//! everything about authorization lives here and in `policy`.

pub mod login;
pub mod store;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::errors::VaultError;

pub use login::{login, Directory, DirectoryClaims};
pub use store::UserStore;

/// Local role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
    Readonly,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Readonly => "readonly",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "readonly" => Ok(Role::Readonly),
            other => Err(VaultError::Validation(format!(
                "unknown role '{other}' (expected admin, user or readonly)"
            ))),
        }
    }
}

/// A local user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub full_name: String,
    pub display_name: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub role: Role,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub directory_dn: Option<String>,
    /// Ids of the local groups this user belongs to.
    pub group_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_readonly(&self) -> bool {
        self.role == Role::Readonly
    }

    /// Whether the role allows any write at all.
    pub fn can_write(&self) -> bool {
        matches!(self.role, Role::Admin | Role::User)
    }

    /// Locked until a point strictly after `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    pub fn in_group(&self, group_id: i64) -> bool {
        self.group_ids.contains(&group_id)
    }
}

/// Input for creating a local user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
}

impl NewUser {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        let username = username.into();
        Self {
            full_name: username.clone(),
            username,
            email: None,
            role,
        }
    }
}

/// A local group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub directory_dn: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Maps directory group identifiers to a local role.
///
/// Tiers are checked in order (admin, user, readonly); the first tier
/// containing any of the user's groups wins.
#[derive(Debug, Clone, Default)]
pub struct RoleMapping {
    tiers: Vec<(Role, Vec<String>)>,
}

impl RoleMapping {
    /// Build a mapping; group names are trimmed and blanks dropped.
    pub fn new<'a>(tiers: impl IntoIterator<Item = (Role, &'a [String])>) -> Self {
        let tiers = tiers
            .into_iter()
            .map(|(role, groups)| {
                let groups = groups
                    .iter()
                    .map(|g| g.trim().to_string())
                    .filter(|g| !g.is_empty())
                    .collect();
                (role, groups)
            })
            .collect();
        Self { tiers }
    }

    /// Resolve a role for the given directory groups, if any tier matches.
    pub fn resolve(&self, groups: &[String]) -> Option<Role> {
        self.tiers.iter().find_map(|(role, tier)| {
            groups
                .iter()
                .any(|g| tier.iter().any(|t| t == g.trim()))
                .then_some(*role)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn role_parses_and_displays() {
        for role in [Role::Admin, Role::User, Role::Readonly] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn admin_tier_wins_over_user_tier() {
        let admins = strings(&["CN=Admins"]);
        let users = strings(&["CN=Staff"]);
        let readonly = strings(&["CN=Auditors"]);
        let mapping = RoleMapping::new([
            (Role::Admin, admins.as_slice()),
            (Role::User, users.as_slice()),
            (Role::Readonly, readonly.as_slice()),
        ]);

        let groups = strings(&["CN=Auditors", "CN=Staff", "CN=Admins"]);
        assert_eq!(mapping.resolve(&groups), Some(Role::Admin));
        assert_eq!(
            mapping.resolve(&strings(&["CN=Auditors", "CN=Staff"])),
            Some(Role::User)
        );
        assert_eq!(mapping.resolve(&strings(&["CN=Other"])), None);
    }

    #[test]
    fn blank_group_entries_never_match() {
        let admins = strings(&["", "  "]);
        let mapping = RoleMapping::new([(Role::Admin, admins.as_slice())]);
        assert_eq!(mapping.resolve(&strings(&[""])), None);
    }

    #[test]
    fn lock_expiry_is_exclusive() {
        let now = Utc::now();
        let mut user = User {
            id: 1,
            username: "u".into(),
            email: None,
            full_name: "u".into(),
            display_name: None,
            department: None,
            title: None,
            role: Role::User,
            failed_login_attempts: 0,
            locked_until: Some(now),
            last_login_at: None,
            last_login_ip: None,
            directory_dn: None,
            group_ids: vec![],
            created_at: now,
        };
        assert!(!user.is_locked(now));
        user.locked_until = Some(now + chrono::Duration::minutes(1));
        assert!(user.is_locked(now));
    }
}

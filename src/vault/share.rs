//! Share grants on a secret.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::errors::VaultError;
use crate::identity::User;

/// What a share lets its target do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            other => Err(VaultError::Validation(format!(
                "unknown permission '{other}' (expected read or write)"
            ))),
        }
    }
}

/// Who a share is granted to.  Exactly one of user or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareTarget {
    User(i64),
    Group(i64),
}

impl ShareTarget {
    /// Whether `user` is the target, directly or through a group.
    pub fn includes(&self, user: &User) -> bool {
        match *self {
            ShareTarget::User(id) => id == user.id,
            ShareTarget::Group(id) => user.in_group(id),
        }
    }
}

/// A persisted share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub id: i64,
    pub secret_id: i64,
    pub target: ShareTarget,
    pub permission: Permission,
    pub shared_by_id: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Share {
    /// A share is active while it has no expiry or its expiry is
    /// strictly after `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }

    /// Active and targeting `user`.
    pub fn grants(&self, user: &User, now: DateTime<Utc>) -> bool {
        self.is_active(now) && self.target.includes(user)
    }
}

/// Input for granting a share.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub target: ShareTarget,
    pub permission: Permission,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewShare {
    pub fn new(target: ShareTarget, permission: Permission) -> Self {
        Self {
            target,
            permission,
            expires_at: None,
        }
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use chrono::Duration;

    fn user(id: i64, groups: Vec<i64>) -> User {
        User {
            id,
            username: format!("u{id}"),
            email: None,
            full_name: format!("u{id}"),
            display_name: None,
            department: None,
            title: None,
            role: Role::User,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            last_login_ip: None,
            directory_dn: None,
            group_ids: groups,
            created_at: Utc::now(),
        }
    }

    fn share(target: ShareTarget, expires_at: Option<DateTime<Utc>>) -> Share {
        Share {
            id: 1,
            secret_id: 1,
            target,
            permission: Permission::Read,
            shared_by_id: 1,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn expiry_equal_to_now_is_inactive() {
        let now = Utc::now();
        assert!(share(ShareTarget::User(2), None).is_active(now));
        assert!(!share(ShareTarget::User(2), Some(now)).is_active(now));
        assert!(share(ShareTarget::User(2), Some(now + Duration::seconds(1))).is_active(now));
    }

    #[test]
    fn group_share_reaches_members_only() {
        let now = Utc::now();
        let s = share(ShareTarget::Group(7), None);
        assert!(s.grants(&user(2, vec![7]), now));
        assert!(!s.grants(&user(3, vec![8]), now));
    }

    #[test]
    fn permission_parses() {
        assert_eq!("write".parse::<Permission>().unwrap(), Permission::Write);
        assert!("admin".parse::<Permission>().is_err());
    }
}

//! Access policy: who may read or write a secret.
//!
//! Pure functions over an actor, a secret and its shares.  Evaluation
//! order is fixed:
//!
//! 1. admins pass everything;
//! 2. a `readonly` actor never passes a write check;
//! 3. owners pass read and write;
//! 4. otherwise an active share reaching the actor (directly or through
//!    a group) is required, and a write needs a `write` share.  Any one
//!    qualifying share is enough.
//!
//! Management (delete, share, unshare) is a separate owner-or-admin
//! check that shares never satisfy.

use chrono::{DateTime, Utc};

use crate::errors::Denial;
use crate::identity::User;
use crate::vault::{Permission, Secret, Share};

/// Requested access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        }
    }
}

/// Why access was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Admin,
    Owner,
    /// Through the share with this id.
    Share(i64),
}

pub type Decision = std::result::Result<Grant, Denial>;

/// Policy evaluated at a fixed instant, so share expiry is decided
/// consistently across one operation.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    now: DateTime<Utc>,
}

impl AccessPolicy {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.now
    }

    /// Decide whether `actor` may access `secret` in `mode`, given all
    /// of the secret's shares (expired ones are ignored here).
    pub fn evaluate(&self, actor: &User, secret: &Secret, shares: &[Share], mode: AccessMode) -> Decision {
        if actor.is_admin() {
            return Ok(Grant::Admin);
        }
        if mode == AccessMode::Write && actor.is_readonly() {
            return Err(Denial::ReadOnlyRole);
        }
        if actor.id == secret.owner_id {
            return Ok(Grant::Owner);
        }
        self.share_grant(actor, secret.id, shares, mode)
    }

    pub fn can_access(&self, actor: &User, secret: &Secret, shares: &[Share], mode: AccessMode) -> bool {
        self.evaluate(actor, secret, shares, mode).is_ok()
    }

    /// Access through shares alone, ignoring role and ownership.
    pub fn share_grant(&self, actor: &User, secret_id: i64, shares: &[Share], mode: AccessMode) -> Decision {
        let mut reachable = false;
        for share in shares
            .iter()
            .filter(|s| s.secret_id == secret_id && s.grants(actor, self.now))
        {
            if mode == AccessMode::Read || share.permission == Permission::Write {
                return Ok(Grant::Share(share.id));
            }
            reachable = true;
        }
        Err(if reachable {
            Denial::ReadOnlyShare
        } else {
            Denial::NoActiveShare
        })
    }

    /// Owner-or-admin check for delete, share and unshare.
    pub fn can_manage(&self, actor: &User, owner_id: i64) -> Decision {
        if actor.is_admin() {
            return Ok(Grant::Admin);
        }
        if actor.is_readonly() {
            return Err(Denial::ReadOnlyRole);
        }
        if actor.id == owner_id {
            return Ok(Grant::Owner);
        }
        Err(Denial::NotOwner)
    }

    /// Whether the actor's role allows creating new records.
    pub fn can_create(&self, actor: &User) -> std::result::Result<(), Denial> {
        if actor.can_write() {
            Ok(())
        } else {
            Err(Denial::ReadOnlyRole)
        }
    }

    /// Listing users and groups.  Only roles that can share need the
    /// directory, so readonly actors are refused.
    pub fn can_browse_directory(&self, actor: &User) -> std::result::Result<(), Denial> {
        self.can_create(actor)
    }

    /// Role and group administration.
    pub fn require_admin(&self, actor: &User) -> std::result::Result<(), Denial> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(Denial::AdminOnly)
        }
    }
}

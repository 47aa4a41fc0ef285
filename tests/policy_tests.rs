//! Access-policy matrix: read access holds exactly when the actor is an
//! admin, owns the secret, or is reached by an active share.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use keyvault::crypto::{Cipher, MasterKey};
use keyvault::errors::Denial;
use keyvault::identity::{Role, User};
use keyvault::policy::{AccessMode, AccessPolicy};
use keyvault::vault::{NewSecret, Permission, Secret, Share, ShareTarget};

const SECRET_ID: i64 = 10;
const OWNER_ID: i64 = 2;
const ACTOR_GROUP: i64 = 7;

fn user(id: i64, role: Role) -> User {
    User {
        id,
        username: format!("user{id}"),
        email: None,
        full_name: format!("User {id}"),
        display_name: None,
        department: None,
        title: None,
        role,
        failed_login_attempts: 0,
        locked_until: None,
        last_login_at: None,
        last_login_ip: None,
        directory_dn: None,
        group_ids: vec![ACTOR_GROUP],
        created_at: Utc::now(),
    }
}

fn secret() -> Secret {
    let cipher = Cipher::new(&MasterKey::generate());
    let mut secret = Secret::draft(&cipher, OWNER_ID, &NewSecret::new("db"), Utc::now()).unwrap();
    secret.id = SECRET_ID;
    secret
}

fn share(target: ShareTarget, permission: Permission, expires_at: Option<DateTime<Utc>>) -> Share {
    Share {
        id: 1,
        secret_id: SECRET_ID,
        target,
        permission,
        shared_by_id: OWNER_ID,
        expires_at,
        created_at: Utc::now(),
    }
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::User), Just(Role::Readonly)]
}

proptest! {
    #[test]
    fn read_access_matches_the_rule(
        role in role_strategy(),
        owns in any::<bool>(),
        has_share in any::<bool>(),
        via_group in any::<bool>(),
        write_share in any::<bool>(),
        // Minutes relative to now; None means no expiry.
        expiry in proptest::option::of(-120i64..120),
    ) {
        let now = Utc::now();
        let policy = AccessPolicy::at(now);
        let actor = user(if owns { OWNER_ID } else { 3 }, role);

        let target = if via_group {
            ShareTarget::Group(ACTOR_GROUP)
        } else {
            ShareTarget::User(actor.id)
        };
        let permission = if write_share { Permission::Write } else { Permission::Read };
        let expires_at = expiry.map(|m| now + Duration::minutes(m));
        let shares: Vec<Share> = if has_share {
            vec![share(target, permission, expires_at)]
        } else {
            Vec::new()
        };

        let active_share = has_share && expires_at.map_or(true, |at| at > now);
        let expected = role == Role::Admin || owns || active_share;

        prop_assert_eq!(
            policy.can_access(&actor, &secret(), &shares, AccessMode::Read),
            expected
        );
    }

    #[test]
    fn read_share_never_satisfies_write(role in prop_oneof![Just(Role::User), Just(Role::Readonly)]) {
        let policy = AccessPolicy::now();
        let actor = user(3, role);
        let shares = [share(ShareTarget::User(3), Permission::Read, None)];
        prop_assert!(!policy.can_access(&actor, &secret(), &shares, AccessMode::Write));
    }
}

#[test]
fn expiry_exactly_now_is_expired() {
    let now = Utc::now();
    let policy = AccessPolicy::at(now);
    let actor = user(3, Role::User);
    let shares = [share(ShareTarget::User(3), Permission::Write, Some(now))];
    assert_eq!(
        policy.evaluate(&actor, &secret(), &shares, AccessMode::Read),
        Err(Denial::NoActiveShare)
    );
}

#[test]
fn expired_write_share_does_not_mask_active_read_share() {
    let now = Utc::now();
    let policy = AccessPolicy::at(now);
    let actor = user(3, Role::User);
    let shares = [
        share(ShareTarget::User(3), Permission::Write, Some(now - Duration::hours(1))),
        share(ShareTarget::Group(ACTOR_GROUP), Permission::Read, None),
    ];
    assert!(policy.can_access(&actor, &secret(), &shares, AccessMode::Read));
    assert_eq!(
        policy.evaluate(&actor, &secret(), &shares, AccessMode::Write),
        Err(Denial::ReadOnlyShare)
    );
}

#[test]
fn readonly_role_beats_write_share_and_ownership() {
    let policy = AccessPolicy::now();
    let owner = user(OWNER_ID, Role::Readonly);
    let shares = [share(ShareTarget::User(OWNER_ID), Permission::Write, None)];
    assert_eq!(
        policy.evaluate(&owner, &secret(), &shares, AccessMode::Write),
        Err(Denial::ReadOnlyRole)
    );
    assert_eq!(policy.can_manage(&owner, OWNER_ID), Err(Denial::ReadOnlyRole));
}

//! `keyvault share`, `unshare` and `shares`: manage who else can reach
//! a secret.

use chrono::Utc;

use crate::cli::output;
use crate::cli::{hide_existence, open_as_caller, parse_datetime, Cli};
use crate::errors::{VaultError, Result};
use crate::identity::UserStore;
use crate::vault::{NewShare, Permission, ShareTarget};

/// Execute the `share` command.
pub fn execute_share(
    cli: &Cli,
    id: i64,
    user: Option<&str>,
    group: Option<&str>,
    write: bool,
    expires: Option<&str>,
) -> Result<()> {
    let (mut service, caller) = open_as_caller(cli)?;

    let (target, label) = {
        let users = UserStore::new(service.database().conn());
        match (user, group) {
            (Some(name), None) => (
                ShareTarget::User(users.require_username(name)?.id),
                format!("user '{name}'"),
            ),
            (None, Some(name)) => {
                let found = users
                    .find_group(name)?
                    .ok_or_else(|| VaultError::not_found("group", name))?;
                (ShareTarget::Group(found.id), format!("group '{name}'"))
            }
            _ => {
                return Err(VaultError::Validation(
                    "pass exactly one of --user or --group".into(),
                ))
            }
        }
    };

    let permission = if write {
        Permission::Write
    } else {
        Permission::Read
    };
    let mut new = NewShare::new(target, permission);
    if let Some(at) = expires {
        new = new.expires_at(parse_datetime(at)?);
    }

    let share = service
        .share_secret(&caller, id, &new)
        .map_err(|e| hide_existence(e, "secret", id))?;
    output::success(&format!(
        "Shared secret {id} with {label} ({}, share id {})",
        share.permission, share.id
    ));
    if !share.is_active(Utc::now()) {
        output::warning("The share's expiry is already past; it grants no access.");
    }
    Ok(())
}

/// Execute the `unshare` command.
pub fn execute_unshare(cli: &Cli, id: i64, share_id: i64) -> Result<()> {
    let (mut service, caller) = open_as_caller(cli)?;
    service
        .unshare_secret(&caller, id, share_id)
        .map_err(|e| hide_existence(e, "secret", id))?;
    output::success(&format!("Removed share {share_id} from secret {id}"));
    Ok(())
}

/// Execute the `shares` command.
pub fn execute_list(cli: &Cli, id: i64) -> Result<()> {
    let (service, caller) = open_as_caller(cli)?;
    let shares = service
        .list_shares(&caller, id)
        .map_err(|e| hide_existence(e, "secret", id))?;
    let users = service.list_users(&caller)?;
    let groups = service.list_groups(&caller)?;
    output::print_shares_table(&shares, &users, &groups);
    Ok(())
}

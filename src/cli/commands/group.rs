//! `keyvault group`: add and list groups, manage membership.

use crate::cli::output;
use crate::cli::{open_as_caller, Cli, GroupAction};
use crate::errors::{VaultError, Result};
use crate::identity::UserStore;

/// Execute a `group` subcommand.
pub fn execute(cli: &Cli, action: &GroupAction) -> Result<()> {
    let (mut service, caller) = open_as_caller(cli)?;

    match action {
        GroupAction::Add { name, description } => {
            let group = service.create_group(&caller, name, description.as_deref())?;
            output::success(&format!("Created group '{}' (id {})", group.name, group.id));
        }
        GroupAction::List => {
            output::print_groups_table(&service.list_groups(&caller)?);
        }
        GroupAction::Member {
            group,
            username,
            remove,
        } => {
            let (group_id, user_id) = {
                let users = UserStore::new(service.database().conn());
                let found = users
                    .find_group(group)?
                    .ok_or_else(|| VaultError::not_found("group", group))?;
                (found.id, users.require_username(username)?.id)
            };

            if *remove {
                if service.remove_member(&caller, group_id, user_id)? {
                    output::success(&format!("Removed '{username}' from '{group}'"));
                } else {
                    output::info(&format!("'{username}' was not a member of '{group}'"));
                }
            } else if service.add_member(&caller, group_id, user_id)? {
                output::success(&format!("Added '{username}' to '{group}'"));
            } else {
                output::info(&format!("'{username}' is already a member of '{group}'"));
            }
        }
    }
    Ok(())
}

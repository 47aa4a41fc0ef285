//! `keyvault user`: add, list and re-role local users.

use crate::cli::output;
use crate::cli::{open_as_caller, Cli, UserAction};
use crate::errors::Result;
use crate::identity::{NewUser, Role, UserStore};

/// Execute a `user` subcommand.
pub fn execute(cli: &Cli, action: &UserAction) -> Result<()> {
    let (mut service, caller) = open_as_caller(cli)?;

    match action {
        UserAction::Add {
            username,
            role,
            full_name,
            email,
        } => {
            let role: Role = role.parse()?;
            let mut new = NewUser::new(username.as_str(), role);
            if let Some(name) = full_name {
                new.full_name = name.clone();
            }
            new.email = email.clone();

            let user = service.create_user(&caller, &new)?;
            output::success(&format!("Created user '{}' ({})", user.username, user.role));
        }
        UserAction::List => {
            let users = service.list_users(&caller)?;
            let groups = service.list_groups(&caller)?;
            output::print_users_table(&users, &groups);
        }
        UserAction::Role { username, role } => {
            let role: Role = role.parse()?;
            let target = UserStore::new(service.database().conn()).require_username(username)?;
            let user = service.set_role(&caller, target.id, role)?;
            output::success(&format!("'{}' is now {}", user.username, user.role));
        }
    }
    Ok(())
}

//! `keyvault delete`: remove a secret and its shares.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{hide_existence, open_as_caller, Cli};
use crate::errors::{VaultError, Result};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, id: i64, force: bool) -> Result<()> {
    let (mut service, caller) = open_as_caller(cli)?;

    // Prompt for confirmation unless --force is set.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete secret {id} and all of its shares?"))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    service
        .delete_secret(&caller, id)
        .map_err(|e| hide_existence(e, "secret", id))?;

    output::success(&format!("Deleted secret {id}"));
    Ok(())
}

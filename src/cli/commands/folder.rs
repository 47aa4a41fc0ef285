//! `keyvault folder`: manage the acting user's folders.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{hide_existence, open_as_caller, Cli, FolderAction};
use crate::errors::{VaultError, Result};

/// Execute a `folder` subcommand.
pub fn execute(cli: &Cli, action: &FolderAction) -> Result<()> {
    let (mut service, caller) = open_as_caller(cli)?;

    match action {
        FolderAction::Add { name, parent } => {
            let folder = service.create_folder(&caller, name, *parent)?;
            output::success(&format!("Created folder '{}' (id {})", folder.name, folder.id));
        }
        FolderAction::List => {
            output::print_folders_table(&service.list_folders(&caller)?);
        }
        FolderAction::Delete { id, force } => {
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Delete folder {id}? Secrets in it become unfiled."
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;
                if !confirmed {
                    output::info("Cancelled.");
                    return Ok(());
                }
            }
            service
                .delete_folder(&caller, *id)
                .map_err(|e| hide_existence(e, "folder", *id))?;
            output::success(&format!("Deleted folder {id}"));
        }
    }
    Ok(())
}

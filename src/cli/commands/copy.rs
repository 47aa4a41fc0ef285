//! `keyvault copy`: put a secret's password on the clipboard.

use crate::cli::output;
use crate::cli::{hide_existence, open_as_caller, Cli};
use crate::errors::{VaultError, Result};

/// Execute the `copy` command.
pub fn execute(cli: &Cli, id: i64) -> Result<()> {
    let (service, caller) = open_as_caller(cli)?;
    let password = service
        .copy_password(&caller, id)
        .map_err(|e| hide_existence(e, "secret", id))?;

    let Some(password) = password else {
        output::warning(&format!("Secret {id} has no password."));
        return Ok(());
    };

    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| VaultError::CommandFailed(format!("clipboard unavailable: {e}")))?;
    clipboard
        .set_text(password)
        .map_err(|e| VaultError::CommandFailed(format!("failed to copy: {e}")))?;

    output::success(&format!("Password for secret {id} copied to clipboard"));
    Ok(())
}

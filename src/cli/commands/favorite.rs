//! `keyvault favorite`: toggle a secret's favorite flag.

use crate::cli::output;
use crate::cli::{hide_existence, open_as_caller, Cli};
use crate::errors::Result;

/// Execute the `favorite` command.
pub fn execute(cli: &Cli, id: i64) -> Result<()> {
    let (mut service, caller) = open_as_caller(cli)?;
    let favorite = service
        .toggle_favorite(&caller, id)
        .map_err(|e| hide_existence(e, "secret", id))?;

    if favorite {
        output::success(&format!("Secret {id} marked as favorite"));
    } else {
        output::success(&format!("Secret {id} removed from favorites"));
    }
    Ok(())
}

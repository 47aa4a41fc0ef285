//! `keyvault list`: show the secrets the acting user can read.

use crate::cli::output;
use crate::cli::{open_as_caller, Cli};
use crate::errors::Result;
use crate::vault::{Category, SecretFilter};

/// Execute the `list` command.
pub fn execute(
    cli: &Cli,
    folder: Option<i64>,
    category: Option<&str>,
    search: Option<&str>,
    favorites: bool,
    shared: bool,
) -> Result<()> {
    let filter = SecretFilter {
        folder_id: folder,
        category: category.map(str::parse::<Category>).transpose()?,
        search: search.map(str::to_string),
        favorites_only: favorites,
        shared_only: shared,
    };

    let (service, caller) = open_as_caller(cli)?;
    let secrets = service.list_secrets(&caller, &filter)?;
    output::print_secrets_table(&secrets);
    Ok(())
}

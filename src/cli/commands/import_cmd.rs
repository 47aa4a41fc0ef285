//! `keyvault import`: create secrets from a JSON export or a
//! password-manager CSV.  All rows are imported or none are.

use std::fs;
use std::path::Path;

use crate::cli::output;
use crate::cli::{open_as_caller, Cli};
use crate::errors::{VaultError, Result};
use crate::transfer::{self, Format};

/// Execute the `import` command.
pub fn execute(cli: &Cli, file_path: &str, format: Option<&str>) -> Result<()> {
    let source = Path::new(file_path);
    if !source.exists() {
        return Err(VaultError::CommandFailed(format!(
            "import file not found: {}",
            source.display()
        )));
    }

    // Detect format from flag or file extension.
    let format = match format {
        Some(f) => f.parse()?,
        None => Format::from_extension(source),
    };
    let content = fs::read_to_string(source)?;
    let secrets = transfer::parse_import(&content, format)?;

    if secrets.is_empty() {
        output::warning("No secrets found in the import file.");
        return Ok(());
    }

    let (mut service, caller) = open_as_caller(cli)?;
    let created = service.import_secrets(&caller, &secrets)?;
    for secret in &created {
        output::info(&format!("  + {} (id {})", secret.name, secret.id));
    }

    output::success(&format!(
        "Imported {} secrets from {}",
        created.len(),
        source.display()
    ));
    Ok(())
}

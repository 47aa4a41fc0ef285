//! `keyvault export`: export the secrets the acting user can read.
//!
//! Supported formats:
//! - `json` (default): versioned document with every field
//! - `csv`: summary rows (name, category, username, URL, tags, created);
//!   passwords are never written

use std::fs;
use std::path::Path;

use crate::cli::output;
use crate::cli::{open_as_caller, Cli};
use crate::errors::{VaultError, Result};
use crate::transfer::Format;

/// Execute the `export` command.
pub fn execute(cli: &Cli, format: &str, output_path: Option<&str>, mask: bool) -> Result<()> {
    let format: Format = format.parse()?;
    let (service, caller) = open_as_caller(cli)?;

    let doc = service.export_secrets(&caller, mask)?;
    let content = match format {
        Format::Json => doc.to_json()?,
        Format::Csv => doc.to_csv()?,
    };

    match output_path {
        Some(dest) => {
            // Refuse to clobber the instance database.
            if Path::new(dest)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("db"))
            {
                return Err(VaultError::CommandFailed(
                    "refusing to export over a .db file".into(),
                ));
            }

            fs::write(dest, &content).map_err(|e| {
                VaultError::CommandFailed(format!("failed to write export file: {e}"))
            })?;

            output::success(&format!(
                "Exported {} secrets to {dest} (format: {format})",
                doc.count
            ));
            if !mask && format == Format::Json {
                output::warning("The export contains plaintext secrets. Store it securely.");
            }
        }
        None => {
            // Raw output only, so it can be piped.
            print!("{content}");
        }
    }

    Ok(())
}

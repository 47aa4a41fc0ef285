//! `keyvault init`: create the instance directory, master key, database
//! and the first admin.

use std::fs;

use crate::cli::output;
use crate::cli::{instance_dir, open_vault, Cli};
use crate::config::Settings;
use crate::errors::{VaultError, Result};

/// Execute the `init` command.
pub fn execute(cli: &Cli, admin: &str) -> Result<()> {
    let dir = instance_dir(cli)?;
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
        output::info(&format!("Created instance directory: {}", dir.display()));
    }

    // 1. Write a default config the operator can edit later.
    let config_path = dir.join(Settings::FILE_NAME);
    if !config_path.exists() {
        let contents = toml::to_string_pretty(&Settings::default())
            .map_err(|e| VaultError::ConfigError(format!("failed to render config: {e}")))?;
        fs::write(&config_path, contents)?;
    }

    // 2. Open (creating key and schema on first use).
    let (settings, mut service) = open_vault(cli)?;

    // 3. Bootstrap the admin account.
    let user = service.bootstrap_admin(admin).map_err(|e| match e {
        VaultError::Validation(_) => {
            output::tip("Use `keyvault user add` to add more users.");
            VaultError::CommandFailed(format!("instance at {} is already initialized", dir.display()))
        }
        other => other,
    })?;

    output::success(&format!(
        "Instance initialized at {} with admin '{}'",
        dir.display(),
        user.username
    ));
    output::info(&format!(
        "Master key: {} (fingerprint {})",
        settings.key_path(&dir).display(),
        service.cipher().fingerprint()
    ));
    output::warning("Back up the master key file. Without it no secret can be decrypted.");
    output::tip(&format!("Run `keyvault --as {} add --name <NAME>` to store a secret.", user.username));
    Ok(())
}

//! `keyvault show`: display a secret, masking sensitive fields unless
//! `--reveal` is given.

use chrono::Utc;
use console::style;

use crate::cli::output::{self, format_time};
use crate::cli::{hide_existence, open_as_caller, Cli};
use crate::crypto::Revealed;
use crate::errors::Result;
use crate::vault::RevealedSecret;

/// Execute the `show` command.
pub fn execute(cli: &Cli, id: i64, reveal: bool) -> Result<()> {
    let (service, caller) = open_as_caller(cli)?;
    let secret = service
        .read_secret(&caller, id)
        .map_err(|e| hide_existence(e, "secret", id))?;

    print_secret(&secret, reveal);
    Ok(())
}

fn print_secret(secret: &RevealedSecret, reveal: bool) {
    println!("{} {}", style(&secret.name).bold(), style(format!("(id {})", secret.id)).dim());

    field("Category", Some(secret.category.as_str()));
    field("Description", secret.description.as_deref());
    field("Username", plain(&secret.username));
    field("Password", sensitive(&secret.password, reveal).as_deref());
    field("URL", plain(&secret.url));
    field("API key", sensitive(&secret.api_key, reveal).as_deref());
    field("Notes", sensitive(&secret.notes, reveal).as_deref());
    if !secret.tags.is_empty() {
        field("Tags", Some(&secret.tags.join(", ")));
    }
    if let Some(folder) = secret.folder_id {
        field("Folder", Some(&folder.to_string()));
    }
    if let Some(days) = secret.rotation_interval_days {
        let last = secret
            .password_last_changed
            .map(format_time)
            .unwrap_or_else(|| "never".into());
        field("Rotation", Some(&format!("every {days} days (last changed {last})")));
    }
    field("Created", Some(&format_time(secret.created_at)));
    if let Some(updated) = secret.updated_at {
        field("Updated", Some(&format_time(updated)));
    }

    if let Some(expires) = secret.expires_at {
        if expires <= Utc::now() {
            output::warning(&format!("This secret expired on {}", format_time(expires)));
        } else {
            field("Expires", Some(&format_time(expires)));
        }
    }
    let failed = [&secret.username, &secret.password, &secret.url, &secret.notes, &secret.api_key]
        .iter()
        .any(|f| f.is_failed());
    if failed {
        output::warning("Some fields could not be decrypted with the current master key.");
    }
    if !reveal {
        output::tip("Pass --reveal to show sensitive values.");
    }
}

/// Masked rendering of a sensitive field.
fn sensitive(value: &Revealed, reveal: bool) -> Option<String> {
    match value {
        Revealed::Empty => None,
        Revealed::Value(_) if !reveal => Some("********".into()),
        other => Some(other.display_text().to_string()),
    }
}

/// Non-sensitive field: shown as-is, including the failure marker.
fn plain(value: &Revealed) -> Option<&str> {
    match value {
        Revealed::Empty => None,
        other => Some(other.display_text()),
    }
}

fn field(label: &str, value: Option<&str>) {
    if let Some(value) = value {
        println!("  {:<12} {}", style(format!("{label}:")).dim(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_unless_revealed() {
        let value = Revealed::Value("hunter2".into());
        assert_eq!(sensitive(&value, false).as_deref(), Some("********"));
        assert_eq!(sensitive(&value, true).as_deref(), Some("hunter2"));
        assert_eq!(sensitive(&Revealed::Empty, false), None);
    }

    #[test]
    fn failed_fields_show_the_marker() {
        let shown = sensitive(&Revealed::Failed, true).unwrap();
        assert_eq!(shown, Revealed::FAILED_MARKER);
    }
}

//! `keyvault edit`: change selected fields of a secret.
//!
//! Only the flags given are touched.  `--clear FIELD` empties a
//! nullable field; name and category can be changed but not cleared.

use crate::cli::commands::add::password_arg;
use crate::cli::output;
use crate::cli::{hide_existence, open_as_caller, parse_datetime, Cli, SecretArgs};
use crate::errors::{VaultError, Result};
use crate::vault::{Category, SecretPatch};

/// Fields accepted by `--clear`.
const CLEARABLE: &[&str] = &[
    "username",
    "password",
    "url",
    "notes",
    "api-key",
    "description",
    "folder",
    "tags",
    "expires",
    "rotate-days",
];

/// Execute the `edit` command.
pub fn execute(cli: &Cli, id: i64, args: &SecretArgs, clear: &[String]) -> Result<()> {
    let patch = build_patch(args, clear)?;
    if patch.is_empty() {
        return Err(VaultError::Validation(
            "nothing to change: pass at least one field flag or --clear".into(),
        ));
    }

    let (mut service, caller) = open_as_caller(cli)?;
    let secret = service
        .update_secret(&caller, id, &patch)
        .map_err(|e| hide_existence(e, "secret", id))?;

    output::success(&format!(
        "Updated secret '{}' ({})",
        secret.name,
        patch.field_names().join(", ")
    ));
    Ok(())
}

fn build_patch(args: &SecretArgs, clear: &[String]) -> Result<SecretPatch> {
    let mut patch = SecretPatch {
        name: args.name.clone(),
        category: args
            .category
            .as_deref()
            .map(str::parse::<Category>)
            .transpose()?,
        description: args.description.clone().map(Some),
        folder_id: args.folder.map(Some),
        tags: (!args.tags.is_empty()).then(|| args.tags.clone()),
        username: args.username.clone().map(Some),
        password: password_arg(args)?.map(Some),
        url: args.url.clone().map(Some),
        notes: args.notes.clone().map(Some),
        api_key: args.api_key.clone().map(Some),
        expires_at: args
            .expires
            .as_deref()
            .map(parse_datetime)
            .transpose()?
            .map(Some),
        rotation_interval_days: args.rotate_days.map(Some),
        ..SecretPatch::default()
    };

    for field in clear {
        let already_set = match field.as_str() {
            "username" => patch.username.replace(None).is_some(),
            "password" => patch.password.replace(None).is_some(),
            "url" => patch.url.replace(None).is_some(),
            "notes" => patch.notes.replace(None).is_some(),
            "api-key" => patch.api_key.replace(None).is_some(),
            "description" => patch.description.replace(None).is_some(),
            "folder" => patch.folder_id.replace(None).is_some(),
            "tags" => patch.tags.replace(Vec::new()).is_some(),
            "expires" => patch.expires_at.replace(None).is_some(),
            "rotate-days" => patch.rotation_interval_days.replace(None).is_some(),
            other => {
                return Err(VaultError::Validation(format!(
                    "cannot clear '{other}' (clearable: {})",
                    CLEARABLE.join(", ")
                )))
            }
        };
        if already_set {
            return Err(VaultError::Validation(format!(
                "'{field}' is both set and cleared"
            )));
        }
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_given_flags_are_patched() {
        let args = SecretArgs {
            notes: Some("rotated".into()),
            ..SecretArgs::default()
        };
        let patch = build_patch(&args, &[]).unwrap();
        assert_eq!(patch.field_names(), vec!["notes"]);
    }

    #[test]
    fn clear_sets_inner_none() {
        let patch = build_patch(&SecretArgs::default(), &["url".into(), "tags".into()]).unwrap();
        assert_eq!(patch.url, Some(None));
        assert_eq!(patch.tags, Some(Vec::new()));
    }

    #[test]
    fn set_and_clear_conflict() {
        let args = SecretArgs {
            url: Some("https://example.com".into()),
            ..SecretArgs::default()
        };
        assert!(build_patch(&args, &["url".into()]).is_err());
    }

    #[test]
    fn name_cannot_be_cleared() {
        assert!(matches!(
            build_patch(&SecretArgs::default(), &["name".into()]),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(build_patch(&SecretArgs::default(), &[]).unwrap().is_empty());
    }
}

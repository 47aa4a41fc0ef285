//! `keyvault add`: store a new secret.
//!
//! Sensitive values can come from flags, but the password is better
//! supplied with `--prompt-password` (piped stdin or an interactive
//! prompt) so it stays out of shell history.

use crate::cli::output;
use crate::cli::{open_as_caller, parse_datetime, read_sensitive, Cli, SecretArgs};
use crate::errors::{VaultError, Result};
use crate::vault::{Category, NewSecret};

/// Execute the `add` command.
pub fn execute(cli: &Cli, args: &SecretArgs) -> Result<()> {
    let new = new_secret(args)?;
    let (mut service, caller) = open_as_caller(cli)?;

    let secret = service.create_secret(&caller, &new)?;
    output::success(&format!("Added secret '{}' (id {})", secret.name, secret.id));
    Ok(())
}

fn new_secret(args: &SecretArgs) -> Result<NewSecret> {
    let name = args
        .name
        .clone()
        .ok_or_else(|| VaultError::Validation("--name is required".into()))?;

    let category = match &args.category {
        Some(c) => c.parse()?,
        None => Category::default(),
    };
    let expires_at = args.expires.as_deref().map(parse_datetime).transpose()?;

    Ok(NewSecret {
        name,
        description: args.description.clone(),
        category,
        folder_id: args.folder,
        tags: args.tags.clone(),
        username: args.username.clone(),
        password: password_arg(args)?,
        url: args.url.clone(),
        notes: args.notes.clone(),
        api_key: args.api_key.clone(),
        extra_data: None,
        expires_at,
        rotation_interval_days: args.rotate_days,
    })
}

/// The password from `--password` or, with `--prompt-password`, from
/// stdin or a prompt.  `None` when neither flag is given.
pub(crate) fn password_arg(args: &SecretArgs) -> Result<Option<String>> {
    if args.password.is_none() && !args.prompt_password {
        return Ok(None);
    }
    let value = read_sensitive(args.password.as_deref(), "Password")?;
    Ok(Some(value.as_str().to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_required() {
        assert!(matches!(
            new_secret(&SecretArgs::default()),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn builds_from_flags() {
        let args = SecretArgs {
            name: Some("db".into()),
            category: Some("database".into()),
            username: Some("root".into()),
            tags: vec!["prod".into()],
            rotate_days: Some(30),
            ..SecretArgs::default()
        };
        let new = new_secret(&args).unwrap();
        assert_eq!(new.name, "db");
        assert_eq!(new.category, Category::Database);
        assert_eq!(new.username.as_deref(), Some("root"));
        assert!(new.password.is_none());
        assert_eq!(new.rotation_interval_days, Some(30));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let args = SecretArgs {
            name: Some("x".into()),
            category: Some("bogus".into()),
            ..SecretArgs::default()
        };
        assert!(new_secret(&args).is_err());
    }
}

//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{VaultError, Result};
use crate::service::{Caller, VaultService};

/// KeyVault CLI: self-hosted secrets vault with sharing and an audit trail.
#[derive(Parser)]
#[command(
    name = "keyvault",
    about = "Self-hosted secrets vault with sharing and an audit trail",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Instance directory holding the database, key file and config
    #[arg(long, env = "KEYVAULT_INSTANCE", default_value = "instance", global = true)]
    pub instance: String,

    /// Local user to act as
    #[arg(long = "as", value_name = "USER", env = "KEYVAULT_USER", global = true)]
    pub acting_user: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Initialize the instance and create the first admin
    Init {
        /// Username of the bootstrap admin
        #[arg(long, default_value = "admin")]
        admin: String,
    },

    /// Manage users (admin only for changes)
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage groups (admin only for changes)
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },

    /// Manage your folders
    Folder {
        #[command(subcommand)]
        action: FolderAction,
    },

    /// Add a secret (password from --password, piped stdin, or a prompt)
    Add(SecretArgs),

    /// Show a secret
    Show {
        /// Secret id
        id: i64,
        /// Print sensitive fields instead of masking them
        #[arg(long)]
        reveal: bool,
    },

    /// Copy a secret's password to the clipboard
    Copy {
        /// Secret id
        id: i64,
    },

    /// Edit fields of a secret (only the flags given are changed)
    Edit {
        /// Secret id
        id: i64,
        #[command(flatten)]
        fields: SecretArgs,
        /// Clear a field (username, password, url, notes, api-key,
        /// description, folder, tags, expires, rotate-days)
        #[arg(long, value_name = "FIELD")]
        clear: Vec<String>,
    },

    /// Delete a secret (owner or admin)
    Delete {
        /// Secret id
        id: i64,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List secrets you can read
    List {
        /// Only secrets in this folder
        #[arg(long)]
        folder: Option<i64>,
        /// Only secrets of this category
        #[arg(long)]
        category: Option<String>,
        /// Case-insensitive search over name, description and domain
        #[arg(short, long)]
        search: Option<String>,
        /// Only favorites
        #[arg(long)]
        favorites: bool,
        /// Only secrets shared with you
        #[arg(long)]
        shared: bool,
    },

    /// Toggle a secret's favorite flag
    Favorite {
        /// Secret id
        id: i64,
    },

    /// Share a secret with a user or group
    Share {
        /// Secret id
        id: i64,
        /// Share with this user
        #[arg(long, conflicts_with = "group", required_unless_present = "group")]
        user: Option<String>,
        /// Share with this group
        #[arg(long)]
        group: Option<String>,
        /// Grant write access instead of read
        #[arg(long)]
        write: bool,
        /// Expiry (RFC 3339, YYYY-MM-DD, or a duration like 7d)
        #[arg(long)]
        expires: Option<String>,
    },

    /// Remove a share from a secret
    Unshare {
        /// Secret id
        id: i64,
        /// Share id (see `keyvault shares`)
        share_id: i64,
    },

    /// List the shares on a secret
    Shares {
        /// Secret id
        id: i64,
    },

    /// View the audit log (admin only)
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
        /// Only entries with this action (e.g. secret_viewed)
        #[arg(long)]
        action: Option<String>,
    },

    /// Export the secrets you can read
    Export {
        /// Output format: json (default) or csv (summary, no passwords)
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Replace sensitive values with ***
        #[arg(long)]
        mask: bool,
    },

    /// Import secrets from a JSON export or a password-manager CSV
    Import {
        /// Path to the file to import
        file: String,
        /// Import format: json or csv (auto-detected from extension)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },
}

/// Secret fields shared by `add` and `edit`.
#[derive(clap::Args, Default)]
pub struct SecretArgs {
    /// Secret name (required for add)
    #[arg(long)]
    pub name: Option<String>,
    /// Category (credential, url, api_key, certificate, note, database, ssh_key, other)
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    /// Password value (visible in shell history; prefer stdin or the prompt)
    #[arg(long)]
    pub password: Option<String>,
    /// Read the password from stdin or a prompt
    #[arg(long, conflicts_with = "password")]
    pub prompt_password: bool,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    /// Folder id
    #[arg(long)]
    pub folder: Option<i64>,
    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Expiry (RFC 3339, YYYY-MM-DD, or a duration like 90d)
    #[arg(long)]
    pub expires: Option<String>,
    /// Password rotation interval in days
    #[arg(long)]
    pub rotate_days: Option<u32>,
}

/// User subcommands.
#[derive(clap::Subcommand)]
pub enum UserAction {
    /// Create a local user
    Add {
        username: String,
        /// Role: admin, user or readonly
        #[arg(long, default_value = "user")]
        role: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// List users
    List,
    /// Change a user's role
    Role {
        username: String,
        /// Role: admin, user or readonly
        role: String,
    },
}

/// Group subcommands.
#[derive(clap::Subcommand)]
pub enum GroupAction {
    /// Create a group
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List groups
    List,
    /// Add (or with --remove, remove) a group member
    Member {
        group: String,
        username: String,
        #[arg(long)]
        remove: bool,
    },
}

/// Folder subcommands.
#[derive(clap::Subcommand)]
pub enum FolderAction {
    /// Create a folder
    Add {
        name: String,
        /// Parent folder id
        #[arg(long)]
        parent: Option<i64>,
    },
    /// List your folders
    List,
    /// Delete a folder (its secrets become unfiled)
    Delete {
        id: i64,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve the instance directory relative to the working directory.
pub fn instance_dir(cli: &Cli) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(&cli.instance))
}

/// Load settings and open the vault service for this instance.
pub fn open_vault(cli: &Cli) -> Result<(Settings, VaultService)> {
    let dir = instance_dir(cli)?;
    let settings = Settings::load(&dir)?;
    let service = VaultService::open(&dir, &settings)?;
    Ok((settings, service))
}

/// Resolve `--as` into a caller.
pub fn current_caller(cli: &Cli, service: &VaultService) -> Result<Caller> {
    let username = cli.acting_user.as_deref().ok_or_else(|| {
        VaultError::CommandFailed("no acting user: pass --as <USER> or set KEYVAULT_USER".into())
    })?;
    service.caller(username, None)
}

/// Open the vault and resolve the caller in one step.
pub fn open_as_caller(cli: &Cli) -> Result<(VaultService, Caller)> {
    let (_, service) = open_vault(cli)?;
    let caller = current_caller(cli, &service)?;
    Ok((service, caller))
}

/// Get a sensitive value, trying in order:
/// 1. the inline value (with a shell-history warning)
/// 2. piped stdin
/// 3. an interactive prompt (empty input allowed)
///
/// Returns `Zeroizing<String>` so the value is wiped from memory on drop.
pub fn read_sensitive(inline: Option<&str>, prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(value) = inline {
        output::warning("Value provided on command line; it may appear in shell history.");
        return Ok(Zeroizing::new(value.to_string()));
    }

    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        return Ok(Zeroizing::new(buf.trim_end().to_string()));
    }

    let value = dialoguer::Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("input prompt: {e}")))?;
    Ok(Zeroizing::new(value))
}

/// Parse a point in time given as RFC 3339, a bare `YYYY-MM-DD`
/// (midnight UTC), or a duration from now such as `7d`, `12h`, `30m`.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    if let Some(duration) = parse_duration(input) {
        return Ok(Utc::now() + duration);
    }

    Err(VaultError::Validation(format!(
        "invalid date '{input}': use RFC 3339, YYYY-MM-DD, or a duration like 7d"
    )))
}

/// Parse a duration like `7d`, `24h`, `30m`.
pub fn parse_duration(input: &str) -> Option<chrono::Duration> {
    let input = input.trim();
    let unit = input.chars().last()?;
    let num = &input[..input.len() - unit.len_utf8()];
    let num: i64 = num.parse().ok().filter(|n| *n >= 0)?;
    match unit {
        'd' => Some(chrono::Duration::days(num)),
        'h' => Some(chrono::Duration::hours(num)),
        'm' => Some(chrono::Duration::minutes(num)),
        _ => None,
    }
}

/// Treat "forbidden" the same as "missing" so a caller without rights
/// cannot test whether an id exists.
pub fn hide_existence(err: VaultError, kind: &str, id: i64) -> VaultError {
    match err {
        VaultError::AccessDenied(_) | VaultError::NotFound { .. } => {
            VaultError::CommandFailed(format!("{kind} {id} not found or access denied"))
        }
        other => other,
    }
}

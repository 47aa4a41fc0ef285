use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, Result};
use crate::identity::{Role, RoleMapping};

/// Instance-level configuration, loaded from `<instance>/keyvault.toml`.
///
/// Every field has a sensible default so an instance works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite database file, relative to the instance directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Master key file, relative to the instance directory.
    #[serde(default = "default_key_file")]
    pub key_file: String,

    /// Directory groups whose members become `admin`.
    #[serde(default)]
    pub admin_groups: Vec<String>,

    /// Directory groups whose members become `user`.
    #[serde(default)]
    pub user_groups: Vec<String>,

    /// Directory groups whose members become `readonly`.
    #[serde(default)]
    pub readonly_groups: Vec<String>,

    /// Failed logins before the account is locked (default: 5).
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,

    /// How long a locked account stays locked, in minutes (default: 15).
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: u32,

    /// Default tracing filter when `KEYVAULT_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_database_file() -> String {
    "keyvault.db".to_string()
}

fn default_key_file() -> String {
    "encryption.key".to_string()
}

fn default_max_login_attempts() -> u32 {
    5
}

fn default_lockout_minutes() -> u32 {
    15
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            key_file: default_key_file(),
            admin_groups: Vec::new(),
            user_groups: Vec::new(),
            readonly_groups: Vec::new(),
            max_login_attempts: default_max_login_attempts(),
            lockout_minutes: default_lockout_minutes(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the instance directory.
    pub const FILE_NAME: &'static str = "keyvault.toml";

    /// Load settings from `<instance_dir>/keyvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(instance_dir: &Path) -> Result<Self> {
        let config_path = instance_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.max_login_attempts == 0 {
            return Err(VaultError::ConfigError(
                "max_login_attempts must be at least 1".into(),
            ));
        }

        Ok(settings)
    }

    /// Full path to the SQLite database.
    pub fn database_path(&self, instance_dir: &Path) -> PathBuf {
        instance_dir.join(&self.database_file)
    }

    /// Full path to the master key file.
    pub fn key_path(&self, instance_dir: &Path) -> PathBuf {
        instance_dir.join(&self.key_file)
    }

    /// Build the directory-group to role mapping.
    pub fn role_mapping(&self) -> RoleMapping {
        RoleMapping::new([
            (Role::Admin, self.admin_groups.as_slice()),
            (Role::User, self.user_groups.as_slice()),
            (Role::Readonly, self.readonly_groups.as_slice()),
        ])
    }

    /// Lockout duration as a chrono duration.
    pub fn lockout_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lockout_minutes))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.database_file, "keyvault.db");
        assert_eq!(s.key_file, "encryption.key");
        assert!(s.admin_groups.is_empty());
        assert_eq!(s.max_login_attempts, 5);
        assert_eq!(s.lockout_minutes, 15);
        assert_eq!(s.log_level, "warn");
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.database_file, "keyvault.db");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
database_file = "vault.sqlite"
key_file = "master.key"
admin_groups = ["CN=Vault Admins,DC=corp"]
user_groups = ["CN=Staff,DC=corp", " "]
readonly_groups = ["CN=Auditors,DC=corp"]
max_login_attempts = 3
lockout_minutes = 60
log_level = "debug"
"#;
        fs::write(tmp.path().join(Settings::FILE_NAME), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.database_file, "vault.sqlite");
        assert_eq!(settings.key_file, "master.key");
        assert_eq!(settings.admin_groups, vec!["CN=Vault Admins,DC=corp"]);
        assert_eq!(settings.max_login_attempts, 3);
        assert_eq!(settings.lockout_duration(), chrono::Duration::minutes(60));
        assert_eq!(settings.log_level, "debug");

        let mapping = settings.role_mapping();
        assert_eq!(
            mapping.resolve(&["CN=Auditors,DC=corp".to_string()]),
            Some(Role::Readonly)
        );
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(Settings::FILE_NAME), "lockout_minutes = 5\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.lockout_minutes, 5);
        assert_eq!(settings.database_file, "keyvault.db");
        assert_eq!(settings.max_login_attempts, 5);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(Settings::FILE_NAME), "not valid {{toml").unwrap();

        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_zero_login_attempts() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(Settings::FILE_NAME), "max_login_attempts = 0\n").unwrap();

        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn paths_are_relative_to_instance_dir() {
        let s = Settings::default();
        let instance = Path::new("/srv/keyvault/instance");
        assert_eq!(
            s.database_path(instance),
            PathBuf::from("/srv/keyvault/instance/keyvault.db")
        );
        assert_eq!(
            s.key_path(instance),
            PathBuf::from("/srv/keyvault/instance/encryption.key")
        );
    }
}

use std::fmt;

use thiserror::Error;

/// Why the access policy refused an operation.
///
/// Never shown to the caller (the `AccessDenied` message is uniform), but
/// recorded in the audit ledger so denials can be investigated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No active share targets the actor or any of its groups.
    NoActiveShare,
    /// A share exists but only grants read access.
    ReadOnlyShare,
    /// The actor's role is `readonly`.
    ReadOnlyRole,
    /// Only the owner (or an admin) may do this.
    NotOwner,
    /// Only an admin may do this.
    AdminOnly,
}

impl Denial {
    pub fn as_str(&self) -> &'static str {
        match self {
            Denial::NoActiveShare => "no active share",
            Denial::ReadOnlyShare => "share grants read only",
            Denial::ReadOnlyRole => "readonly role",
            Denial::NotOwner => "not owner",
            Denial::AdminOnly => "admin only",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors that can occur in KeyVault.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Input errors ---
    #[error("Invalid input: {0}")]
    Validation(String),

    // --- Authorization errors ---
    #[error("Access denied")]
    AccessDenied(Denial),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    // --- Keyfile errors ---
    #[error("Keyfile error: {0}")]
    KeyfileError(String),

    // --- Storage errors ---
    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    // --- Authentication errors ---
    #[error("Invalid username or password")]
    AuthenticationFailed,

    #[error("Account is temporarily locked")]
    AccountLocked,

    #[error("Directory service unavailable: {0}")]
    DirectoryUnavailable(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

impl VaultError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        VaultError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// The denial reason, if this is an `AccessDenied` error.
    pub fn denial(&self) -> Option<Denial> {
        match self {
            VaultError::AccessDenied(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Convenience type alias for KeyVault results.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_message_hides_reason() {
        let err = VaultError::AccessDenied(Denial::ReadOnlyShare);
        assert_eq!(err.to_string(), "Access denied");
        assert_eq!(err.denial(), Some(Denial::ReadOnlyShare));
    }

    #[test]
    fn not_found_names_the_resource() {
        let err = VaultError::not_found("secret", 42);
        assert_eq!(err.to_string(), "secret 42 not found");
        assert!(err.denial().is_none());
    }
}

//! Master key file handling.
//!
//! The instance keeps exactly one master key in a 32-byte binary file.
//! On first start the file is absent and a fresh key is generated and
//! written with owner-only permissions; afterwards the same file is
//! loaded on every start.

use std::fs;
use std::io::Write;
use std::path::Path;

use super::cipher::{MasterKey, KEY_LEN};
use crate::errors::{VaultError, Result};

/// Load the master key at `path`, or generate and persist a new one if
/// the file does not exist.
pub fn load_or_generate(path: &Path) -> Result<MasterKey> {
    if path.exists() {
        let key = load_key(path)?;
        tracing::debug!(path = %path.display(), "loaded master key");
        Ok(key)
    } else {
        let key = generate_key(path)?;
        tracing::debug!(path = %path.display(), "generated new master key");
        Ok(key)
    }
}

/// Generate a new random key and write it to `path`.
///
/// Fails if the file already exists, so an existing key can never be
/// overwritten by accident.
pub fn generate_key(path: &Path) -> Result<MasterKey> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                VaultError::KeyfileError(format!("cannot create key directory: {e}"))
            })?;
        }
    }

    let key = MasterKey::generate();

    let mut file = create_owner_only(path)?;
    file.write_all(key.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| VaultError::KeyfileError(format!("failed to write key file: {e}")))?;
    drop(file);

    restrict_permissions(path)?;

    Ok(key)
}

/// Load a key file from disk and validate its length.
pub fn load_key(path: &Path) -> Result<MasterKey> {
    let mut data = fs::read(path)
        .map_err(|e| VaultError::KeyfileError(format!("failed to read key file: {e}")))?;

    if data.len() != KEY_LEN {
        let len = data.len();
        zeroize::Zeroize::zeroize(&mut data);
        return Err(VaultError::KeyfileError(format!(
            "key file must be exactly {KEY_LEN} bytes, got {len}"
        )));
    }

    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(&data);
    zeroize::Zeroize::zeroize(&mut data);

    let key = MasterKey::new(bytes);
    zeroize::Zeroize::zeroize(&mut bytes);
    Ok(key)
}

/// Create `path` exclusively, readable and writable by the owner only.
fn create_owner_only(path: &Path) -> Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            VaultError::KeyfileError(format!("key file already exists at {}", path.display()))
        } else {
            VaultError::KeyfileError(format!("failed to create key file: {e}"))
        }
    })
}

/// Restrict an existing file to its owning account.
///
/// On Unix the mode bits are authoritative: owner read/write only.
#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, perms).map_err(|e| {
        VaultError::KeyfileError(format!("failed to set key file permissions: {e}"))
    })
}

/// Restrict an existing file to its owning account.
///
/// On Windows the inherited ACL is stripped and replaced by a single
/// read grant for the current account.
#[cfg(windows)]
pub(crate) fn restrict_permissions(path: &Path) -> Result<()> {
    let user = std::env::var("USERNAME").map_err(|_| {
        VaultError::KeyfileError("cannot determine the current account (USERNAME unset)".into())
    })?;

    let output = std::process::Command::new("icacls")
        .args(icacls_args(path, &user))
        .output()
        .map_err(|e| VaultError::KeyfileError(format!("failed to run icacls: {e}")))?;

    if !output.status.success() {
        return Err(VaultError::KeyfileError(format!(
            "icacls could not restrict {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn restrict_permissions(path: &Path) -> Result<()> {
    Err(VaultError::KeyfileError(format!(
        "cannot restrict {} to its owner on this platform",
        path.display()
    )))
}

/// Arguments for `icacls`: drop inherited entries, then grant `user`
/// read access and nothing else.
#[cfg(any(windows, test))]
fn icacls_args(path: &Path, user: &str) -> Vec<std::ffi::OsString> {
    vec![
        path.as_os_str().to_os_string(),
        "/inheritance:r".into(),
        "/grant:r".into(),
        format!("{user}:(R)").into(),
    ]
}

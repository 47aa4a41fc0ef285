//! Encrypted field values.
//!
//! A `Sealed` holds the ciphertext of one sensitive field exactly as it
//! is persisted.  There is no way to get plaintext out of it without a
//! `Cipher`, and its `Debug` output only reports the ciphertext length,
//! so a stray `{:?}` on a record can never leak a password.
//!
//! An absent or empty plaintext seals to `Sealed::empty()`, which is
//! stored as SQL `NULL` rather than as an encryption of "".

use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use super::cipher::Cipher;
use crate::errors::Result;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Sealed(Option<Vec<u8>>);

impl Sealed {
    /// The empty sentinel.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Encrypt `plaintext`; `None` and `""` both produce the empty sentinel.
    pub fn seal(cipher: &Cipher, plaintext: Option<&str>) -> Result<Self> {
        match plaintext {
            Some(text) if !text.is_empty() => Ok(Self(Some(cipher.encrypt_str(text)?))),
            _ => Ok(Self::empty()),
        }
    }

    /// Decrypt the stored value; the empty sentinel reveals as `None`.
    pub fn reveal(&self, cipher: &Cipher) -> Result<Option<String>> {
        match &self.0 {
            Some(bytes) if !bytes.is_empty() => cipher.decrypt_str(bytes).map(Some),
            _ => Ok(None),
        }
    }

    /// Decrypt without failing: an undecryptable value becomes
    /// `Revealed::Failed` so one bad field does not sink a listing.
    pub fn reveal_lossy(&self, cipher: &Cipher) -> Revealed {
        match self.reveal(cipher) {
            Ok(Some(text)) => Revealed::Value(text),
            Ok(None) => Revealed::Empty,
            Err(_) => Revealed::Failed,
        }
    }

    /// Wrap ciphertext read back from storage.
    pub fn from_ciphertext(bytes: Option<Vec<u8>>) -> Self {
        Self(bytes.filter(|b| !b.is_empty()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// The raw ciphertext, if any.
    pub fn ciphertext(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }
}

impl fmt::Debug for Sealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(bytes) => write!(f, "Sealed(<{} bytes>)", bytes.len()),
            None => f.write_str("Sealed(empty)"),
        }
    }
}

impl ToSql for Sealed {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for Sealed {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Option::<Vec<u8>>::column_result(value).map(Sealed::from_ciphertext)
    }
}

/// Outcome of a best-effort field decryption.
#[derive(Clone, PartialEq, Eq)]
pub enum Revealed {
    Empty,
    Value(String),
    Failed,
}

impl Revealed {
    /// Marker shown in place of a field that could not be decrypted.
    pub const FAILED_MARKER: &'static str = "<decryption failed>";

    /// The plaintext, or `None` if empty or failed.
    pub fn value(&self) -> Option<&str> {
        match self {
            Revealed::Value(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Revealed::Failed)
    }

    /// Render for display or export: plaintext, "" or the failure marker.
    pub fn display_text(&self) -> &str {
        match self {
            Revealed::Value(text) => text,
            Revealed::Empty => "",
            Revealed::Failed => Self::FAILED_MARKER,
        }
    }
}

impl fmt::Debug for Revealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revealed::Empty => f.write_str("Empty"),
            Revealed::Value(_) => f.write_str("Value(<redacted>)"),
            Revealed::Failed => f.write_str("Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::{MasterKey, KEY_LEN};

    fn cipher(byte: u8) -> Cipher {
        Cipher::new(&MasterKey::new([byte; KEY_LEN]))
    }

    #[test]
    fn empty_and_absent_seal_to_sentinel() {
        let c = cipher(1);
        assert!(Sealed::seal(&c, None).unwrap().is_empty());
        assert!(Sealed::seal(&c, Some("")).unwrap().is_empty());
        assert_eq!(Sealed::empty().reveal(&c).unwrap(), None);
    }

    #[test]
    fn seal_then_reveal() {
        let c = cipher(2);
        let sealed = Sealed::seal(&c, Some("p@ss")).unwrap();
        assert_ne!(sealed.ciphertext().unwrap(), b"p@ss");
        assert_eq!(sealed.reveal(&c).unwrap().as_deref(), Some("p@ss"));
    }

    #[test]
    fn reveal_lossy_marks_foreign_ciphertext() {
        let sealed = Sealed::seal(&cipher(3), Some("secret")).unwrap();
        let revealed = sealed.reveal_lossy(&cipher(4));
        assert!(revealed.is_failed());
        assert_eq!(revealed.display_text(), Revealed::FAILED_MARKER);
    }

    #[test]
    fn debug_never_shows_plaintext() {
        let c = cipher(5);
        let sealed = Sealed::seal(&c, Some("hunter2")).unwrap();
        assert!(!format!("{sealed:?}").contains("hunter2"));
        let revealed = sealed.reveal_lossy(&c);
        assert!(!format!("{revealed:?}").contains("hunter2"));
        assert_eq!(revealed.value(), Some("hunter2"));
    }

    #[test]
    fn stored_empty_blob_reads_back_as_sentinel() {
        assert!(Sealed::from_ciphertext(Some(Vec::new())).is_empty());
        assert!(Sealed::from_ciphertext(None).is_empty());
    }
}

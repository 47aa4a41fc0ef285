//! Secret records.
//!
//! `Secret` is the persisted shape: sensitive fields are `Sealed`
//! ciphertext and plaintext only ever exists in a `RevealedSecret`
//! produced on demand.  The setters on `Secret` are the single write
//! path for sensitive fields, so the derived `url_domain` and the
//! password rotation timestamp can never drift from the ciphertext.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use url::Url;

use crate::crypto::{Cipher, Revealed, Sealed};
use crate::errors::{VaultError, Result};

/// Version of the field encryption scheme written by this release.
pub const ENCRYPTION_VERSION: u32 = 1;

/// What kind of secret a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    Credential,
    Url,
    ApiKey,
    Certificate,
    Note,
    Database,
    SshKey,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Credential,
        Category::Url,
        Category::ApiKey,
        Category::Certificate,
        Category::Note,
        Category::Database,
        Category::SshKey,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Credential => "credential",
            Category::Url => "url",
            Category::ApiKey => "api_key",
            Category::Certificate => "certificate",
            Category::Note => "note",
            Category::Database => "database",
            Category::SshKey => "ssh_key",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| VaultError::Validation(format!("unknown category '{s}'")))
    }
}

/// Extract the host (and port, if explicit) from a URL.
///
/// Anything that does not parse as an absolute URL with a host yields
/// `None`; this never fails.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// A secret as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    /// Row id; `0` until inserted.
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub owner_id: i64,
    pub folder_id: Option<i64>,
    pub tags: Vec<String>,
    pub(super) username: Sealed,
    pub(super) password: Sealed,
    pub(super) url: Sealed,
    pub(super) notes: Sealed,
    pub(super) api_key: Sealed,
    pub(super) extra_data: Sealed,
    pub(super) url_domain: Option<String>,
    pub is_favorite: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub(super) password_last_changed: Option<DateTime<Utc>>,
    pub rotation_interval_days: Option<u32>,
    pub encryption_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Secret {
    /// Build an unsaved record from creation input, sealing every
    /// sensitive field.
    pub fn draft(cipher: &Cipher, owner_id: i64, new: &NewSecret, now: DateTime<Utc>) -> Result<Self> {
        let name = validate_name(&new.name)?;
        let mut secret = Secret {
            id: 0,
            name,
            description: non_blank(new.description.as_deref()),
            category: new.category,
            owner_id,
            folder_id: new.folder_id,
            tags: normalize_tags(&new.tags),
            username: Sealed::empty(),
            password: Sealed::empty(),
            url: Sealed::empty(),
            notes: Sealed::empty(),
            api_key: Sealed::empty(),
            extra_data: Sealed::empty(),
            url_domain: None,
            is_favorite: false,
            expires_at: new.expires_at,
            password_last_changed: None,
            rotation_interval_days: new.rotation_interval_days,
            encryption_version: ENCRYPTION_VERSION,
            created_at: now,
            updated_at: None,
        };
        secret.set_username(cipher, new.username.as_deref())?;
        secret.set_password(cipher, new.password.as_deref(), now)?;
        secret.set_url(cipher, new.url.as_deref())?;
        secret.set_notes(cipher, new.notes.as_deref())?;
        secret.set_api_key(cipher, new.api_key.as_deref())?;
        secret.set_extra_data(cipher, new.extra_data.as_ref())?;
        Ok(secret)
    }

    pub fn username(&self) -> &Sealed {
        &self.username
    }

    pub fn password(&self) -> &Sealed {
        &self.password
    }

    pub fn url(&self) -> &Sealed {
        &self.url
    }

    pub fn notes(&self) -> &Sealed {
        &self.notes
    }

    pub fn api_key(&self) -> &Sealed {
        &self.api_key
    }

    pub fn extra_data(&self) -> &Sealed {
        &self.extra_data
    }

    /// Host of the stored URL, kept in clear for search.
    pub fn url_domain(&self) -> Option<&str> {
        self.url_domain.as_deref()
    }

    pub fn password_last_changed(&self) -> Option<DateTime<Utc>> {
        self.password_last_changed
    }

    pub fn set_username(&mut self, cipher: &Cipher, value: Option<&str>) -> Result<()> {
        self.username = Sealed::seal(cipher, value)?;
        Ok(())
    }

    /// Seal a new password.  A non-empty password stamps
    /// `password_last_changed`; clearing it leaves the stamp alone.
    pub fn set_password(
        &mut self,
        cipher: &Cipher,
        value: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.password = Sealed::seal(cipher, value)?;
        if !self.password.is_empty() {
            self.password_last_changed = Some(now);
        }
        Ok(())
    }

    /// Seal a new URL and recompute `url_domain` from it.
    pub fn set_url(&mut self, cipher: &Cipher, value: Option<&str>) -> Result<()> {
        self.url = Sealed::seal(cipher, value)?;
        self.url_domain = value.filter(|v| !v.is_empty()).and_then(extract_domain);
        Ok(())
    }

    pub fn set_notes(&mut self, cipher: &Cipher, value: Option<&str>) -> Result<()> {
        self.notes = Sealed::seal(cipher, value)?;
        Ok(())
    }

    pub fn set_api_key(&mut self, cipher: &Cipher, value: Option<&str>) -> Result<()> {
        self.api_key = Sealed::seal(cipher, value)?;
        Ok(())
    }

    /// Seal arbitrary structured data as JSON.  `null` clears the field.
    pub fn set_extra_data(&mut self, cipher: &Cipher, value: Option<&serde_json::Value>) -> Result<()> {
        let json = match value {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(
                serde_json::to_string(v)
                    .map_err(|e| VaultError::SerializationError(e.to_string()))?,
            ),
        };
        self.extra_data = Sealed::seal(cipher, json.as_deref())?;
        Ok(())
    }

    /// Apply a partial update and stamp `updated_at`.  Tag names are
    /// normalized into `self.tags`; the store persists them.
    pub fn apply(&mut self, cipher: &Cipher, patch: &SecretPatch, now: DateTime<Utc>) -> Result<()> {
        if let Some(name) = &patch.name {
            self.name = validate_name(name)?;
        }
        if let Some(description) = &patch.description {
            self.description = non_blank(description.as_deref());
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(folder_id) = patch.folder_id {
            self.folder_id = folder_id;
        }
        if let Some(tags) = &patch.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(username) = &patch.username {
            self.set_username(cipher, username.as_deref())?;
        }
        if let Some(password) = &patch.password {
            self.set_password(cipher, password.as_deref(), now)?;
        }
        if let Some(url) = &patch.url {
            self.set_url(cipher, url.as_deref())?;
        }
        if let Some(notes) = &patch.notes {
            self.set_notes(cipher, notes.as_deref())?;
        }
        if let Some(api_key) = &patch.api_key {
            self.set_api_key(cipher, api_key.as_deref())?;
        }
        if let Some(extra) = &patch.extra_data {
            self.set_extra_data(cipher, extra.as_ref())?;
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = expires_at;
        }
        if let Some(days) = patch.rotation_interval_days {
            self.rotation_interval_days = days;
        }
        self.updated_at = Some(now);
        Ok(())
    }

    /// Decrypt every sensitive field.  A field that fails to decrypt is
    /// reported as `Revealed::Failed` without affecting the others.
    pub fn reveal(&self, cipher: &Cipher) -> RevealedSecret {
        RevealedSecret {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category,
            owner_id: self.owner_id,
            folder_id: self.folder_id,
            tags: self.tags.clone(),
            username: self.username.reveal_lossy(cipher),
            password: self.password.reveal_lossy(cipher),
            url: self.url.reveal_lossy(cipher),
            notes: self.notes.reveal_lossy(cipher),
            api_key: self.api_key.reveal_lossy(cipher),
            extra_data: self.extra_data.reveal_lossy(cipher),
            url_domain: self.url_domain.clone(),
            is_favorite: self.is_favorite,
            expires_at: self.expires_at,
            password_last_changed: self.password_last_changed,
            rotation_interval_days: self.rotation_interval_days,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the password is older than the rotation interval.
    pub fn rotation_due(&self, now: DateTime<Utc>) -> bool {
        match (self.rotation_interval_days, self.password_last_changed) {
            (Some(days), Some(changed)) => changed + chrono::Duration::days(days.into()) <= now,
            _ => false,
        }
    }
}

/// Plaintext view of a secret, produced for a single authorized read.
///
/// `Revealed` redacts itself in `Debug`, so this can be logged safely.
#[derive(Debug, Clone)]
pub struct RevealedSecret {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub owner_id: i64,
    pub folder_id: Option<i64>,
    pub tags: Vec<String>,
    pub username: Revealed,
    pub password: Revealed,
    pub url: Revealed,
    pub notes: Revealed,
    pub api_key: Revealed,
    pub extra_data: Revealed,
    pub url_domain: Option<String>,
    pub is_favorite: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub password_last_changed: Option<DateTime<Utc>>,
    pub rotation_interval_days: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RevealedSecret {
    /// Parse the structured extra data, if present and intact.
    pub fn extra_data_json(&self) -> Result<Option<serde_json::Value>> {
        match &self.extra_data {
            Revealed::Empty => Ok(None),
            Revealed::Failed => Err(VaultError::DecryptionFailed),
            Revealed::Value(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| VaultError::SerializationError(e.to_string())),
        }
    }
}

/// Row for list views: metadata plus the revealed username only.
#[derive(Debug, Clone)]
pub struct SecretSummary {
    pub id: i64,
    pub name: String,
    pub category: Category,
    pub owner_id: i64,
    pub folder_id: Option<i64>,
    pub tags: Vec<String>,
    pub username: Revealed,
    pub url_domain: Option<String>,
    pub is_favorite: bool,
    /// Visible through a share rather than ownership.
    pub shared: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SecretSummary {
    pub fn new(secret: &Secret, cipher: &Cipher, viewer_id: i64) -> Self {
        Self {
            id: secret.id,
            name: secret.name.clone(),
            category: secret.category,
            owner_id: secret.owner_id,
            folder_id: secret.folder_id,
            tags: secret.tags.clone(),
            username: secret.username.reveal_lossy(cipher),
            url_domain: secret.url_domain.clone(),
            is_favorite: secret.is_favorite,
            shared: secret.owner_id != viewer_id,
            expires_at: secret.expires_at,
            created_at: secret.created_at,
            updated_at: secret.updated_at,
        }
    }
}

/// Input for creating a secret.  Holds plaintext, so it has no `Debug`.
#[derive(Clone, Default)]
pub struct NewSecret {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub folder_id: Option<i64>,
    pub tags: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub api_key: Option<String>,
    pub extra_data: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub rotation_interval_days: Option<u32>,
}

impl NewSecret {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update.  The outer `Option` is "present in the request";
/// for nullable fields the inner `None` clears the value.
#[derive(Clone, Default)]
pub struct SecretPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Category>,
    pub folder_id: Option<Option<i64>>,
    pub tags: Option<Vec<String>>,
    pub username: Option<Option<String>>,
    pub password: Option<Option<String>>,
    pub url: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub api_key: Option<Option<String>>,
    pub extra_data: Option<Option<serde_json::Value>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub rotation_interval_days: Option<Option<u32>>,
}

impl SecretPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.folder_id.is_none()
            && self.tags.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.url.is_none()
            && self.notes.is_none()
            && self.api_key.is_none()
            && self.extra_data.is_none()
            && self.expires_at.is_none()
            && self.rotation_interval_days.is_none()
    }

    /// Names of the fields present in this patch, for audit details.
    pub fn field_names(&self) -> Vec<&'static str> {
        let present = [
            ("name", self.name.is_some()),
            ("description", self.description.is_some()),
            ("category", self.category.is_some()),
            ("folder", self.folder_id.is_some()),
            ("tags", self.tags.is_some()),
            ("username", self.username.is_some()),
            ("password", self.password.is_some()),
            ("url", self.url.is_some()),
            ("notes", self.notes.is_some()),
            ("api_key", self.api_key.is_some()),
            ("extra_data", self.extra_data.is_some()),
            ("expires_at", self.expires_at.is_some()),
            ("rotation_interval_days", self.rotation_interval_days.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }
}

/// Filters for listing secrets.
#[derive(Debug, Clone, Default)]
pub struct SecretFilter {
    pub folder_id: Option<i64>,
    pub category: Option<Category>,
    /// Case-insensitive substring over name, description and domain.
    pub search: Option<String>,
    pub favorites_only: bool,
    /// Only secrets visible through a share, not owned by the caller.
    pub shared_only: bool,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(VaultError::Validation("secret name cannot be empty".into()));
    }
    Ok(name.to_string())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trim tag names, drop blanks and duplicates, keep first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !out.iter().any(|seen| seen == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MasterKey;

    fn cipher() -> Cipher {
        Cipher::new(&MasterKey::generate())
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(
            extract_domain("https://DB.Example.com/login?x=1").as_deref(),
            Some("db.example.com")
        );
        assert_eq!(
            extract_domain("http://10.0.0.5:8443/").as_deref(),
            Some("10.0.0.5:8443")
        );
        assert_eq!(extract_domain("not a url"), None);
        assert_eq!(extract_domain("mailto:ops@example.com"), None);
    }

    #[test]
    fn draft_seals_fields_and_derives_domain() {
        let cipher = cipher();
        let now = Utc::now();
        let new = NewSecret {
            username: Some("root".into()),
            password: Some("p@ss".into()),
            url: Some("https://db.internal:5432".into()),
            notes: Some(String::new()),
            tags: vec![" prod ".into(), "prod".into(), "  ".into(), "Prod".into()],
            ..NewSecret::new("  DB-root ")
        };
        let secret = Secret::draft(&cipher, 1, &new, now).unwrap();

        assert_eq!(secret.name, "DB-root");
        assert_eq!(secret.tags, vec!["prod", "Prod"]);
        assert_eq!(secret.url_domain(), Some("db.internal:5432"));
        assert_eq!(secret.password_last_changed(), Some(now));
        assert!(secret.notes().is_empty());
        assert_ne!(secret.password().ciphertext().unwrap(), b"p@ss");

        let revealed = secret.reveal(&cipher);
        assert_eq!(revealed.password.value(), Some("p@ss"));
        assert_eq!(revealed.username.value(), Some("root"));
        assert_eq!(revealed.notes, Revealed::Empty);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Secret::draft(&cipher(), 1, &NewSecret::new("   "), Utc::now()).unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let cipher = cipher();
        let created = Utc::now() - chrono::Duration::days(3);
        let new = NewSecret {
            username: Some("root".into()),
            password: Some("old".into()),
            url: Some("https://a.example".into()),
            ..NewSecret::new("svc")
        };
        let mut secret = Secret::draft(&cipher, 1, &new, created).unwrap();
        let username_before = secret.username().clone();

        let now = Utc::now();
        let patch = SecretPatch {
            url: Some(None),
            notes: Some(Some("rotated".into())),
            ..SecretPatch::default()
        };
        secret.apply(&cipher, &patch, now).unwrap();

        assert_eq!(secret.username(), &username_before);
        assert!(secret.url().is_empty());
        assert_eq!(secret.url_domain(), None);
        assert_eq!(secret.password_last_changed(), Some(created));
        assert_eq!(secret.updated_at, Some(now));
        assert_eq!(secret.reveal(&cipher).notes.value(), Some("rotated"));
        assert_eq!(patch.field_names(), vec!["url", "notes"]);
    }

    #[test]
    fn password_change_refreshes_timestamp_but_clearing_does_not() {
        let cipher = cipher();
        let t0 = Utc::now() - chrono::Duration::days(1);
        let mut secret =
            Secret::draft(&cipher, 1, &NewSecret { password: Some("a".into()), ..NewSecret::new("s") }, t0)
                .unwrap();

        let t1 = Utc::now();
        secret.set_password(&cipher, Some("b"), t1).unwrap();
        assert_eq!(secret.password_last_changed(), Some(t1));

        secret.set_password(&cipher, None, t1 + chrono::Duration::hours(1)).unwrap();
        assert!(secret.password().is_empty());
        assert_eq!(secret.password_last_changed(), Some(t1));
    }

    #[test]
    fn foreign_key_field_degrades_alone() {
        let ours = cipher();
        let theirs = cipher();
        let mut secret = Secret::draft(
            &ours,
            1,
            &NewSecret { username: Some("svc".into()), ..NewSecret::new("s") },
            Utc::now(),
        )
        .unwrap();
        secret.set_notes(&theirs, Some("other key")).unwrap();

        let revealed = secret.reveal(&ours);
        assert_eq!(revealed.username.value(), Some("svc"));
        assert!(revealed.notes.is_failed());
    }

    #[test]
    fn extra_data_roundtrips_as_json() {
        let cipher = cipher();
        let extra = serde_json::json!({"port": 5432, "replicas": ["a", "b"]});
        let secret = Secret::draft(
            &cipher,
            1,
            &NewSecret { extra_data: Some(extra.clone()), ..NewSecret::new("s") },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(secret.reveal(&cipher).extra_data_json().unwrap(), Some(extra));
    }

    #[test]
    fn debug_never_shows_plaintext() {
        let cipher = cipher();
        let secret = Secret::draft(
            &cipher,
            1,
            &NewSecret { password: Some("hunter2".into()), ..NewSecret::new("s") },
            Utc::now(),
        )
        .unwrap();
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert!(!format!("{:?}", secret.reveal(&cipher)).contains("hunter2"));
    }

    #[test]
    fn rotation_due_after_interval() {
        let cipher = cipher();
        let changed = Utc::now() - chrono::Duration::days(31);
        let new = NewSecret {
            password: Some("x".into()),
            rotation_interval_days: Some(30),
            ..NewSecret::new("s")
        };
        let secret = Secret::draft(&cipher, 1, &new, changed).unwrap();
        assert!(secret.rotation_due(Utc::now()));
    }

    #[test]
    fn category_whitelist() {
        assert_eq!("ssh_key".parse::<Category>().unwrap(), Category::SshKey);
        assert!("bitcoin".parse::<Category>().is_err());
    }
}

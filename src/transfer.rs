//! Export and import formats.
//!
//! Export produces a versioned JSON document (or a summary CSV without
//! passwords).  Import accepts that same JSON document or a generic
//! password-manager CSV with `Title, Username, Password, URL, Notes`
//! columns.  Both directions go through `NewSecret`/`RevealedSecret`,
//! so imported values are sealed exactly like interactively created ones.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, Result};
use crate::vault::{Category, NewSecret, RevealedSecret};

/// Version tag written into export documents.
pub const EXPORT_VERSION: &str = "1.0";

/// Placeholder written instead of sensitive values in a masked export.
pub const MASK: &str = "***";

/// Name given to CSV rows without a title.
const DEFAULT_TITLE: &str = "Imported";

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
}

impl Format {
    /// Guess the format from a file extension, defaulting to JSON.
    pub fn from_extension(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Format::Csv,
            _ => Format::Json,
        }
    }
}

impl FromStr for Format {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            other => Err(VaultError::Validation(format!(
                "unknown format '{other}' (expected json or csv)"
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Csv => "csv",
        })
    }
}

/// Top-level export document.
#[derive(Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub count: usize,
    pub items: Vec<ExportItem>,
}

impl ExportDocument {
    pub fn new(items: Vec<ExportItem>) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            exported_at: Utc::now(),
            count: items.len(),
            items,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| VaultError::SerializationError(e.to_string()))
    }

    /// Summary CSV: `Name, Category, Username, URL, Tags, Created At`.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["Name", "Category", "Username", "URL", "Tags", "Created At"])
            .map_err(csv_error)?;
        for item in &self.items {
            let tags = item.tags.join(", ");
            let created = item.created_at.map(|t| t.to_rfc3339()).unwrap_or_default();
            writer
                .write_record([
                    item.name.as_str(),
                    item.category.as_str(),
                    item.username.as_deref().unwrap_or(""),
                    item.url.as_deref().unwrap_or(""),
                    tags.as_str(),
                    created.as_str(),
                ])
                .map_err(csv_error)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| VaultError::SerializationError(format!("CSV write failed: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| VaultError::SerializationError(format!("CSV write failed: {e}")))
    }
}

/// One exported secret.  Holds plaintext, so it has no `Debug`.
#[derive(Serialize, Deserialize, Default)]
pub struct ExportItem {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_category() -> String {
    Category::default().as_str().to_string()
}

impl ExportItem {
    /// Build an item from a revealed secret.  With `mask`, username,
    /// password, notes and API key are replaced by `***`.  Fields that
    /// failed to decrypt carry the failure marker.
    pub fn from_revealed(secret: &RevealedSecret, folder: Option<String>, mask: bool) -> Self {
        let sensitive = |field: &crate::crypto::Revealed| {
            if mask {
                Some(MASK.to_string())
            } else {
                exported(field)
            }
        };
        Self {
            name: secret.name.clone(),
            category: secret.category.as_str().to_string(),
            description: secret.description.clone(),
            username: sensitive(&secret.username),
            password: sensitive(&secret.password),
            url: exported(&secret.url),
            notes: sensitive(&secret.notes),
            api_key: sensitive(&secret.api_key),
            tags: secret.tags.clone(),
            folder,
            created_at: Some(secret.created_at),
            expires_at: secret.expires_at,
        }
    }

    /// Convert back into creation input.  Folders are not carried over.
    pub fn into_new_secret(self) -> Result<NewSecret> {
        Ok(NewSecret {
            category: self.category.parse()?,
            description: self.description,
            tags: self.tags,
            username: self.username,
            password: self.password,
            url: self.url,
            notes: self.notes,
            api_key: self.api_key,
            expires_at: self.expires_at,
            ..NewSecret::new(self.name)
        })
    }
}

fn exported(field: &crate::crypto::Revealed) -> Option<String> {
    match field {
        crate::crypto::Revealed::Empty => None,
        other => Some(other.display_text().to_string()),
    }
}

/// Parse import content in the given format.
pub fn parse_import(content: &str, format: Format) -> Result<Vec<NewSecret>> {
    match format {
        Format::Json => parse_json(content),
        Format::Csv => parse_csv_import(content),
    }
}

/// Parse an export document.
pub fn parse_json(content: &str) -> Result<Vec<NewSecret>> {
    let doc: ImportDocument = serde_json::from_str(content)
        .map_err(|e| VaultError::SerializationError(format!("invalid import document: {e}")))?;
    doc.items.into_iter().map(ExportItem::into_new_secret).collect()
}

/// Import only needs the items; version and counts are informational.
#[derive(Deserialize)]
struct ImportDocument {
    #[serde(default)]
    items: Vec<ExportItem>,
}

/// Parse a password-manager CSV export.
///
/// Columns are matched by header name (case-insensitive); unknown
/// columns are ignored and short rows are tolerated.  A row without a
/// title falls back to its `Group` column, then to "Imported".
pub fn parse_csv_import(content: &str) -> Result<Vec<NewSecret>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let header = reader.headers().map_err(csv_error)?.clone();
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let (title, group) = (column("Title"), column("Group"));
    let (username, password) = (column("Username"), column("Password"));
    let (url, notes) = (column("URL"), column("Notes"));

    let field = |row: &csv::StringRecord, idx: Option<usize>| -> Option<String> {
        idx.and_then(|i| row.get(i))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut secrets = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let name = field(&row, title)
            .filter(|t| !t.trim().is_empty())
            .or_else(|| field(&row, group).filter(|g| !g.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        secrets.push(NewSecret {
            username: field(&row, username),
            password: field(&row, password),
            url: field(&row, url),
            notes: field(&row, notes),
            ..NewSecret::new(name)
        });
    }
    Ok(secrets)
}

fn csv_error(e: csv::Error) -> VaultError {
    VaultError::SerializationError(format!("invalid CSV: {e}"))
}

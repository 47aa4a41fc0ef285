//! Vault data model: secrets with sealed fields, their shares and
//! folders, and the SQLite stores that persist them.

pub mod folder;
pub mod secret;
pub mod share;
pub mod store;

pub use folder::{Folder, FolderStore};
pub use secret::{
    Category, NewSecret, RevealedSecret, Secret, SecretFilter, SecretPatch, SecretSummary,
};
pub use share::{NewShare, Permission, Share, ShareTarget};
pub use store::SecretStore;

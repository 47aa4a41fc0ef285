//! Cryptographic primitives for KeyVault.
//!
//! This module provides:
//! - The AES-256-GCM cipher provider and its master key (`cipher`)
//! - Key file generation and loading (`keyfile`)
//! - The `Sealed` encrypted-field value type (`sealed`)

pub mod cipher;
pub mod keyfile;
pub mod sealed;

pub use cipher::{Cipher, MasterKey};
pub use sealed::{Revealed, Sealed};

//! Instance configuration (`keyvault.toml`).

pub mod settings;

pub use settings::Settings;

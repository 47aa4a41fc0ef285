pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod identity;
pub mod policy;
pub mod service;
pub mod transfer;
pub mod vault;

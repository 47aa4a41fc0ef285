//! One module per subcommand, each exposing `execute`.

pub mod add;
pub mod audit_cmd;
pub mod completions;
pub mod copy;
pub mod delete;
pub mod edit;
pub mod export;
pub mod favorite;
pub mod folder;
pub mod group;
pub mod import_cmd;
pub mod init;
pub mod list;
pub mod share;
pub mod show;
pub mod user;

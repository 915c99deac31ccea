//! Subcommand handlers. Each returns a user-facing error message on failure.

pub(crate) mod account;
pub(crate) mod federated;
pub(crate) mod init;

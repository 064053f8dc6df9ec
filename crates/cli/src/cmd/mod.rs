//! CLI command implementations

pub mod cleanup;
pub mod diff;
pub mod forget;
pub mod init;
pub mod log;
pub mod restore;
pub mod search;
pub mod show;
pub mod snapshot;
pub mod status;
pub mod watch;

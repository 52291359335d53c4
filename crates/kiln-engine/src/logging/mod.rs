//! Logging setup.
//!
//! Everything in the crate logs through the `log` facade; this module only
//! wires `env_logger` up as the backend for binaries that want one.

mod init;

pub use init::{LoggingConfig, build_logger, init_logging};

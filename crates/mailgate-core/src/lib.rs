//! # Mailgate Core
//!
//! Shared foundation for the Mailgate workspace: the alert data model,
//! the configuration tree, and the common error type.

pub mod config;
pub mod error;
pub mod types;

pub use config::MailgateConfig;
pub use error::{MailgateError, Result};
pub use types::{Alert, Category, Classification, ScanResult};

//! Mailgate error type and result alias.

/// Errors produced anywhere in the Mailgate workspace.
///
/// The variants mirror how callers must react: `Config` is fatal at
/// startup, `Mail` is a transient I/O failure caught at the operation
/// boundary, `NotFound`/`InvalidRequest` are client mistakes that are
/// reported and never retried.
#[derive(Debug, thiserror::Error)]
pub enum MailgateError {
    #[error("config error: {0}")]
    Config(String),

    #[error("mail error: {0}")]
    Mail(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MailgateError>;

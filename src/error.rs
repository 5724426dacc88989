//! Error types for the command layer.

use thiserror::Error;

/// Errors produced by commands, the paste store and the chooser.
///
/// `ModeUnavailable` and `StaleTarget` are expected races: callers treat
/// them as "nothing happened" and never show them to a user.
#[derive(Debug, Error)]
pub enum CmdError {
    /// The pane already hosts an exclusive mode.
    #[error("pane is busy")]
    ModeUnavailable,

    /// A lookup (buffer, session, window, pane) found nothing.
    #[error("{what}")]
    NotFound { what: String },

    /// The session or client captured by a deferred command is gone.
    #[error("target no longer exists")]
    StaleTarget,

    /// A resolved command template failed to parse.
    #[error("{0}")]
    TemplateParse(String),

    /// A numeric argument was outside its permitted range.
    #[error("{what} {reason}")]
    InvalidArgumentRange { what: String, reason: String },

    /// A command could not do what was asked.
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CmdError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CmdError::NotFound { what: what.into() }
    }

    /// Silent errors are races the user never needs to hear about.
    pub fn is_silent(&self) -> bool {
        matches!(self, CmdError::ModeUnavailable | CmdError::StaleTarget)
    }
}

pub type Result<T> = std::result::Result<T, CmdError>;

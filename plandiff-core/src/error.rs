use thiserror::Error;

/// Failures raised by a [`crate::session::PlannerSession`].
///
/// `Syntax` is terminal for a statement; every other variant is either
/// retried with diagnostics (query path) or substituted into the artifact
/// slot it was fetching (explain/profile path).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, SessionError::Syntax(_))
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

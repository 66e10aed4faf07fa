use thiserror::Error;

/// Outcomes the transport layer must tell apart.
///
/// Everything else (IO, decoding internals, detector plumbing) travels as
/// `anyhow::Error`.
#[derive(Debug, Error)]
pub enum ProctorError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

impl ProctorError {
    /// HTTP status the API answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ProctorError::SessionNotFound(_) => 404,
            ProctorError::InvalidFrame(_) | ProctorError::BadRequest(_) => 400,
            ProctorError::Poisoned(_) => 500,
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SunoError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SunoError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SunoError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SunoError {
    fn from(err: reqwest::Error) -> Self {
        SunoError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SunoError {
    fn from(err: serde_json::Error) -> Self {
        SunoError::Parse(err.to_string())
    }
}

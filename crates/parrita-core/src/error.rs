use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParritaError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-2xx reply from the LLM gateway. The status is kept so the web
    /// layer can pass quota/billing codes (429, 402) through to the caller.
    #[error("Gateway error {status}: {message}")]
    Gateway { status: u16, message: String },
}

impl ParritaError {
    /// Returns `true` when the error is likely transient and worth retrying
    /// (e.g. HTTP 429/5xx, network timeouts, connection refused).
    pub fn is_transient(&self) -> bool {
        match self {
            // reqwest errors are almost always network-level / transient
            Self::Http(_) => true,
            Self::Gateway { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Storage(msg) => is_transient_message(msg),
            _ => false,
        }
    }
}

fn is_transient_message(msg: &str) -> bool {
    let msg_lower = msg.to_lowercase();
    let patterns = [
        "timeout",
        "timed out",
        "connection refused",
        "connection reset",
        "broken pipe",
        "database is locked",
        "temporarily unavailable",
    ];
    patterns.iter().any(|p| msg_lower.contains(p))
}

pub type Result<T> = std::result::Result<T, ParritaError>;

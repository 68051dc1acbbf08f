use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrayerTimeError {
    #[error("location is not known yet; set one with `waqt location set`")]
    LocationUnknown,

    #[error("network request failed")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("prayer-times API returned {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("could not decode prayer times: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrayerTimeError {
    /// Failures that the cache may paper over. Decode and storage errors are
    /// not recoverable by falling back.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PrayerTimeError::Network(_) | PrayerTimeError::HttpStatus { .. }
        )
    }
}

impl From<reqwest::Error> for PrayerTimeError {
    fn from(e: reqwest::Error) -> Self {
        PrayerTimeError::Network(Box::new(e))
    }
}

impl From<serde_json::Error> for PrayerTimeError {
    fn from(e: serde_json::Error) -> Self {
        PrayerTimeError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PrayerTimeError>;

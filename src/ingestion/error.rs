use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("table has {found} rows, expected at least a header and a footer row")]
    TooFewRows { found: usize },

    #[error("table shape error at row {row}: {message}")]
    Shape { row: usize, message: String },

    #[error("cannot decode column '{column}' at row {row}: {message}")]
    Decode {
        column: String,
        row: usize,
        message: String,
    },

    #[error("geocoder returned no candidates for '{query}'")]
    GeocodeEmptyResult { query: String },

    #[error("address '{query}' not found in geocode cache")]
    CacheMiss { query: String },

    #[error("geocode cache entry for '{query}' is malformed: {reason}")]
    MalformedCacheEntry { query: String, reason: String },

    #[error("failed to fetch {url}: HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("geocoding service error: {message}")]
    Collaborator { message: String, retryable: bool },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestionError {
    /// Transient collaborator failures worth another attempt.
    /// Quota and auth failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestionError::Collaborator { retryable, .. } => *retryable,
            IngestionError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EsError {
    #[error("Connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("Authentication failed (status {status})")]
    Auth { status: u16 },

    #[error("Elasticsearch returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid index name: '{0}'")]
    InvalidIndexName(String),

    #[error("URL cannot be used as a base: {0}")]
    CannotBeABase(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EsError {
    /// Short label for metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            EsError::Connection(_) => "connection",
            EsError::Auth { .. } => "auth",
            EsError::Status { .. } => "status",
            EsError::InvalidUrl(_) | EsError::CannotBeABase(_) => "url",
            EsError::InvalidIndexName(_) => "invalid_index",
            EsError::Json(_) => "json",
        }
    }
}

impl From<EsError> for userdex::Error {
    fn from(err: EsError) -> Self {
        userdex::Error::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EsError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    /// The generation was cancelled through its token. Callers treat this
    /// differently from every other variant: accumulated partial output is
    /// kept instead of being replaced with an error message.
    #[error("generation cancelled")]
    Cancelled,

    #[error("API error: {0}")]
    Api(String),

    #[error("Stream error: {0}")]
    Stream(String),

    /// A stream that completed without producing any answer text.
    #[error("connector returned an empty response")]
    EmptyResponse,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConnectorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConnectorError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

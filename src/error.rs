pub type InsightResult<T> = Result<T, InsightError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum InsightError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Graph API error: {message}")]
    Api {
        message: String,
        code: Option<i64>,
        kind: Option<String>,
    },
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("Item list unavailable: {0}")]
    ItemSource(String),
}

impl InsightError {
    pub fn is_api(&self) -> bool {
        matches!(self, InsightError::Api { .. })
    }

    /// Upstream message for API errors, the rendered error otherwise.
    pub fn message(&self) -> String {
        match self {
            InsightError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

use thiserror::Error;

/// Errors raised by the flow engine and its registries.
///
/// Validation failures are not errors: they come back as
/// [`Navigation::Rejected`](crate::Navigation::Rejected) and keep the flow on
/// the same page.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("survey has no pages")]
    EmptyFlow,
    #[error("page {index} has unregistered type '{page_type}'")]
    UnknownPageType { index: usize, page_type: String },
    #[error("page '{key}' has invalid props: {reason}")]
    InvalidProps { key: String, reason: String },
    #[error("page index {index} is out of bounds (total {total})")]
    OutOfBounds { index: usize, total: usize },
    #[error("duplicate page id '{0}'")]
    DuplicatePageId(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of a durable state slot.
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid slot key '{0}'")]
    InvalidKey(String),
}

/// Failures while handing a completion payload to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sink storage at {path} is not a JSON array")]
    NotAnArray { path: String },
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;

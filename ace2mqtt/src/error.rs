use thiserror::Error;

/// Inbound payloads that could not be decoded into what their topic promises.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("{metric}: expected an integer, got {value:?}")]
    NotAnInteger { metric: String, value: String },

    #[error("firmware version {0} does not fit into 16 bits")]
    FirmwareOutOfRange(i64),
}

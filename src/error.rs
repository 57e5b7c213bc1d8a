use thiserror::Error;

#[derive(Debug, Error)]
pub enum QrDeckError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("asset error: {0}")]
    Asset(String),
    #[error("qr encoding failed: {0}")]
    QrEncoding(String),
    #[error("layout error: {0}")]
    Layout(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

use reqwest::StatusCode;
use thiserror::Error;

use super::types::Topic;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request could not reach the server: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("server answered HTTP {}", .status.as_u16())]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid page address: {0}")]
    Address(#[from] url::ParseError),
    #[error("page request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("page answered HTTP {}", .0.as_u16())]
    Status(StatusCode),
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push connection failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed frame: {0}")]
    Frame(String),
    #[error("broker rejected the session: {0}")]
    Broker(String),
    #[error("push connection closed by broker")]
    Closed,
}

#[derive(Debug, Error)]
#[error("malformed {topic} payload: {source}")]
pub struct PayloadError {
    pub topic: Topic,
    #[source]
    pub source: serde_json::Error,
}

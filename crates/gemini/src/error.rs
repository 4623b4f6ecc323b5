use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = GeminiError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GeminiError {
    /// The request never produced a response: connect, TLS, timeout or body read failure.
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("gemini rejected request ({reason}): {message}")]
    Api { reason: String, message: String },
    /// The exchange answered but the body is not the expected JSON shape.
    #[error("failed to decode response: {source}; body: {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    #[error("response field {0} missing")]
    MissingField(String),
    #[error("failed to serialize request payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("parameter {0} is not representable as JSON")]
    InvalidParam(String),
    #[error("signature error: {0}")]
    Signature(String),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error("invalid url: {0}")]
    Url(String),
    #[error("api credentials are not configured")]
    MissingCredentials,
    #[error("authenticated api support is disabled for {0}")]
    AuthenticationDisabled(String),
}

impl GeminiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, GeminiError::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            GeminiError::Decode { .. } | GeminiError::MissingField(_)
        )
    }
}

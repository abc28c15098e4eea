use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing API key: {0}")]
    MissingKey(&'static str),

    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

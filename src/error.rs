use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Out of order frame: got index {got}, last processed {last}")]
    OutOfOrderFrame { got: u64, last: u64 },

    #[error("Config Error: {0}")]
    Config(String),

    /// An external collaborator (detector, classifier, OCR) failed on a frame.
    #[error("Model Error ({stage}): {message}")]
    Model { stage: &'static str, message: String },

    #[error("Parse Error: {0}")]
    Parse(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Toml Error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn model(stage: &'static str, message: impl Into<String>) -> Self {
        Error::Model {
            stage,
            message: message.into(),
        }
    }
}

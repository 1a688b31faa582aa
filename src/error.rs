//! Error types for PAC loading and evaluation

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PacError>;

#[derive(Debug, Error)]
pub enum PacError {
    #[error("PAC script environment failed to initialise: {0}")]
    Environment(String),

    #[error("Failed to load PAC script from {origin}: {message}")]
    ScriptLoad { origin: String, message: String },

    /// A call into a loaded script failed. The engine's error value is tied to
    /// the context that raised it and is not `Send`, so only its rendered
    /// message is kept, which lets `PacError` cross threads.
    #[error("PAC function {function} failed: {message}")]
    ScriptEvaluation {
        function: &'static str,
        message: String,
    },

    #[error("Failed to read PAC file {path}: {source}")]
    ResourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to download PAC script from {url}: {source}")]
    Download { url: String, source: reqwest::Error },

    #[error("PAC download from {url} failed: HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("Invalid target URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Target URL has no host: {0}")]
    MissingHost(String),

    #[error("Failed to load config from {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl PacError {
    /// True for failures raised while running a loaded script, as opposed to
    /// failures that prevented the script from being loaded at all.
    pub fn is_evaluation(&self) -> bool {
        matches!(self, PacError::ScriptEvaluation { .. })
    }
}

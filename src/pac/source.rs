// src/pac/source.rs
use super::downloader::download_pac;
use crate::config::FetchConfig;
use crate::error::{PacError, Result};
use std::fs;
use std::path::PathBuf;
use url::Url;

/// Where a PAC script comes from: literal code or a readable resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacSource {
    Code(String),
    File(PathBuf),
    Url(Url),
}

impl PacSource {
    pub fn code(code: impl Into<String>) -> Self {
        PacSource::Code(code.into())
    }

    /// Interprets `location` as an `http`, `https` or `file` URL, or else as
    /// a filesystem path.
    pub fn location(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => PacSource::Url(url),
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => PacSource::File(path),
                Err(()) => PacSource::File(PathBuf::from(location)),
            },
            _ => PacSource::File(PathBuf::from(location)),
        }
    }

    /// Identity used in logs and errors.
    pub fn origin(&self) -> String {
        match self {
            PacSource::Code(_) => "<inline PAC code>".to_string(),
            PacSource::File(path) => path.display().to_string(),
            PacSource::Url(url) => url.to_string(),
        }
    }

    pub(crate) fn read(&self, fetch: &FetchConfig) -> Result<String> {
        match self {
            PacSource::Code(code) => Ok(code.clone()),
            PacSource::File(path) => fs::read_to_string(path).map_err(|e| PacError::ResourceRead {
                path: path.clone(),
                source: e,
            }),
            PacSource::Url(url) => download_pac(url.as_str(), fetch),
        }
    }
}

// src/pac/downloader.rs
use crate::config::FetchConfig;
use crate::error::{PacError, Result};
use reqwest::blocking::Client;

/// Download a PAC script over HTTP(S) and return its text.
pub fn download_pac(pac_url: &str, fetch: &FetchConfig) -> Result<String> {
    tracing::info!("Downloading PAC script from: {}", pac_url);

    let download_error = |source| PacError::Download {
        url: pac_url.to_string(),
        source,
    };

    let client = Client::builder()
        .timeout(fetch.timeout())
        .build()
        .map_err(download_error)?;

    let response = client.get(pac_url).send().map_err(download_error)?;

    if !response.status().is_success() {
        tracing::error!("PAC download failed: HTTP {}", response.status());
        return Err(PacError::DownloadStatus {
            url: pac_url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let text = response.text().map_err(download_error)?;
    tracing::info!("PAC script downloaded successfully ({} bytes)", text.len());
    Ok(text)
}

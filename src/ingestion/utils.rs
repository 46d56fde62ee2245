//! Utility functions for common operations

use crate::ingestion::error::{IngestionError, Result};
use reqwest::Client;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Download a page via HTTP
pub async fn http_get(url: &str) -> Result<String> {
    info!("Downloading from {}", url);
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(IngestionError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    info!("Downloaded {} bytes", body.len());
    Ok(body)
}

/// Split a "<address> (<id>)" precinct field into address and id
///
/// The address is everything before the first `(`, the id everything between
/// that `(` and the next `)`. Both are trimmed.
pub fn split_precinct(field: &str) -> Option<(String, String)> {
    let (address, rest) = field.split_once('(')?;
    let (id, _) = rest.split_once(')')?;
    Some((address.trim().to_string(), id.trim().to_string()))
}

/// Parse a count cell into an integer
/// Accepts leading zeros and well-formed German thousands groups ("1.234")
pub fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim();
    let mut groups = text.split('.');

    let lead = groups.next()?;
    if lead.is_empty() || !lead.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut digits = lead.to_string();
    let mut grouped = false;
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
        grouped = true;
    }

    if grouped && lead.len() > 3 {
        return None;
    }

    digits.parse::<u64>().ok()
}

/// Write a file via a sibling temp file and rename, so readers never see a torn file
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_sibling(path);
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;

    debug!("Wrote {} bytes to {:?}", contents.len(), path);
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}

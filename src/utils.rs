use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::model::any_model_exists;

async fn download_file(url: &str, path: &Path, token: Option<&str>) -> anyhow::Result<()> {
    tracing::info!("Downloading {} from {}", path.display(), url);

    let mut header_map = HeaderMap::new();

    if let Some(token) = token {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let client = reqwest::Client::new();
    let response = client.get(url).headers(header_map).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to download {}: {}", url, response.status());
    }

    let bytes = response.bytes().await?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;

    Ok(())
}

/// Fetches the model artifact into the first candidate path when none of the
/// candidates exist yet and a download URL is configured.
///
/// Returns whether a download happened.
pub async fn ensure_model_exists(
    candidates: &[PathBuf],
    url: Option<&str>,
    token: Option<&str>,
) -> anyhow::Result<bool> {
    tracing::debug!("Checking model...");
    if any_model_exists(candidates) {
        return Ok(false);
    }

    let (Some(url), Some(target)) = (url, candidates.first()) else {
        return Ok(false);
    };

    download_file(url, target, token).await?;
    Ok(true)
}

/// Lowercased extension of an uploaded filename, including the leading dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

pub const ALLOWED_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".webp"];

pub fn is_allowed_image(filename: &str) -> bool {
    file_extension(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

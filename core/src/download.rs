//! Streaming download of result artifacts.

use std::io::Write;
use std::path::Path;

use futures_util::StreamExt;
use tracing::debug;

use crate::{Error, Result};

/// Stream the response of `req` into `path`, creating parent directories
/// as needed. Returns the number of bytes written.
pub async fn request_to_file(req: reqwest::RequestBuilder, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let resp = ensure_success(req.send().await?).await?;
    let mut file = std::fs::File::create(path)?;
    let mut stream = resp.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        written += chunk.len() as u64;
    }
    debug!(path = %path.display(), written, "download complete");
    Ok(written)
}

/// Download `url` to `path` with a plain GET.
pub async fn download_to_file(client: &reqwest::Client, url: &str, path: &Path) -> Result<u64> {
    request_to_file(client.get(url), path).await
}

/// Fetch `url` fully into memory (used for per-segment audio).
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let resp = ensure_success(client.get(url).send().await?).await?;
    Ok(resp.bytes().await?.to_vec())
}

/// Turn a non-2xx response into [`Error::Api`] carrying the body text.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut message = resp.text().await.unwrap_or_default();
    if message.len() > 2000 {
        let mut end = 2000;
        // Clip on a char boundary; byte 2000 may fall inside a multibyte char.
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    Err(Error::Api { status, message })
}

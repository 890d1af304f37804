//! Single-file transfer primitives used by the batched network jobs.

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;

/// Stream a URL into `path`, writing through a `.part` file that is renamed
/// into place only after the transfer (and checksum, when given) succeeded.
/// Returns the computed sha1 and size.
pub async fn download_to_path(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
    on_chunk: Option<&(dyn Fn(u64) + Send + Sync)>,
) -> Result<(String, u64)> {
    log::debug!("downloading {} -> {:?}", url, path);

    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }

    let tmp_name = format!(
        "{}.part",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    let tmp_path = path.with_file_name(tmp_name);
    let mut file = File::create(&tmp_path).await?;
    let mut hasher = Sha1::new();
    let mut size: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
        if let Some(callback) = on_chunk {
            callback(chunk.len() as u64);
        }
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    let sha1 = format!("{:x}", hasher.finalize());
    if let Some(expected) = expected_sha1 {
        if !sha1.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            anyhow::bail!(
                "SHA1 mismatch for {}: expected {}, got {}",
                url,
                expected,
                sha1
            );
        }
    }

    tokio::fs::rename(&tmp_path, path).await?;
    log::debug!("download complete: {:?} ({} bytes)", path, size);
    Ok((sha1, size))
}

/// GET a URL as text.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }
    Ok(response.text().await?)
}

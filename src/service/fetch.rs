//! Загрузка голосового сообщения и музыки по URL во временный файл.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use log::debug;
use tokio::io::AsyncWriteExt;

use crate::error::{MixError, ServiceError};

/// Скачать `url` в `dest`; возвращает число записанных байт.
///
/// Сетевые ошибки и ошибки записи приводятся к `SourceFetchFailed`.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    dest: &Path,
    source_name: &str,
) -> Result<u64, ServiceError> {
    let fetch_err = |e: &dyn std::fmt::Display| MixError::fetch(source_name, format!("{}: {}", url, e));

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| fetch_err(&e))?;

    let mut file = tokio::fs::File::create(dest).await.map_err(|e| fetch_err(&e))?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| fetch_err(&e))?;
        file.write_all(&chunk).await.map_err(|e| fetch_err(&e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| fetch_err(&e))?;

    debug!("Downloaded {} bytes from {} to {}", written, url, dest.display());
    Ok(written)
}

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use futures::stream::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, IntoUrl};
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A finished download sitting at its temporary path, waiting to be persisted
#[derive(Debug)]
#[must_use = "a downloaded file stays hidden until persisted"]
pub struct Downloaded {
    temp: PathBuf,
    pub content_type: Option<String>,
    pub bytes: u64,
}

impl Downloaded {
    /// Move the downloaded file to its final name
    pub async fn persist(self, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        if let Err(e) = fs::rename(&self.temp, dest).await {
            let _ = fs::remove_file(&self.temp).await;
            return Err(e).context(format!("Failed to move {:?} to {:?}", &self.temp, dest));
        }
        Ok(())
    }
}

/// Hidden sibling of `path` used while a download is in flight
pub fn temp_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".temp");
    path.with_file_name(name)
}

/// Stream `url` into the temporary sibling of `path`.
///
/// Nothing is left on disk if the request, the status check or any write fails.
/// On success the caller decides the final name through [`Downloaded::persist`].
pub async fn streamed_download(
    client: &Client,
    url: impl IntoUrl,
    path: impl AsRef<Path>,
    mut on_progress: impl FnMut(u64),
) -> Result<Downloaded> {
    let temp = temp_path(path);
    match stream_to(client, url, &temp, &mut on_progress).await {
        Ok((content_type, bytes)) => Ok(Downloaded {
            temp,
            content_type,
            bytes,
        }),
        Err(e) => {
            let _ = fs::remove_file(&temp).await;
            Err(e)
        }
    }
}

async fn stream_to(
    client: &Client,
    url: impl IntoUrl,
    temp: &Path,
    on_progress: &mut impl FnMut(u64),
) -> Result<(Option<String>, u64)> {
    let resp = client.get(url).send().await?.error_for_status()?;
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_owned());

    let mut file = fs::File::create(temp)
        .await
        .context(format!("Failed to create file {:?}", temp))?;
    let mut written = 0;
    let mut stream = resp.bytes_stream();
    while let Some(b) = stream.next().await {
        let chunk = b?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        on_progress(written);
    }
    file.flush().await?;

    Ok((content_type, written))
}

/// Serialize `value` as pretty JSON next to `path`, then rename over it.
/// Readers see either the previous contents or the new ones, never a torn file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .context(format!("Failed to create temporary file in {:?}", dir))?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path)
        .map_err(|e| anyhow!(e.error))
        .context(format!("Failed to write {:?}", path))?;
    Ok(())
}

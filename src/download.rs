// ABOUTME: Authenticated download of files attached to message events
// ABOUTME: Saves url_private contents into a directory using the bot token as bearer credential

use anyhow::{Context, Result};
use slackbot_core::SlackFile;
use std::path::{Path, PathBuf};

pub struct FileDownloader {
    http: reqwest::Client,
    bot_token: String,
}

impl FileDownloader {
    pub fn new(http: reqwest::Client, bot_token: impl Into<String>) -> Self {
        Self {
            http,
            bot_token: bot_token.into(),
        }
    }

    /// Download `file` into `dir`, returning where it landed. Failures are logged.
    pub async fn download(&self, file: &SlackFile, dir: &Path) -> Option<PathBuf> {
        match self.try_download(file, dir).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "File downloaded");
                Some(path)
            }
            Err(e) => {
                tracing::error!(
                    file_id = file.id.as_deref().unwrap_or("unknown"),
                    error = %format!("{:#}", e),
                    "File download failed"
                );
                None
            }
        }
    }

    async fn try_download(&self, file: &SlackFile, dir: &Path) -> Result<PathBuf> {
        let url = file
            .url_private_download
            .as_deref()
            .or(file.url_private.as_deref())
            .context("File has no private download URL")?;

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .context("Download request failed")?
            .error_for_status()
            .context("Download rejected")?;
        let bytes = resp.bytes().await.context("Failed to read download body")?;

        let path = dir.join(local_file_name(file));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Final path component of the file's name, so a crafted name can't escape the target dir
pub fn local_file_name(file: &SlackFile) -> String {
    file.name
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty() && name != "..")
        .or_else(|| file.id.clone())
        .unwrap_or_else(|| "download".to_string())
}

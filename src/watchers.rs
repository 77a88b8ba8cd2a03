// ABOUTME: Event handlers used by the command-line flows
// ABOUTME: ReplyWatcher prints a user's replies; FileCollector saves the files they send back

use anyhow::Result;
use async_trait::async_trait;
use slackbot_core::traits::SlackApi;
use slackbot_core::utils::unescape_slack_text;
use slackbot_core::{EventHandler, MessageEvent, ReplySignal};
use std::path::PathBuf;

use crate::download::FileDownloader;
use crate::service::MessageService;

/// Reply from the watched user, with Slack's HTML entities decoded
pub fn reply_text(event: &MessageEvent, user_id: &str) -> Option<String> {
    if !event.is_message() || !event.is_from(user_id) {
        return None;
    }
    Some(unescape_slack_text(event.text_or_empty()))
}

/// Prints messages from one user and raises the signal when one arrives
pub struct ReplyWatcher {
    user_id: String,
    signal: ReplySignal,
}

impl ReplyWatcher {
    pub fn new(user_id: impl Into<String>, signal: ReplySignal) -> Self {
        Self {
            user_id: user_id.into(),
            signal,
        }
    }
}

#[async_trait]
impl EventHandler for ReplyWatcher {
    async fn handle(&self, event: &MessageEvent) -> Result<()> {
        if let Some(text) = reply_text(event, &self.user_id) {
            println!("Received: User {} said: {}", self.user_id, text);
            self.signal.mark_received();
        }
        Ok(())
    }
}

/// Downloads files a user sends, optionally deleting them from Slack afterwards
pub struct FileCollector<A> {
    user_id: String,
    service: MessageService<A>,
    downloader: FileDownloader,
    directory: PathBuf,
    remove_after: bool,
    signal: ReplySignal,
}

impl<A: SlackApi + 'static> FileCollector<A> {
    pub fn new(
        user_id: impl Into<String>,
        service: MessageService<A>,
        downloader: FileDownloader,
        directory: impl Into<PathBuf>,
        signal: ReplySignal,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            service,
            downloader,
            directory: directory.into(),
            remove_after: false,
            signal,
        }
    }

    pub fn remove_after(mut self, remove: bool) -> Self {
        self.remove_after = remove;
        self
    }
}

#[async_trait]
impl<A: SlackApi + 'static> EventHandler for FileCollector<A> {
    async fn handle(&self, event: &MessageEvent) -> Result<()> {
        if !event.is_message() || !event.is_from(&self.user_id) {
            return Ok(());
        }

        for file in &event.files {
            match self.downloader.download(file, &self.directory).await {
                Some(path) => println!("Saved file: {}", path.display()),
                None => println!("Failed to save file"),
            }

            if self.remove_after {
                if let Some(file_id) = file.id.as_deref() {
                    self.service.delete_file(file_id).await;
                }
            }
        }

        self.signal.mark_received();
        Ok(())
    }
}

// ABOUTME: Message and file orchestration over the SlackApi seam, plus the listener lifecycle
// ABOUTME: API failures are logged with Slack's error code and surface as None; the guard owns the connection

use anyhow::{Context, Result};
use slackbot_core::config::Config;
use slackbot_core::traits::{
    ApiError, EventTransport, FileUploadParams, HistoryMessage, PostedMessage, SlackApi,
    UploadedFile,
};
use slackbot_core::{EventDispatcher, EventHandler, HandlerId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What a DM produced: a plain message, or a file shared into the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmResult {
    Message(PostedMessage),
    File(UploadedFile),
}

impl DmResult {
    pub fn file_id(&self) -> Option<&str> {
        match self {
            Self::File(file) => Some(file.id.as_str()),
            Self::Message(_) => None,
        }
    }
}

fn log_api_error(operation: &str, err: &ApiError) {
    tracing::error!(
        operation = %operation,
        code = err.code().unwrap_or("none"),
        error = %err,
        "Slack API call failed"
    );
}

pub struct MessageService<A> {
    api: Arc<A>,
    dispatcher: Arc<EventDispatcher>,
}

impl<A> Clone for MessageService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<A: SlackApi + 'static> MessageService<A> {
    pub fn new(api: A, dispatcher: EventDispatcher) -> Self {
        Self {
            api: Arc::new(api),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Service whose dispatcher ignores everything that happened before now
    pub fn from_config(api: A, config: &Config) -> Self {
        let dispatcher = EventDispatcher::new(
            config.slack.bot_app_id.clone(),
            chrono::Utc::now().timestamp(),
            config.dispatcher.dedup_capacity,
        );
        Self::new(api, dispatcher)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    // =========================================================================
    // Outbound operations
    // =========================================================================

    pub async fn send_message(&self, channel: &str, text: &str) -> Option<PostedMessage> {
        match self.api.post_message(channel, text, None).await {
            Ok(posted) => {
                tracing::info!(channel = %posted.channel, ts = %posted.ts, "Message sent");
                Some(posted)
            }
            Err(e) => {
                log_api_error("send_message", &e);
                None
            }
        }
    }

    /// Open (or reuse) the DM with `user_id`, then post `text` or share `file` into it
    pub async fn send_dm(
        &self,
        user_id: &str,
        text: &str,
        file: Option<FileUploadParams>,
    ) -> Option<DmResult> {
        let channel = match self.api.open_conversation(user_id).await {
            Ok(channel) => channel,
            Err(e) => {
                log_api_error("send_dm", &e);
                return None;
            }
        };
        tracing::debug!(user = %user_id, channel = %channel, "DM conversation opened");

        match file {
            Some(params) => self
                .send_file(&channel, text, params)
                .await
                .map(DmResult::File),
            None => self.send_message(&channel, text).await.map(DmResult::Message),
        }
    }

    pub async fn send_file(
        &self,
        channel: &str,
        text: &str,
        params: FileUploadParams,
    ) -> Option<UploadedFile> {
        match self.api.upload_file(channel, text, params).await {
            Ok(file) => {
                tracing::info!(channel = %channel, file_id = %file.id, "File sent");
                Some(file)
            }
            Err(e) => {
                log_api_error("send_file", &e);
                None
            }
        }
    }

    pub async fn channel_history(&self, channel: &str, limit: u16) -> Option<Vec<HistoryMessage>> {
        match self.api.conversation_history(channel, limit).await {
            Ok(messages) => Some(messages),
            Err(e) => {
                log_api_error("channel_history", &e);
                None
            }
        }
    }

    pub async fn delete_file(&self, file_id: &str) -> bool {
        match self.api.delete_file(file_id).await {
            Ok(()) => {
                tracing::info!(file_id = %file_id, "File deleted");
                true
            }
            Err(e) => {
                log_api_error("delete_file", &e);
                false
            }
        }
    }

    // =========================================================================
    // Inbound handling
    // =========================================================================

    pub fn add_message_handler(&self, handler: Arc<dyn EventHandler>) -> HandlerId {
        self.dispatcher.register(handler)
    }

    pub fn remove_message_handler(&self, id: HandlerId) -> bool {
        self.dispatcher.unregister(id)
    }

    /// Connect `transport` and spawn the listener loop.
    ///
    /// The returned guard owns the connection: `stop()` ends the loop and
    /// waits for it, dropping the guard cancels it. Either way the loop
    /// closes the transport on its way out.
    pub async fn start<T>(&self, mut transport: T) -> Result<ConnectionGuard>
    where
        T: EventTransport + 'static,
    {
        if let Err(e) = transport.connect().await {
            tracing::error!(error = %e, "Failed to connect event transport");
            return Err(e.context("Failed to start listening for events"));
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(listen(
            transport,
            Arc::clone(&self.dispatcher),
            cancel.clone(),
        ));

        tracing::info!(handlers = self.dispatcher.handler_count(), "Listening for events");
        Ok(ConnectionGuard {
            cancel,
            task: Some(task),
        })
    }
}

/// Read envelopes until cancelled or the transport closes, dispatching and acking each one
async fn listen<T: EventTransport>(
    mut transport: T,
    dispatcher: Arc<EventDispatcher>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Listener cancelled");
                break;
            }
            next = transport.next_envelope() => next,
        };

        match next {
            Ok(Some(envelope)) => {
                let report = dispatcher.process(&envelope).await;
                if let Some(ack) = report.ack {
                    if let Err(e) = transport.acknowledge(&ack).await {
                        tracing::error!(
                            envelope_id = %ack.envelope_id,
                            error = %e,
                            "Failed to acknowledge envelope"
                        );
                    }
                }
            }
            Ok(None) => {
                tracing::info!("Event transport closed");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Event transport failed");
                break;
            }
        }
    }

    if let Err(e) = transport.close().await {
        tracing::warn!(error = %e, "Failed to close event transport");
    }
}

/// Scoped ownership of a running listener
pub struct ConnectionGuard {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionGuard {
    /// Stop listening and wait until the transport is closed
    pub async fn stop(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await.context("Listener task panicked")?;
        }
        tracing::info!("Stopped listening for events");
        Ok(())
    }

    /// True once the listener loop has exited on its own or been stopped
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================

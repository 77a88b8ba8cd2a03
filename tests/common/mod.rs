// ABOUTME: Shared test doubles: an in-memory SlackApi and a scripted EventTransport
// ABOUTME: Both record what they were asked to do so tests can assert on call order
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use slackbot::event::{Acknowledgement, SocketModeEnvelope};
use slackbot::traits::{
    ApiError, EventTransport, FileUploadParams, HistoryMessage, PostedMessage, SlackApi,
    UploadedFile,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// MockSlackApi
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    PostMessage {
        channel: String,
        text: String,
        thread_ts: Option<String>,
    },
    OpenConversation {
        user: String,
    },
    UploadFile {
        channel: String,
        text: String,
        filename: String,
        title: Option<String>,
        snippet_type: Option<String>,
        thread_ts: Option<String>,
        contents: Vec<u8>,
    },
    DeleteFile {
        file_id: String,
    },
    History {
        channel: String,
        limit: u16,
    },
}

/// Records every call; methods named in `failures` answer with that Slack error code
#[derive(Default)]
pub struct MockSlackApi {
    calls: Mutex<Vec<ApiCall>>,
    failures: HashMap<&'static str, String>,
    history: Vec<HistoryMessage>,
}

impl MockSlackApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, method: &'static str, code: &str) -> Self {
        self.failures.insert(method, code.to_string());
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, call: ApiCall) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.get(method) {
            Some(code) => Err(ApiError::api(method, code.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SlackApi for MockSlackApi {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage, ApiError> {
        self.record(
            "chat.postMessage",
            ApiCall::PostMessage {
                channel: channel.to_string(),
                text: text.to_string(),
                thread_ts: thread_ts.map(str::to_string),
            },
        )?;
        Ok(PostedMessage {
            channel: channel.to_string(),
            ts: "1700000000.000100".to_string(),
        })
    }

    async fn open_conversation(&self, user_id: &str) -> Result<String, ApiError> {
        self.record(
            "conversations.open",
            ApiCall::OpenConversation {
                user: user_id.to_string(),
            },
        )?;
        Ok(format!("D-{}", user_id))
    }

    async fn upload_file(
        &self,
        channel: &str,
        text: &str,
        mut params: FileUploadParams,
    ) -> Result<UploadedFile, ApiError> {
        let filename = params.resolve_filename();
        let contents = params.read_contents().await?;
        self.record(
            "files.completeUploadExternal",
            ApiCall::UploadFile {
                channel: channel.to_string(),
                text: text.to_string(),
                filename: filename.clone(),
                title: params.title.clone(),
                snippet_type: params.snippet_type.clone(),
                thread_ts: params.thread_ts.clone(),
                contents,
            },
        )?;
        Ok(UploadedFile {
            id: "F0UPLOAD".to_string(),
            name: Some(filename),
            title: params.title,
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        self.record(
            "files.delete",
            ApiCall::DeleteFile {
                file_id: file_id.to_string(),
            },
        )
    }

    async fn conversation_history(
        &self,
        channel: &str,
        limit: u16,
    ) -> Result<Vec<HistoryMessage>, ApiError> {
        self.record(
            "conversations.history",
            ApiCall::History {
                channel: channel.to_string(),
                limit,
            },
        )?;
        Ok(self.history.iter().take(limit as usize).cloned().collect())
    }

    fn bot_token(&self) -> &str {
        "xoxb-mock"
    }
}

// =============================================================================
// ScriptedTransport
// =============================================================================

/// What a scripted transport observed, shared with the test after the transport moves
#[derive(Default)]
pub struct TransportLog {
    pub acks: Mutex<Vec<Acknowledgement>>,
    pub connected: AtomicBool,
    pub closed: AtomicBool,
}

impl TransportLog {
    pub fn acks(&self) -> Vec<String> {
        self.acks
            .lock()
            .unwrap()
            .iter()
            .map(|ack| ack.envelope_id.clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Plays back a fixed feed of envelopes
pub struct ScriptedTransport {
    feed: VecDeque<SocketModeEnvelope>,
    /// After the feed is exhausted: stay connected (pending forever) or close
    hold_open: bool,
    fail_connect: bool,
    log: Arc<TransportLog>,
}

impl ScriptedTransport {
    pub fn new(frames: &[String]) -> (Self, Arc<TransportLog>) {
        let feed = frames
            .iter()
            .map(|raw| SocketModeEnvelope::from_json(raw).expect("frame should parse"))
            .collect();
        let log = Arc::new(TransportLog::default());
        (
            Self {
                feed,
                hold_open: false,
                fail_connect: false,
                log: Arc::clone(&log),
            },
            log,
        )
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            anyhow::bail!("connection refused");
        }
        self.log.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_envelope(&mut self) -> Result<Option<SocketModeEnvelope>> {
        match self.feed.pop_front() {
            Some(envelope) => Ok(Some(envelope)),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn acknowledge(&mut self, ack: &Acknowledgement) -> Result<()> {
        self.log.acks.lock().unwrap().push(ack.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Raw Socket Mode frame carrying a message event
pub fn event_frame(
    envelope_id: &str,
    event_id: &str,
    event_time: i64,
    user: &str,
    text: &str,
) -> String {
    serde_json::json!({
        "envelope_id": envelope_id,
        "type": "events_api",
        "accepts_response_payload": false,
        "payload": {
            "type": "event_callback",
            "event_id": event_id,
            "event_time": event_time,
            "event": {
                "type": "message",
                "user": user,
                "text": text,
                "channel": format!("D-{}", user),
            }
        }
    })
    .to_string()
}

/// Poll `condition` until it holds, failing the test after a few seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

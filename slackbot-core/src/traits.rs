// ABOUTME: Seams to the vendor API client and the real-time transport
// ABOUTME: Also defines the value types exchanged over them (uploads, posted messages, history)

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::event::{Acknowledgement, SocketModeEnvelope};

// =============================================================================
// Errors
// =============================================================================

/// Failure of a single Web API call
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Slack answered `ok: false` with a machine-readable code
    #[error("{method} failed: {code}")]
    Api { method: String, code: String },
    /// Request never produced an API answer
    #[error("HTTP error calling {method}: {message}")]
    Http { method: String, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected response from {method}: {message}")]
    InvalidResponse { method: String, message: String },
}

impl ApiError {
    pub fn api(method: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            code: code.into(),
        }
    }

    /// Slack's error code (e.g. `channel_not_found`), when there is one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

// =============================================================================
// Value types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
}

/// A message returned by `conversations.history`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub ts: String,
    pub user: Option<String>,
    pub text: Option<String>,
    pub thread_ts: Option<String>,
}

/// Where the bytes of an upload come from
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Reader(_) => f.write_str("Reader"),
        }
    }
}

/// Parameters for one file upload. Built per call and consumed by it.
#[derive(Debug)]
pub struct FileUploadParams {
    pub source: FileSource,
    pub filename: Option<String>,
    pub filetype: Option<String>,
    pub title: Option<String>,
    pub snippet_type: Option<String>,
    /// Parent message `ts` to upload into a thread
    pub thread_ts: Option<String>,
}

impl FileUploadParams {
    pub fn new(source: FileSource) -> Self {
        Self {
            source,
            filename: None,
            filetype: None,
            title: None,
            snippet_type: None,
            thread_ts: None,
        }
    }

    /// Upload a file from disk, named after its final path component
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = file_name_of(&path);
        Self {
            filename,
            ..Self::new(FileSource::Path(path))
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self::new(FileSource::Bytes(bytes.into())).with_filename(filename)
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_filetype(mut self, filetype: impl Into<String>) -> Self {
        self.filetype = Some(filetype.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet_type(mut self, snippet_type: impl Into<String>) -> Self {
        self.snippet_type = Some(snippet_type.into());
        self
    }

    pub fn with_thread_ts(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    /// Name sent to Slack: explicit filename, else the path's file name, else "file"
    pub fn resolve_filename(&self) -> String {
        if let Some(name) = self.filename.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match &self.source {
            FileSource::Path(path) => file_name_of(path).unwrap_or_else(|| "file".to_string()),
            _ => "file".to_string(),
        }
    }

    /// Read the upload's contents into memory
    pub async fn read_contents(&mut self) -> std::io::Result<Vec<u8>> {
        match &mut self.source {
            FileSource::Path(path) => tokio::fs::read(path.as_path()).await,
            FileSource::Bytes(bytes) => Ok(std::mem::take(bytes)),
            FileSource::Reader(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(buf)
            }
        }
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
}

// =============================================================================
// Web API
// =============================================================================

/// The subset of the Slack Web API this client uses
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `chat.postMessage`
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage, ApiError>;

    /// `conversations.open` for a single user; returns the DM channel id
    async fn open_conversation(&self, user_id: &str) -> Result<String, ApiError>;

    /// Upload a file into `channel` with `text` as the initial comment
    async fn upload_file(
        &self,
        channel: &str,
        text: &str,
        params: FileUploadParams,
    ) -> Result<UploadedFile, ApiError>;

    /// `files.delete`
    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError>;

    /// `conversations.history`, newest first
    async fn conversation_history(
        &self,
        channel: &str,
        limit: u16,
    ) -> Result<Vec<HistoryMessage>, ApiError>;

    /// Token used for authenticated file downloads
    fn bot_token(&self) -> &str;
}

// =============================================================================
// Real-time transport
// =============================================================================

/// A persistent connection that delivers envelopes and accepts acknowledgements
#[async_trait]
pub trait EventTransport: Send {
    async fn connect(&mut self) -> Result<()>;

    /// Next envelope, or `None` once the connection is closed for good
    async fn next_envelope(&mut self) -> Result<Option<SocketModeEnvelope>>;

    async fn acknowledge(&mut self, ack: &Acknowledgement) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

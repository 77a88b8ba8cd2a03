// ABOUTME: Slack Web API client backed by slack-morphism, with reqwest for endpoints it doesn't wrap
// ABOUTME: Implements the SlackApi seam: messages, DMs, external file uploads, deletes and history

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::*;
use slackbot_core::traits::{
    ApiError, FileUploadParams, HistoryMessage, PostedMessage, SlackApi, UploadedFile,
};
use std::sync::Arc;

/// Default base for Web API methods called over plain HTTP
pub const SLACK_API_BASE: &str = "https://slack.com/api";

pub struct SlackWebClient {
    client: Arc<SlackHyperClient>,
    http: reqwest::Client,
    /// Bot OAuth token (xoxb-...) for Web API calls
    bot_token: SlackApiToken,
    /// Raw token value, also used for file downloads and plain-HTTP methods
    raw_token: String,
    api_base: String,
}

impl SlackWebClient {
    pub fn new(bot_token: &str) -> Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("Failed to create Slack HTTP connector")?,
        ));
        let http = reqwest::Client::builder()
            .user_agent(concat!("slackbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            http,
            bot_token: SlackApiToken::new(SlackApiTokenValue(bot_token.to_string())),
            raw_token: bot_token.to_string(),
            api_base: SLACK_API_BASE.to_string(),
        })
    }

    /// Point plain-HTTP method calls at another host (a local stub in tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }
}

/// Reserve-slot request for the external upload flow
fn upload_url_request(
    filename: &str,
    length: usize,
    snippet_type: Option<String>,
) -> SlackApiFilesGetUploadUrlExternalRequest {
    SlackApiFilesGetUploadUrlExternalRequest::new(filename.to_string(), length)
        .opt_snippet_type(snippet_type.map(SlackFileSnippetType))
}

/// Translate a slack-morphism failure into the client's error type
fn map_client_error(method: &str, err: SlackClientError) -> ApiError {
    match err {
        SlackClientError::ApiError(api) => ApiError::api(method, api.code),
        other => ApiError::Http {
            method: method.to_string(),
            message: other.to_string(),
        },
    }
}

/// Common `{ok, error}` envelope of every Web API response
#[derive(Debug, Deserialize)]
struct WebApiStatus {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage, ApiError> {
        let session = self.client.open_session(&self.bot_token);

        let req = SlackApiChatPostMessageRequest::new(
            SlackChannelId::new(channel.to_string()),
            SlackMessageContent::new().with_text(text.to_string()),
        )
        .opt_thread_ts(thread_ts.map(|ts| SlackTs::new(ts.to_string())));

        let resp = session
            .chat_post_message(&req)
            .await
            .map_err(|e| map_client_error("chat.postMessage", e))?;

        Ok(PostedMessage {
            channel: resp.channel.to_string(),
            ts: resp.ts.to_string(),
        })
    }

    async fn open_conversation(&self, user_id: &str) -> Result<String, ApiError> {
        let session = self.client.open_session(&self.bot_token);

        let req = SlackApiConversationsOpenRequest::new()
            .with_users(vec![SlackUserId::new(user_id.to_string())]);
        let resp = session
            .conversations_open(&req)
            .await
            .map_err(|e| map_client_error("conversations.open", e))?;

        Ok(resp.channel.id.to_string())
    }

    async fn upload_file(
        &self,
        channel: &str,
        text: &str,
        mut params: FileUploadParams,
    ) -> Result<UploadedFile, ApiError> {
        let filename = params.resolve_filename();
        let content = params.read_contents().await?;
        let session = self.client.open_session(&self.bot_token);

        // Step 1: reserve an upload slot
        let url_req = upload_url_request(&filename, content.len(), params.snippet_type.clone());
        let slot = session
            .get_upload_url_external(&url_req)
            .await
            .map_err(|e| map_client_error("files.getUploadURLExternal", e))?;

        // Step 2: send the bytes
        let upload_req = SlackApiFilesUploadViaUrlRequest::new(
            slot.upload_url,
            content,
            content_type_for(&filename),
        );
        session
            .files_upload_via_url(&upload_req)
            .await
            .map_err(|e| map_client_error("files.upload", e))?;

        // Step 3: share it into the channel
        let file_id = slot.file_id;
        let complete_req = SlackApiFilesCompleteUploadExternalRequest::new(vec![
            SlackApiFilesComplete::new(file_id.clone()).opt_title(params.title.clone()),
        ])
        .with_channel_id(SlackChannelId::new(channel.to_string()))
        .with_initial_comment(text.to_string())
        .opt_thread_ts(params.thread_ts.clone().map(SlackTs::new));
        session
            .files_complete_upload_external(&complete_req)
            .await
            .map_err(|e| map_client_error("files.completeUploadExternal", e))?;

        tracing::debug!(
            file_id = %file_id,
            filename = %filename,
            channel = %channel,
            "File uploaded"
        );

        Ok(UploadedFile {
            id: file_id.to_string(),
            name: Some(filename),
            title: params.title,
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        const METHOD: &str = "files.delete";

        let resp = self
            .http
            .post(self.method_url(METHOD))
            .bearer_auth(&self.raw_token)
            .form(&[("file", file_id)])
            .send()
            .await
            .map_err(|e| ApiError::Http {
                method: METHOD.to_string(),
                message: e.to_string(),
            })?;

        let status: WebApiStatus = resp.json().await.map_err(|e| ApiError::InvalidResponse {
            method: METHOD.to_string(),
            message: e.to_string(),
        })?;

        if status.ok {
            Ok(())
        } else {
            Err(ApiError::api(
                METHOD,
                status.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }

    async fn conversation_history(
        &self,
        channel: &str,
        limit: u16,
    ) -> Result<Vec<HistoryMessage>, ApiError> {
        let session = self.client.open_session(&self.bot_token);

        let req = SlackApiConversationsHistoryRequest::new()
            .with_channel(SlackChannelId::new(channel.to_string()))
            .with_limit(limit);
        let resp = session
            .conversations_history(&req)
            .await
            .map_err(|e| map_client_error("conversations.history", e))?;

        Ok(resp
            .messages
            .into_iter()
            .map(|msg| HistoryMessage {
                ts: msg.origin.ts.to_string(),
                user: msg.sender.user.map(|u| u.to_string()),
                text: msg.content.text,
                thread_ts: msg.origin.thread_ts.map(|ts| ts.to_string()),
            })
            .collect())
    }

    fn bot_token(&self) -> &str {
        &self.raw_token
    }
}

// =============================================================================
// Tests
// =============================================================================

// ABOUTME: Root library module exposing the Slack client, service and CLI helpers
// ABOUTME: Platform-agnostic pieces live in slackbot-core and are re-exported here

pub mod download;
pub mod logging;
pub mod platform;
pub mod service;
pub mod watchers;

// Re-export platform-agnostic modules from slackbot-core
pub use slackbot_core::config;
pub use slackbot_core::dedup;
pub use slackbot_core::dispatcher;
pub use slackbot_core::event;
pub use slackbot_core::handler;
pub use slackbot_core::paths;
pub use slackbot_core::reply;
pub use slackbot_core::traits;
pub use slackbot_core::utils;

pub use download::FileDownloader;
pub use platform::slack::{SlackWebClient, SocketModeTransport};
pub use service::{ConnectionGuard, DmResult, MessageService};

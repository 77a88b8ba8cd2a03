// ABOUTME: Slack platform implementation: Web API client and Socket Mode transport
// ABOUTME: Both plug into the seams defined by slackbot-core (SlackApi, EventTransport)

pub mod socket_mode;
pub mod web;

pub use socket_mode::{AppsConnectionsOpen, ConnectionUrlSource, FixedUrl, SocketModeTransport};
pub use web::{SlackWebClient, SLACK_API_BASE};

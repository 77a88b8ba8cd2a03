// ABOUTME: Platform module for slackbot
// ABOUTME: Re-exports the Slack implementations of the core client seams

pub mod slack;

pub use slack::{SlackWebClient, SocketModeTransport};

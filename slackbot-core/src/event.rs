// ABOUTME: Lenient serde model of Socket Mode envelopes and Events API callbacks
// ABOUTME: Missing fields default to empty values so malformed payloads never fail to parse

use serde::{Deserialize, Serialize};

/// Payload category for Events API deliveries (as opposed to URL verification
/// and other control callbacks)
pub const EVENT_CALLBACK: &str = "event_callback";

/// Kinds of Socket Mode envelopes this client distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    Hello,
    EventsApi,
    Disconnect,
    Other(String),
}

impl EnvelopeKind {
    fn parse(raw: &str) -> Self {
        match raw {
            "hello" => Self::Hello,
            "events_api" => Self::EventsApi,
            "disconnect" => Self::Disconnect,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One frame received over the Socket Mode WebSocket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketModeEnvelope {
    pub envelope_id: Option<String>,
    #[serde(rename = "type")]
    pub envelope_type: String,
    pub accepts_response_payload: bool,
    pub retry_attempt: u32,
    pub retry_reason: Option<String>,
    /// Why Slack is closing the connection, on `disconnect` envelopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Present for `events_api` envelopes. Other envelope payloads (slash
    /// commands, interactivity) are a different shape and parse as `None`.
    #[serde(deserialize_with = "lenient_payload", skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventCallback>,
}

impl SocketModeEnvelope {
    pub fn kind(&self) -> EnvelopeKind {
        EnvelopeKind::parse(&self.envelope_type)
    }

    /// Parse a raw text frame
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// The acknowledgement owed for this envelope, if it carries an id
    pub fn acknowledgement(&self) -> Option<Acknowledgement> {
        self.envelope_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .map(|id| Acknowledgement::new(id.clone()))
    }
}

/// Any payload that doesn't deserialize as an event callback becomes `None`
fn lenient_payload<'de, D>(deserializer: D) -> Result<Option<EventCallback>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Events API outer callback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCallback {
    #[serde(rename = "type")]
    pub callback_type: String,
    pub event_id: String,
    pub event_time: i64,
    pub team_id: Option<String>,
    pub api_app_id: Option<String>,
    #[serde(deserialize_with = "lenient_event")]
    pub event: MessageEvent,
}

fn lenient_event<'de, D>(deserializer: D) -> Result<MessageEvent, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(MessageEvent::from_value(value))
}

impl EventCallback {
    pub fn is_event_callback(&self) -> bool {
        self.callback_type == EVENT_CALLBACK
    }

    /// Key used to recognize redeliveries of the same event
    pub fn dedup_key(&self) -> String {
        format!("{}_{}", self.event_id, self.event_time)
    }
}

/// The inner event handed to application handlers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub subtype: Option<String>,
    /// A plain user id. Events like `user_change` carry an object here, which
    /// lands in `extra` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub channel_type: Option<String>,
    pub ts: Option<String>,
    pub thread_ts: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub files: Vec<SlackFile>,
    pub bot_id: Option<String>,
    pub bot_profile: Option<BotProfile>,
    /// Fields this model doesn't name
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Named fields that must hold a string (or null) to fill their slot
const STRING_FIELDS: [&str; 9] = [
    "type",
    "subtype",
    "user",
    "text",
    "channel",
    "channel_type",
    "ts",
    "thread_ts",
    "bot_id",
];

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<SlackFile>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<SlackFile>>::deserialize(deserializer)?.unwrap_or_default())
}

impl MessageEvent {
    /// Build an event from any JSON shape.
    ///
    /// Named fields whose values don't fit their slot move into `extra` under
    /// their own key, so every event type Slack sends comes through.
    pub fn from_value(value: serde_json::Value) -> Self {
        let serde_json::Value::Object(mut map) = value else {
            return Self::default();
        };

        let mut displaced = serde_json::Map::new();
        for key in STRING_FIELDS {
            if map.get(key).is_some_and(|v| !v.is_string() && !v.is_null()) {
                displace(&mut map, &mut displaced, key);
            }
        }
        if map
            .get("files")
            .is_some_and(|v| Option::<Vec<SlackFile>>::deserialize(v).is_err())
        {
            displace(&mut map, &mut displaced, "files");
        }
        if map
            .get("bot_profile")
            .is_some_and(|v| Option::<BotProfile>::deserialize(v).is_err())
        {
            displace(&mut map, &mut displaced, "bot_profile");
        }

        let mut event: Self =
            serde_json::from_value(serde_json::Value::Object(map)).unwrap_or_default();
        event.extra.extend(displaced);
        event
    }

    /// App id of the bot that produced this event, when it came from a bot
    pub fn app_id(&self) -> Option<&str> {
        self.bot_profile
            .as_ref()
            .and_then(|profile| profile.app_id.as_deref())
    }

    pub fn is_message(&self) -> bool {
        self.event_type == "message"
    }

    pub fn is_from(&self, user_id: &str) -> bool {
        self.user.as_deref() == Some(user_id)
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

fn displace(
    from: &mut serde_json::Map<String, serde_json::Value>,
    into: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
) {
    if let Some(raw) = from.remove(key) {
        into.insert(key.to_string(), raw);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotProfile {
    pub id: Option<String>,
    pub app_id: Option<String>,
    pub name: Option<String>,
}

/// File attached to a message event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackFile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub filetype: Option<String>,
    pub mimetype: Option<String>,
    pub url_private: Option<String>,
    pub url_private_download: Option<String>,
    pub size: Option<u64>,
}

/// Response written back to Socket Mode for each envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub envelope_id: String,
}

impl Acknowledgement {
    pub fn new(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "envelope_id": self.envelope_id }).to_string()
    }
}

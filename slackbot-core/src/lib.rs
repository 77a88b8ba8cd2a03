// ABOUTME: Platform-agnostic core of the Slack bot client
// ABOUTME: Event model, dedup set, handler registry, dispatcher, reply waiting and API seams

pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod paths;
pub mod reply;
pub mod traits;
pub mod utils;

pub use dedup::OrderedFixedSizeSet;
pub use dispatcher::{DispatchOutcome, DispatchReport, EventDispatcher, SkipReason};
pub use event::{Acknowledgement, EventCallback, MessageEvent, SlackFile, SocketModeEnvelope};
pub use handler::{handler_fn, EventHandler, HandlerId, HandlerRegistry};
pub use reply::{poll_for_reply, PollOutcome, ReplySignal};
pub use traits::{
    ApiError, EventTransport, FileSource, FileUploadParams, HistoryMessage, PostedMessage,
    SlackApi, UploadedFile,
};

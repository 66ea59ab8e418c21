//! Client for a chat service with streamed replies.
//!
//! [`ChatClientCore`] lists organizations and opens chat streams. A chat
//! reply arrives as a line-framed body (`data: <json>\n` per event) which
//! [`streaming::FrameDecoder`] turns into [`ChatEvent`]s, one at a time, as
//! the consumer polls the returned [`ChatEventStream`]. The client's
//! [`RequestTracker`] exposes whether an operation is in flight and the
//! error of the most recent one.

pub mod client;
pub mod config;
pub mod constants;
pub mod errors;
pub mod http;
pub mod http_client;
pub mod lifecycle;
pub mod streaming;

pub use client::ChatClientCore;
pub use config::ClientConfig;
pub use errors::{ClientError, FrameDecodeError};
pub use http::*;
pub use lifecycle::{OperationGuard, RequestState, RequestTracker};
pub use streaming::{ChatEvent, ChatEventStream};

use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use pin_project::pin_project;

use super::types::ChatEvent;
use crate::errors::ClientError;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<ChatEvent, ClientError>> + Send>>;

/// Lazy, ordered sequence of events from one chat response.
///
/// Each poll either hands out an already decoded event or awaits the next
/// body chunk; nothing is read ahead. The sequence ends when the body is
/// exhausted or right after a single `Err(ClientError::Stream(_))` item.
/// It cannot be restarted.
///
/// Dropping it before the end closes the response body and ends the
/// operation on the client's tracker without recording an error.
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct ChatEventStream {
    #[pin]
    events: EventStream,
    status: u16,
    response_headers: HashMap<String, String>,
    time_to_headers: Duration,
}

impl ChatEventStream {
    pub fn new(
        events: EventStream,
        status: u16,
        response_headers: HashMap<String, String>,
        time_to_headers: Duration,
    ) -> Self {
        Self {
            events,
            status,
            response_headers,
            time_to_headers,
        }
    }

    /// HTTP status the stream was opened with.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn response_headers(&self) -> &HashMap<String, String> {
        &self.response_headers
    }

    /// Time from sending the request until the response headers arrived.
    pub fn time_to_headers(&self) -> Duration {
        self.time_to_headers
    }
}

impl Stream for ChatEventStream {
    type Item = Result<ChatEvent, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().events.poll_next(cx)
    }
}

impl std::fmt::Debug for ChatEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEventStream")
            .field("status", &self.status)
            .field("time_to_headers", &self.time_to_headers)
            .finish_non_exhaustive()
    }
}

//! Streaming request handler
//!
//! Opens a line-framed chat response and turns its body into a
//! [`ChatEventStream`]. The operation guard travels with the stream, so the
//! tracker stays busy exactly as long as the response is being consumed.

use std::collections::HashMap;
use std::time::Instant;

use async_stream::stream;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::constants::EVENT_STREAM_CONTENT_TYPE;
use crate::errors::ClientError;
use crate::http::ChatRequest;
use crate::http_client::ensure_successful_response;
use crate::lifecycle::OperationGuard;
use crate::streaming::{ChatEventStream, FrameDecoder};

/// Sends `payload` to `url` and returns the event stream of the response.
///
/// Failures before the body is open are returned here, after being recorded
/// through `guard`; no events exist in that case.
pub async fn stream_request(
    client: &Client,
    url: Url,
    payload: &ChatRequest,
    guard: OperationGuard,
) -> Result<ChatEventStream, ClientError> {
    let start_time = Instant::now();
    tracing::debug!("opening chat stream: POST {}", url);

    let response = match client
        .post(url)
        .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
        .json(payload)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return Err(guard.fail(ClientError::from(e))),
    };

    let response = match ensure_successful_response(response).await {
        Ok(response) => response,
        Err(e) => return Err(guard.fail(e)),
    };

    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Err(guard.fail(ClientError::http(
            status.as_u16(),
            "Response body is not readable",
        )));
    }

    let mut headers_map = HashMap::new();
    for (name, value) in response.headers().iter() {
        headers_map.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    let time_to_headers = start_time.elapsed();
    tracing::debug!(
        "chat stream open with status {} after {:?}",
        status,
        time_to_headers
    );

    let events = Box::pin(stream! {
        let mut bytes_stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let mut chunks_read: usize = 0;

        loop {
            // hand out everything already decoded before reading again
            while let Some(event) = decoder.next_event() {
                yield Ok(event);
            }

            match bytes_stream.next().await {
                Some(Ok(chunk)) => {
                    chunks_read += 1;
                    if let Err(e) = decoder.process_bytes(&chunk) {
                        tracing::error!("chat stream decode failed after {} chunks: {}", chunks_read, e);
                        while let Some(event) = decoder.next_event() {
                            yield Ok(event);
                        }
                        yield Err(guard.fail(ClientError::Stream(format!("decode error: {}", e))));
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("chat stream read failed after {} chunks: {}", chunks_read, e);
                    yield Err(guard.fail(ClientError::from_body_error(e)));
                    return;
                }
                None => {
                    if decoder.was_processing() {
                        tracing::debug!("body ended with buffered input");
                    }
                    if let Err(e) = decoder.finish() {
                        tracing::error!("chat stream ended mid-character: {}", e);
                        yield Err(guard.fail(ClientError::Stream(format!("decode error: {}", e))));
                        return;
                    }
                    while let Some(event) = decoder.next_event() {
                        yield Ok(event);
                    }
                    break;
                }
            }
        }

        tracing::debug!("chat stream completed after {} chunks", chunks_read);
        guard.finish();
    });

    Ok(ChatEventStream::new(
        events,
        status.as_u16(),
        headers_map,
        time_to_headers,
    ))
}

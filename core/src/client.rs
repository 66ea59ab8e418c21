use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::constants::*;
use crate::errors::ClientError;
use crate::http::{ChatConversation, ChatRequest, CreateChatRequest, Organization};
use crate::http_client::{build_http_client, send_json};
use crate::lifecycle::{OperationGuard, RequestState, RequestTracker};
use crate::streaming::request_handler;
use crate::streaming::ChatEventStream;

/// Client for the chat service.
///
/// Every operation runs under the client's [`RequestTracker`]: it is busy
/// from the call until the result (or, for streams, the last event) is
/// observed, and the last error reflects only the most recent operation.
/// One operation runs at a time; a call made while another is in flight is
/// rejected with [`ClientError::Busy`].
///
/// # Example
///
/// ```rust,no_run
/// use claude_chat_client_core::{ChatClientCore, ClientConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ChatClientCore::new(ClientConfig::new("http://127.0.0.1:8000"))?;
///
/// let organizations = client.get_organizations().await?;
/// let mut events = client.stream_chat(&organizations[0].id, "Hello!").await?;
/// while let Some(event) = events.next().await {
///     println!("{}", event?.as_value());
/// }
/// assert!(!client.is_busy());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChatClientCore {
    config: Arc<ClientConfig>,
    base_url: Url,
    http_client: Client,
    tracker: RequestTracker,
}

impl ChatClientCore {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.validate()?;
        let http_client = build_http_client(&config)?;

        Ok(ChatClientCore {
            config: Arc::new(config),
            base_url,
            http_client,
            tracker: RequestTracker::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Handle to this client's busy flag and last error.
    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    pub fn state(&self) -> RequestState {
        self.tracker.state()
    }

    pub fn is_busy(&self) -> bool {
        self.tracker.is_busy()
    }

    pub fn last_error(&self) -> Option<String> {
        self.tracker.last_error()
    }

    /// `GET /api/organizations`.
    pub async fn get_organizations(&self) -> Result<Vec<Organization>, ClientError> {
        let organizations: Vec<Organization> = self
            .json_call(&[API_SEGMENT, ORGANIZATIONS_SEGMENT], |client, url| {
                client.get(url)
            })
            .await?;
        tracing::debug!("fetched {} organizations", organizations.len());
        Ok(organizations)
    }

    /// `GET /api/organizations/{org_id}/chats`.
    pub async fn list_chats(&self, org_id: &str) -> Result<Vec<ChatConversation>, ClientError> {
        let chats: Vec<ChatConversation> = self
            .json_call(
                &[API_SEGMENT, ORGANIZATIONS_SEGMENT, org_id, CHATS_SEGMENT],
                |client, url| client.get(url),
            )
            .await?;
        tracing::debug!("fetched {} chats of {}", chats.len(), org_id);
        Ok(chats)
    }

    /// `POST /api/organizations/{org_id}/chats`: creates an empty
    /// conversation whose `uuid` can be passed to [`Self::stream_message`].
    pub async fn create_chat(
        &self,
        org_id: &str,
        request: &CreateChatRequest,
    ) -> Result<ChatConversation, ClientError> {
        self.json_call(
            &[API_SEGMENT, ORGANIZATIONS_SEGMENT, org_id, CHATS_SEGMENT],
            |client, url| client.post(url).json(request),
        )
        .await
    }

    /// `GET /api/organizations/{org_id}/chats/{chat_id}`: the conversation
    /// with its messages, as returned by the service.
    pub async fn get_chat(
        &self,
        org_id: &str,
        chat_id: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.json_call(
            &[API_SEGMENT, ORGANIZATIONS_SEGMENT, org_id, CHATS_SEGMENT, chat_id],
            |client, url| client.get(url),
        )
        .await
    }

    /// `DELETE /api/organizations/{org_id}/chats` with the ids as a JSON array.
    pub async fn delete_chats(
        &self,
        org_id: &str,
        chat_ids: &[String],
    ) -> Result<serde_json::Value, ClientError> {
        if chat_ids.is_empty() {
            return Err(ClientError::InvalidParameter(
                "at least one chat id is required".to_string(),
            ));
        }
        self.json_call(
            &[API_SEGMENT, ORGANIZATIONS_SEGMENT, org_id, CHATS_SEGMENT],
            |client, url| client.delete(url).json(chat_ids),
        )
        .await
    }

    /// `POST /api/chat/{org_id}`: starts a chat and streams the reply.
    ///
    /// `org_id` is not validated; it is sent as one path segment.
    pub async fn stream_chat(
        &self,
        org_id: &str,
        message: &str,
    ) -> Result<ChatEventStream, ClientError> {
        let guard = self.tracker.try_begin()?;
        let url = match self.endpoint_url(&[API_SEGMENT, CHAT_SEGMENT, org_id]) {
            Ok(url) => url,
            Err(e) => return Err(guard.fail(e)),
        };
        request_handler::stream_request(&self.http_client, url, &ChatRequest::new(message), guard)
            .await
    }

    /// `POST /api/organizations/{org_id}/chats/{chat_id}/messages`: sends a
    /// message into an existing conversation and streams the reply.
    pub async fn stream_message(
        &self,
        org_id: &str,
        chat_id: &str,
        message: &str,
    ) -> Result<ChatEventStream, ClientError> {
        let guard = self.tracker.try_begin()?;
        let url = match self.endpoint_url(&[
            API_SEGMENT,
            ORGANIZATIONS_SEGMENT,
            org_id,
            CHATS_SEGMENT,
            chat_id,
            MESSAGES_SEGMENT,
        ]) {
            Ok(url) => url,
            Err(e) => return Err(guard.fail(e)),
        };
        request_handler::stream_request(&self.http_client, url, &ChatRequest::new(message), guard)
            .await
    }

    /// `GET /api/health`. A non-2xx answer (e.g. the service has no session
    /// configured) is a transport error.
    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        self.json_call(&[API_SEGMENT, HEALTH_SEGMENT], |client, url| client.get(url))
            .await
    }

    // One request/response operation under the tracker.
    async fn json_call<R, F>(&self, segments: &[&str], build: F) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
        F: FnOnce(&Client, Url) -> RequestBuilder,
    {
        let guard = self.tracker.try_begin()?;
        let result = match self.endpoint_url(segments) {
            Ok(url) => {
                tracing::debug!("request to {}", url);
                send_json(build(&self.http_client, url)).await
            }
            Err(e) => Err(e),
        };
        finish_operation(guard, result)
    }

    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidParameter(format!(
                    "Base URL {} cannot carry endpoint paths",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn finish_operation<T>(guard: OperationGuard, result: Result<T, ClientError>) -> Result<T, ClientError> {
    match result {
        Ok(value) => {
            guard.finish();
            Ok(value)
        }
        Err(e) => Err(guard.fail(e)),
    }
}

impl std::fmt::Debug for ChatClientCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClientCore")
            .field("base_url", &self.base_url.as_str())
            .field("state", &self.tracker.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ChatClientCore {
        ChatClientCore::new(ClientConfig::new(base_url)).unwrap()
    }

    #[test]
    fn test_endpoint_url_encodes_segments() {
        let client = client("http://localhost:8000");
        let url = client
            .endpoint_url(&[API_SEGMENT, CHAT_SEGMENT, "org/1 ?x"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/chat/org%2F1%20%3Fx");
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let client = client("https://example.com/proxy/");
        let url = client
            .endpoint_url(&[API_SEGMENT, ORGANIZATIONS_SEGMENT])
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/proxy/api/organizations");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = ChatClientCore::new(ClientConfig::new("localhost:8000")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidParameter(_)));
    }

    #[test]
    fn test_clones_share_tracker() {
        let client = client("http://localhost:8000");
        let clone = client.clone();
        client.tracker().begin();
        assert!(clone.is_busy());
        client.tracker().end();
        assert!(!clone.is_busy());
    }
}

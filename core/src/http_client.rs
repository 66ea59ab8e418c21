use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::constants::*;
use crate::errors::ClientError;

/// Builds the HTTP client shared by all operations of one chat client.
pub fn build_http_client(config: &ClientConfig) -> Result<Client, ClientError> {
    Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .tcp_nodelay(true)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| ClientError::transport(format!("Failed to create HTTP client: {}", e)))
}

/// Turns a non-2xx response into a transport error carrying the status and
/// whatever text the server sent.
pub(crate) async fn ensure_successful_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!("request rejected with status {}", status);
        Err(ClientError::http(
            status.as_u16(),
            format!("API request failed with status {}: {}", status, error_text),
        ))
    } else {
        Ok(response)
    }
}

/// Sends a plain request/response call and decodes its JSON body.
pub(crate) async fn send_json<R>(request: RequestBuilder) -> Result<R, ClientError>
where
    R: DeserializeOwned,
{
    let response = request.send().await?;
    let response = ensure_successful_response(response).await?;

    response
        .json::<R>()
        .await
        .map_err(|e| ClientError::Serialization(format!("Failed to parse response JSON: {}", e)))
}

use std::time::Duration;

// Request timeout constants
pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 3600.0;
pub const MIN_REQUEST_TIMEOUT_S: f64 = 1.0;
pub const MAX_REQUEST_TIMEOUT_S: f64 = 3600.0;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Connection pool
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const POOL_MAX_IDLE_PER_HOST: usize = 8;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const USER_AGENT: &str = concat!("claude-chat-client/", env!("CARGO_PKG_VERSION"));

// Environment variables read by `ClientConfig::from_env`
pub const BASE_URL_ENV_VAR: &str = "CLAUDE_CHAT_BASE_URL";
pub const TIMEOUT_ENV_VAR: &str = "CLAUDE_CHAT_TIMEOUT_S";

// Endpoint path segments, appended to the base URL
pub const API_SEGMENT: &str = "api";
pub const ORGANIZATIONS_SEGMENT: &str = "organizations";
pub const CHAT_SEGMENT: &str = "chat";
pub const CHATS_SEGMENT: &str = "chats";
pub const MESSAGES_SEGMENT: &str = "messages";
pub const HEALTH_SEGMENT: &str = "health";

// Framing
pub const FRAME_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

// Error messages
pub const BUSY_ERROR_MESSAGE_DETAIL: &str = "another request is already in flight on this client";

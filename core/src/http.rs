use serde::{Deserialize, Serialize};

/// An organization the chat service can be used with.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// Body of every chat request. The message is forwarded verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of a create-chat request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateChatRequest {
    pub chat_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_uuid: Option<String>,
}

impl CreateChatRequest {
    pub fn new(chat_name: impl Into<String>) -> Self {
        Self {
            chat_name: chat_name.into(),
            project_uuid: None,
        }
    }

    pub fn with_project(mut self, project_uuid: impl Into<String>) -> Self {
        self.project_uuid = Some(project_uuid.into());
        self
    }
}

/// Summary of one conversation, as listed or created by the service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatConversation {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Outbound body for `POST /api/chat`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequestPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequestPayload {
    pub fn single_turn(model: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::user(prompt)],
            stream: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChunkMessage {
    pub content: Option<String>,
}

/// One NDJSON line of a streamed reply. Ollama reports mid-stream failures
/// as `{"error": "..."}` instead of a message.
#[derive(Debug, Deserialize)]
pub struct ChatResponseChunk {
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    pub error: Option<String>,
}

use serde::{Deserialize, Serialize};

/// Body of the streaming chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub prompt: String,
}

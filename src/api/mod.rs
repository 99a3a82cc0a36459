//! Wire payloads for the OpenAI-compatible endpoints and the client that
//! sends them.

pub mod client;
pub mod error;

use serde::{Deserialize, Serialize};

pub use client::ApiClient;
pub use error::ApiError;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize, Debug)]
pub struct ChatCompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChatCompletionChoice {
    #[serde(default)]
    pub message: Option<ChatCompletionMessage>,
}

#[derive(Deserialize, Debug)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatCompletionChoice>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if the API sent any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
    }
}

#[derive(Serialize, Debug)]
pub struct ImageRequest {
    pub prompt: String,
    pub n: u32,
    pub size: String,
}

#[derive(Deserialize, Debug)]
pub struct ImageData {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ImageResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub text: Option<String>,
}

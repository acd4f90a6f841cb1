use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatRequest {
    session_id: String,
    message: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChatReply {
    pub session_id: String,
    pub message: String,
    pub language: Option<String>,
    pub timestamp: String,
}

/// Client for the assistant backend's chat endpoint.
#[derive(Clone)]
pub struct AssistantClient {
    client: Client,
    base_url: String,
}

impl AssistantClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send one user message for the given conversation and wait for the
    /// assistant's reply.
    pub async fn send(&self, session_id: i64, message: &str) -> Result<ChatReply> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            session_id: session_id.to_string(),
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|_| anyhow!("Cannot connect to server. Please try again later."))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Assistant request failed with status: {}",
                response.status()
            ));
        }

        let reply: ChatReply = response.json().await?;
        Ok(reply)
    }
}

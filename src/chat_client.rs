use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Errors raised while talking to the chat endpoint.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to chat endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid chat endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("chat endpoint returned malformed JSON: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

/// Body of a `POST` to the chat endpoint.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

/// A response that made it back from the server, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

impl RawReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Parsed body of a successful response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub answer: Option<String>,
}

impl ChatReply {
    /// Parse a success body. Any JSON value is accepted; only a non-empty
    /// string `answer` field counts as an answer.
    pub fn from_body(body: &str) -> Result<Self, ClientError> {
        let value: Value = serde_json::from_str(body)?;
        let answer = value
            .get("answer")
            .and_then(Value::as_str)
            .filter(|answer| !answer.is_empty())
            .map(str::to_string);
        Ok(Self { answer })
    }
}

/// The single network call the chat widget makes.
#[async_trait]
pub trait ChatBackend {
    /// Send one message. `Ok` means the server answered with some status;
    /// `Err` means the exchange never completed.
    async fn post_message(&self, message: &str) -> Result<RawReply, ClientError>;
}

pub struct ChatClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    pub fn with_client(endpoint: &str, client: reqwest::Client) -> Result<Self, ClientError> {
        let endpoint = Url::parse(endpoint)?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn post_message(&self, message: &str) -> Result<RawReply, ClientError> {
        debug!("Posting message to {}: {:?}", self.endpoint, message);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ChatRequest { message })
            .send()
            .await?;

        let status = response.status();
        let body = if status.is_success() {
            response.text().await?
        } else {
            // Error bodies are best-effort.
            match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Could not read error body for status {}: {}", status, e);
                    String::new()
                }
            }
        };

        debug!("Chat endpoint answered {} with {} bytes", status, body.len());

        Ok(RawReply {
            status: status.as_u16(),
            body,
        })
    }
}

use crate::config::{Settings, TEMPERATURE};
use crate::conversation::Message;
use crate::event::AppEvent;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use thiserror::Error;
use tokio::runtime::Handle;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API Error: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Error: malformed completion response: {0}")]
    MalformedResponse(String),
    #[error("Error: tokio runtime unavailable: {0}")]
    Runtime(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    model: &'a str,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Turns an HTTP status and raw body into the assistant reply.
fn parse_reply(status: StatusCode, body: String) -> Result<String, CompletionError> {
    if status != StatusCode::OK {
        return Err(CompletionError::Status { status, body });
    }

    let response: ChatResponse = serde_json::from_str(&body)
        .map_err(|err| CompletionError::MalformedResponse(err.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| CompletionError::MalformedResponse("response has no choices".to_string()))
}

#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    settings: Settings,
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
}

impl CompletionClient {
    pub fn new(settings: Settings, tx: mpsc::Sender<AppEvent>) -> Result<Self, CompletionError> {
        let runtime_handle =
            Handle::try_current().map_err(|err| CompletionError::Runtime(err.to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            settings,
            tx,
            runtime_handle,
        })
    }

    /// Runs [`CompletionClient::complete`] on the runtime and posts the outcome
    /// back as [`AppEvent::CompletionFinished`].
    pub fn send(&self, history: Vec<Message>) {
        let client = self.clone();
        self.runtime_handle.spawn(async move {
            let outcome = client.complete(&history).await;
            let event = AppEvent::CompletionFinished(outcome);
            if client.tx.send(event).is_err() {
                warn!("completion finished after the window closed");
            }
        });
    }

    pub async fn complete(&self, history: &[Message]) -> Result<String, CompletionError> {
        info!(
            "requesting completion: model={} messages={}",
            self.settings.model,
            history.len()
        );

        let request = ChatRequest {
            messages: history,
            model: &self.settings.model,
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .inspect_err(|err| warn!("completion transport failure: {err}"))?;

        let status = response.status();
        let body = response.text().await?;
        debug!("completion response status={status} body={body}");

        match parse_reply(status, body) {
            Ok(reply) => {
                info!("completion received: {} characters", reply.len());
                Ok(reply)
            }
            Err(err) => {
                warn!("completion failed: status={status}: {err}");
                Err(err)
            }
        }
    }
}

//! HTTP client for the command server.
//!
//! One network call per command, no retries — retry policy lives in
//! [`crate::command::CommandService`] so restart-and-retry decisions can be
//! coordinated with the process supervisor.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::AppError;
use crate::model::{CommandRequest, CommandResult};

/// Seam for dispatching a single command. Implemented by [`HttpCommandClient`]
/// in production and by fakes in tests.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Exactly one network attempt. `Transport` means the server was
    /// unreachable; `Protocol` means it answered with something unparsable.
    async fn send(
        &self,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandResult, AppError>;
}

pub struct HttpCommandClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCommandClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

/// Build `{base}/{speaker}/{action}[/{arg}...]` with percent-encoded
/// path segments.
pub fn build_command_url(base_url: &str, request: &CommandRequest) -> Result<Url, AppError> {
    let mut url = Url::parse(base_url).map_err(|e| AppError::Protocol {
        message: format!("invalid command server URL '{base_url}': {e}"),
    })?;
    {
        let mut segments = url.path_segments_mut().map_err(|()| AppError::Protocol {
            message: format!("command server URL '{base_url}' cannot carry a path"),
        })?;
        segments.push(&request.speaker).push(&request.action);
        for arg in &request.args {
            segments.push(arg);
        }
    }
    Ok(url)
}

/// Parse a response body into a `CommandResult`. Pure; unit-testable without
/// a server.
pub fn parse_command_response(body: &str) -> Result<CommandResult, AppError> {
    serde_json::from_str::<CommandResult>(body).map_err(|e| AppError::Protocol {
        message: format!("unparsable command response: {e}"),
    })
}

#[async_trait]
impl CommandTransport for HttpCommandClient {
    async fn send(
        &self,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandResult, AppError> {
        let url = build_command_url(&self.base_url, request)?;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::Transport {
                message: if e.is_timeout() {
                    format!("command '{}' timed out after {timeout:?}", request.action)
                } else {
                    e.to_string()
                },
            })?;

        let body = response.text().await.map_err(|e| AppError::Transport {
            message: format!("failed to read command response: {e}"),
        })?;

        parse_command_response(&body)
    }
}

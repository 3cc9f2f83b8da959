//! Pass-through to an Azure OpenAI chat deployment.
//!
//! Requests are sent with `"stream": true`; the SSE reply is read as it
//! arrives and each `choices[].delta.content` becomes one increment.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::CompletionSource;
use super::select::AzureTarget;
use crate::cancel::CancelSignal;
use crate::error::GenerationError;
use crate::framing::LineBuffer;
use crate::history::ConversationHistory;
use crate::increment::{Increment, IncrementStream};

#[derive(Debug, Clone)]
pub struct AzureOpenAiSource {
    client: reqwest::Client,
    target: AzureTarget,
}

impl AzureOpenAiSource {
    pub fn new(target: AzureTarget) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("safecontract/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client, target }
    }

    /// Chat-completions URL of the configured deployment.
    pub fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.target.endpoint.trim_end_matches('/'),
            self.target.deployment,
            self.target.api_version,
        )
    }
}

impl CompletionSource for AzureOpenAiSource {
    fn name(&self) -> &'static str {
        "azure-openai"
    }

    fn stream(&self, history: ConversationHistory, cancel: CancelSignal) -> IncrementStream {
        let request = self
            .client
            .post(self.url())
            .header("api-key", &self.target.api_key)
            .json(&json!({
                "messages": history.turns(),
                "stream": true,
            }));

        Box::pin(async_stream::stream! {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                response = request.send() => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    yield Err(GenerationError::Http(e));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), "azure openai rejected the request");
                yield Err(GenerationError::Status { status: status.as_u16(), body });
                return;
            }

            let mut body = Box::pin(response.bytes_stream());
            let mut lines = LineBuffer::default();
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("azure openai stream cancelled");
                        return;
                    }
                    chunk = body.next() => chunk,
                };
                let Some(chunk) = chunk else { break };
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(GenerationError::Http(e));
                        return;
                    }
                };
                let completed = match lines.push(&chunk) {
                    Ok(completed) => completed,
                    Err(e) => {
                        yield Err(GenerationError::Frame(e));
                        return;
                    }
                };
                for line in completed {
                    match parse_event_line(&line) {
                        Ok(SseLine::Delta(increment)) => {
                            yield Ok(increment);
                        }
                        Ok(SseLine::Done) => return,
                        Ok(SseLine::Skip) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            // The final event may arrive without its terminating newline.
            let line = match lines.finish() {
                Ok(Some(line)) => line,
                Ok(None) => return,
                Err(e) => {
                    yield Err(GenerationError::Frame(e));
                    return;
                }
            };
            match parse_event_line(&line) {
                Ok(SseLine::Delta(increment)) => {
                    yield Ok(increment);
                }
                Ok(SseLine::Done | SseLine::Skip) => {}
                Err(e) => {
                    yield Err(e);
                }
            }
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Delta(Increment),
    Done,
    Skip,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

fn parse_event_line(line: &str) -> Result<SseLine, GenerationError> {
    let Some(data) = line.strip_prefix("data:") else {
        // Comments, `event:` and `id:` fields carry nothing we use.
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }

    let event: StreamEvent = serde_json::from_str(data).map_err(GenerationError::Event)?;
    let text: String = event
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();
    Ok(Increment::new(text).map_or(SseLine::Skip, SseLine::Delta))
}

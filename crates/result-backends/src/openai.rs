// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::time::Duration;

use agent_relayer_types::invocation::{RequestDescriptor, ResultPayload};
use agent_relayer_utils::{Error, Result};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// How much of an error response body ends up in the error message.
const MAX_ERROR_BODY: usize = 256;

/// A ResultProducer backed by an OpenAI compatible chat completions API.
///
/// The prompt is sent as a single user message with temperature `0`, the
/// first choice is the output.
#[derive(Clone, TypedBuilder)]
pub struct OpenAiResultProducer {
    /// Bearer token for the API.
    #[builder(setter(into))]
    api_key: String,
    /// Model name, e.g. `gpt-4o-mini`.
    #[builder(setter(into))]
    model: String,
    /// The chat completions endpoint.
    endpoint: url::Url,
    #[builder(default = Arc::new(default_client()))]
    client: Arc<reqwest::Client>,
}

fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_default()
}

impl std::fmt::Debug for OpenAiResultProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiResultProducer")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: u8,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts the first choice's content from a chat completions response.
fn parse_completion(body: &str) -> Result<String> {
    let completion: ChatCompletion = serde_json::from_str(body)?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::GenerationFailed {
            reason: "response has no choices".into(),
        })
}

/// Client errors other than timeouts and rate limits fail the same way on
/// every attempt (bad key, unknown model, malformed request).
fn status_error(status: reqwest::StatusCode, body: &str) -> Error {
    let reason = format!("{status}: {}", truncate(body));
    let retriable = matches!(
        status,
        reqwest::StatusCode::TOO_MANY_REQUESTS
            | reqwest::StatusCode::REQUEST_TIMEOUT
    );
    if status.is_client_error() && !retriable {
        Error::GenerationRejected { reason }
    } else {
        Error::GenerationFailed { reason }
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait::async_trait]
impl super::ResultProducer for OpenAiResultProducer {
    #[tracing::instrument(
        skip_all,
        fields(invocation_id = ?descriptor.invocation_id, model = %self.model)
    )]
    async fn produce(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResultPayload> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &descriptor.prompt,
            }],
            temperature: 0,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(%status, "generation request rejected");
            return Err(status_error(status, &body));
        }
        let output = parse_completion(&body)?;
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::ResultBackend,
            backend = "OpenAi",
            invocation_id = ?descriptor.invocation_id,
            output_len = output.len(),
        );
        Ok(ResultPayload {
            agent_id: descriptor.agent_id,
            invocation_id: descriptor.invocation_id,
            output,
        })
    }
}

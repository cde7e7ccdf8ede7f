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

use std::time::Duration;

use ethers::providers::{HttpClientError, JsonRpcError, RetryPolicy};

/// Implements [RetryPolicy] that will retry requests that errored with
/// status code 429 i.e. TOO_MANY_REQUESTS
///
/// Public RPC nodes often fail with a `"header not found"` rpc error which is
/// apparently linked to load balancing, which are retried as well.
#[derive(Debug)]
pub struct AgentHttpRetryPolicy {
    err_regex: regex::Regex,
}

impl AgentHttpRetryPolicy {
    /// Creates the policy.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            err_regex: regex::Regex::new(
                r"(?mixU)\b(?:rate|limit|429|Too \s Many \s Requests)\b",
            )?,
        })
    }

    /// Creates the policy, boxed for [`ethers::providers::RetryClientBuilder::build`].
    pub fn boxed() -> Result<Box<Self>, regex::Error> {
        Self::new().map(Box::new)
    }
}

fn should_retry_json_rpc_error(err: &JsonRpcError) -> bool {
    let JsonRpcError { code, message, .. } = err;
    // alchemy throws it this way
    if *code == 429 {
        return true;
    }

    // infura: `exceeded project rate limit`
    if *code == -32005 {
        return true;
    }

    // alternative alchemy error for specific IPs
    if *code == -32016 && message.contains("rate limit") {
        return true;
    }

    match message.as_str() {
        // load balancer issue, see also <https://github.com/MetaMask/metamask-extension/issues/7234>
        "header not found" => true,
        // out of budget for the day and ratelimited
        "daily request count exceeded, request rate limited" => true,
        _ => false,
    }
}

// check json rpc error in the raw response text
fn should_retry_json_rpc_error_from_text(
    text: &str,
    err_regex: &regex::Regex,
) -> bool {
    // some providers send invalid JSON RPC in the error case (no `id:u64`), but the
    // text should be a `JsonRpcError`
    #[derive(serde::Deserialize)]
    struct Resp {
        error: JsonRpcError,
    }

    if let Ok(resp) = serde_json::from_str::<Resp>(text) {
        return should_retry_json_rpc_error(&resp.error);
    }

    let err_text = text.to_lowercase();

    // last resort, some providers send the error message in the text
    // and the text itself is not a valid json response either.
    let should_retry = err_regex.is_match(&err_text);

    tracing::event!(
        target: agent_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %agent_relayer_utils::probe::Kind::Retry,
        should_retry = should_retry,
        error = %err_text,
    );
    should_retry
}

impl RetryPolicy<HttpClientError> for AgentHttpRetryPolicy {
    fn should_retry(&self, error: &HttpClientError) -> bool {
        tracing::debug!("should_retry: {:?}", error);
        match error {
            HttpClientError::ReqwestError(err) => {
                err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
            }
            HttpClientError::JsonRpcError(err) => {
                should_retry_json_rpc_error(err)
            }
            HttpClientError::SerdeJson { text, .. } => {
                should_retry_json_rpc_error_from_text(text, &self.err_regex)
            }
        }
    }

    fn backoff_hint(&self, error: &HttpClientError) -> Option<Duration> {
        const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

        if let HttpClientError::JsonRpcError(json_rpc_error) = error {
            if let Some(data) = &json_rpc_error.data {
                // if daily rate limit exceeded, infura returns the requested backoff in the error
                // response
                let Some(backoff_seconds) =
                    data.get("rate").and_then(|v| v.get("backoff_seconds"))
                else {
                    return Some(DEFAULT_BACKOFF);
                };
                if let Some(seconds) = backoff_seconds.as_u64() {
                    return Some(Duration::from_secs(seconds));
                }
                if let Some(seconds) = backoff_seconds.as_f64() {
                    return Some(Duration::from_secs(seconds as u64 + 1));
                }
            }
        }

        Some(DEFAULT_BACKOFF)
    }
}

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

use agent_relayer_config::AgentRelayerConfig;

/// Timing and sizing of the [`InvocationPipeline`](crate::InvocationPipeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Sleep between two polls once synced.
    pub poll_interval: Duration,
    /// First back-off after a failed chain read.
    pub error_backoff: Duration,
    /// Back-off cap.
    pub max_error_backoff: Duration,
    /// Upper bound of every chain read.
    pub rpc_timeout: Duration,
    /// Largest block range queried at once.
    pub max_blocks_per_step: u64,
    /// Replay from this block instead of starting at the head.
    pub start_block: Option<u64>,
    /// Distinct invocations dispatched at the same time.
    pub max_concurrent: usize,
    /// Extra attempts for a dispatch failing with a transient error.
    pub max_retries: usize,
    /// Sleep between two attempts of the same dispatch.
    pub retry_interval: Duration,
    /// How often sync progress is logged, never when `None`.
    pub print_progress_interval: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            error_backoff: Duration::from_secs(5),
            max_error_backoff: Duration::from_secs(60),
            rpc_timeout: Duration::from_secs(30),
            max_blocks_per_step: 500,
            start_block: None,
            max_concurrent: 1,
            max_retries: 3,
            retry_interval: Duration::from_secs(1),
            print_progress_interval: Some(Duration::from_secs(7)),
        }
    }
}

impl From<&AgentRelayerConfig> for PipelineConfig {
    fn from(config: &AgentRelayerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            error_backoff: config.error_backoff(),
            max_error_backoff: config.max_error_backoff(),
            rpc_timeout: config.rpc_timeout(),
            max_blocks_per_step: config.max_blocks_per_step,
            start_block: config.start_block,
            max_concurrent: config.dispatch.max_concurrent,
            max_retries: config.dispatch.max_retries,
            retry_interval: config.dispatch.retry_interval(),
            print_progress_interval: config.print_progress_interval(),
        }
    }
}

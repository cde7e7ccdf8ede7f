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

#![warn(missing_docs)]

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the agent relayer.
//!
//! ## Overview
//!
//! The configuration is read from `*.toml` / `*.json` files and from the
//! environment. Possible configuration include:
//! * `rpc_url`, `chain_id`, `private_key`, `call_manager_address`: where to
//!   watch for invocations and who confirms them.
//! * `mock_mode`, `openai_api_key`: how results are generated.
//! * `poll_interval`, `max_blocks_per_step`, `start_block`: how the chain is followed.
//! * `tx.*`: how confirmation transactions are sent.
//! * `dispatch.*`: how invocations are retried and parallelized.
//! * `port`: the port of the info/metrics HTTP API, disabled when not set.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Loading and checking the call manager contract ABI.
pub mod contract;
/// Default values for optional configuration keys.
pub mod defaults;
/// Utils for processing configuration
pub mod utils;

use std::path::PathBuf;
use std::time::Duration;

use agent_relayer_types::private_key::PrivateKey;
use agent_relayer_types::rpc_url::RpcUrl;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// AgentRelayerConfig is the configuration for the agent relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentRelayerConfig {
    /// Http(s) Endpoint of the watched chain.
    #[serde(skip_serializing)]
    pub rpc_url: RpcUrl,
    /// The chain id, part of every signed confirmation.
    pub chain_id: u64,
    /// The private key of the relayer account.
    ///
    /// Accepts a `0x` prefixed or bare hex string, or `$ENV_VAR`.
    #[serde(default, skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// The `AgentCallManagerWithVerify` contract address.
    pub call_manager_address: Address,
    /// The agent registry address, only reported.
    #[serde(default)]
    pub registry_address: Option<Address>,
    /// Path to the contract ABI artifact.
    #[serde(default = "defaults::contract_abi")]
    pub contract_abi: PathBuf,
    /// Produce deterministic mock results instead of calling a model.
    #[serde(default = "defaults::mock_mode")]
    pub mock_mode: bool,
    /// API key of the generation provider.
    #[serde(default, skip_serializing)]
    pub openai_api_key: Option<String>,
    /// Model used for live generation.
    #[serde(default = "defaults::generation_model")]
    pub generation_model: String,
    /// Chat completions endpoint used for live generation.
    #[serde(default = "defaults::generation_endpoint")]
    pub generation_endpoint: String,
    /// Seconds to sleep between two polls once caught up with the head.
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval: u64,
    /// Seconds to sleep after the first failed chain read.
    #[serde(default = "defaults::error_backoff")]
    pub error_backoff: u64,
    /// Upper bound in seconds for the chain read back off.
    #[serde(default = "defaults::max_error_backoff")]
    pub max_error_backoff: u64,
    /// The maximum number of blocks queried in one poll.
    #[serde(default = "defaults::max_blocks_per_step")]
    pub max_blocks_per_step: u64,
    /// Replay invocations starting at this block instead of the head at startup.
    #[serde(default)]
    pub start_block: Option<u64>,
    /// Seconds a single RPC call (head, logs, broadcast) may take.
    #[serde(default = "defaults::rpc_timeout")]
    pub rpc_timeout: u64,
    /// Milliseconds between sync progress logs, `0` disables them.
    #[serde(default = "defaults::print_progress_interval")]
    pub print_progress_interval: u64,
    /// Block explorer base URL, used to print clickable transaction links.
    #[serde(default)]
    pub explorer: Option<url::Url>,
    /// Port of the info/metrics HTTP API.
    #[serde(default)]
    pub port: Option<u16>,
    /// Confirmation transaction settings.
    #[serde(default)]
    pub tx: TxConfig,
    /// Dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl AgentRelayerConfig {
    /// Makes sure that the config is valid, by going
    /// through the whole config and doing some basic checks.
    pub fn verify(&self) -> agent_relayer_utils::Result<()> {
        use agent_relayer_utils::Error;
        if self.private_key.is_none() {
            return Err(Error::MissingSecrets);
        }
        if self.chain_id == 0 {
            return Err(Error::InvalidConfig("chain_id must not be 0".into()));
        }
        if self.max_blocks_per_step == 0 {
            return Err(Error::InvalidConfig(
                "max_blocks_per_step must not be 0".into(),
            ));
        }
        if self.rpc_timeout == 0 {
            return Err(Error::InvalidConfig("rpc_timeout must not be 0".into()));
        }
        if self.dispatch.max_concurrent == 0 {
            return Err(Error::InvalidConfig(
                "dispatch.max_concurrent must not be 0".into(),
            ));
        }
        if self.uses_live_generation() {
            url::Url::parse(&self.generation_endpoint).map_err(|e| {
                Error::InvalidConfig(format!("generation_endpoint: {e}"))
            })?;
        }
        Ok(())
    }

    /// Whether results come from the generation provider instead of the mock.
    pub fn uses_live_generation(&self) -> bool {
        !self.mock_mode && self.openai_api_key.is_some()
    }

    /// Sleep between two polls once caught up.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// First sleep after a failed chain read.
    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff)
    }

    /// Upper bound of the chain read back off.
    pub fn max_error_backoff(&self) -> Duration {
        Duration::from_secs(self.max_error_backoff)
    }

    /// Upper bound of a single RPC call.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout)
    }

    /// Interval between sync progress logs, `None` when disabled.
    pub fn print_progress_interval(&self) -> Option<Duration> {
        (self.print_progress_interval > 0)
            .then(|| Duration::from_millis(self.print_progress_interval))
    }
}

/// TxConfig is the configuration for sending confirmation transactions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TxConfig {
    /// Gas limit of every confirmation transaction.
    #[serde(default = "defaults::gas_limit")]
    pub gas_limit: u64,
    /// Confirmations to wait for before the receipt is returned.
    #[serde(default = "defaults::block_confirmations")]
    pub block_confirmations: usize,
    /// Milliseconds between two receipt polls.
    #[serde(default = "defaults::receipt_poll_interval")]
    pub receipt_poll_interval: u64,
    /// Seconds to wait for the receipt.
    #[serde(default = "defaults::receipt_timeout")]
    pub receipt_timeout: u64,
}

impl TxConfig {
    /// Interval between two receipt polls.
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval)
    }

    /// How long to wait for a receipt.
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout)
    }
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            gas_limit: defaults::gas_limit(),
            block_confirmations: defaults::block_confirmations(),
            receipt_poll_interval: defaults::receipt_poll_interval(),
            receipt_timeout: defaults::receipt_timeout(),
        }
    }
}

/// DispatchConfig controls how invocations go through the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// How many distinct invocations may be in flight at once.
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
    /// How many times a dispatch failing with a transient error is retried.
    #[serde(default = "defaults::max_retries")]
    pub max_retries: usize,
    /// Milliseconds between two attempts.
    #[serde(default = "defaults::retry_interval")]
    pub retry_interval: u64,
}

impl DispatchConfig {
    /// Interval between two attempts of the same dispatch.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            max_retries: defaults::max_retries(),
            retry_interval: defaults::retry_interval(),
        }
    }
}

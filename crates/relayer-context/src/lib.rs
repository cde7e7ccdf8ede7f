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
//! # Relayer Context Module 🕸️
//!
//! A module for managing the context of the relayer.
use std::sync::Arc;
use std::time::Duration;

use ethers::abi::Abi;
use ethers::core::k256::SecretKey;
use ethers::providers::{Http, Provider, RetryClientBuilder};
use ethers::signers::{LocalWallet, Signer};
use tokio::sync::broadcast;

use agent_relayer_config::AgentRelayerConfig;
use agent_relayer_store::{HistoryStoreKey, InMemoryStore};
use agent_relayer_types::EthersClient;
use agent_relayer_utils::metric::Metrics;

mod ethers_retry_policy;

pub use ethers_retry_policy::AgentHttpRetryPolicy;

/// RelayerContext contains Relayer's configuration and shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: AgentRelayerConfig,
    /// Broadcasts a shutdown signal to all active tasks.
    ///
    /// When a graceful shutdown is initiated, a `()` value is sent via
    /// the broadcast::Sender. Each task receives it, reaches a
    /// safe terminal state, and completes.
    notify_shutdown: broadcast::Sender<()>,
    /// Represents the metrics for the relayer
    pub metrics: Arc<Metrics>,
    store: InMemoryStore,
    /// The call manager ABI, checked at load time.
    abi: Arc<Abi>,
}

impl RelayerContext {
    /// Creates a new RelayerContext.
    ///
    /// Loads the contract ABI from the configured path, failing when it is
    /// missing or does not describe the call manager.
    pub fn new(
        config: AgentRelayerConfig,
        store: InMemoryStore,
    ) -> agent_relayer_utils::Result<Self> {
        let abi =
            agent_relayer_config::contract::load_call_manager_abi(&config.contract_abi)?;
        Self::with_abi(config, store, abi)
    }

    /// Creates a new RelayerContext around an already loaded ABI.
    pub fn with_abi(
        config: AgentRelayerConfig,
        store: InMemoryStore,
        abi: Abi,
    ) -> agent_relayer_utils::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let metrics = Arc::new(Metrics::new()?);
        Ok(Self {
            config,
            notify_shutdown,
            metrics,
            store,
            abi: Arc::new(abi),
        })
    }

    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends a shutdown signal to all subscribed tasks/connections.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// Returns a new `EthereumProvider` for the relayer.
    ///
    /// Every HTTP request is bounded by `rpc_timeout`. Requests failing
    /// because of rate limits are retried with the [`AgentHttpRetryPolicy`].
    pub fn evm_provider(&self) -> agent_relayer_utils::Result<Arc<EthersClient>> {
        let http_client = reqwest::Client::builder()
            .timeout(self.config.rpc_timeout())
            .build()?;
        let http = Http::new_with_client(
            url::Url::from(self.config.rpc_url.clone()),
            http_client,
        );
        let policy = AgentHttpRetryPolicy::boxed().map_err(|_| {
            agent_relayer_utils::Error::Generic("invalid retry policy pattern")
        })?;
        let client = RetryClientBuilder::default()
            .rate_limit_retries(10)
            .timeout_retries(3)
            .initial_backoff(Duration::from_millis(500))
            .build(http, policy);
        let provider = Provider::new(client)
            .interval(self.config.tx.receipt_poll_interval());
        Ok(Arc::new(provider))
    }

    /// Sets up and returns an EVM wallet for the relayer.
    pub fn evm_wallet(&self) -> agent_relayer_utils::Result<LocalWallet> {
        let private_key = self
            .config
            .private_key
            .as_ref()
            .ok_or(agent_relayer_utils::Error::MissingSecrets)?;
        let key = SecretKey::from_bytes(private_key.as_bytes().into())?;
        let wallet = LocalWallet::from(key).with_chain_id(self.config.chain_id);
        Ok(wallet)
    }

    /// Returns the in memory store.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Returns the call manager ABI.
    pub fn abi(&self) -> Arc<Abi> {
        self.abi.clone()
    }

    /// The store key of the watched contract.
    pub fn history_key(&self) -> HistoryStoreKey {
        HistoryStoreKey::from((
            self.config.chain_id,
            self.config.call_manager_address,
        ))
    }
}

/// Listens for the server shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value is
/// ever sent. Once a value has been sent via the broadcast channel, the server
/// should shutdown.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal has
/// been received. Callers may query for whether the shutdown signal has been
/// received or not.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Returns `true` if the shutdown signal has been received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}

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

//! # Relayer Service Module 🕸️
//!
//! A module for starting the long-running tasks of the relayer.
//!
//! ## Overview
//!
//! Services are tasks which the relayer constantly runs throughout its
//! lifetime: the invocation pipeline, and optionally the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::task::JoinHandle;

use agent_event_watcher_traits::CallManagerContractWrapper;
use agent_ew_call_manager::{InvocationPipeline, PipelineConfig};
use agent_relayer_config::AgentRelayerConfig;
use agent_relayer_context::RelayerContext;
use agent_relayer_result_backends::{
    DataUriUploader, MockResultProducer, OpenAiResultProducer, ResultProducer,
};
use agent_relayer_signing_backend::{LocalSigningBackend, SigningBackend};
use agent_relayer_tx_relay::EthersChainWriter;
use agent_relayer_utils::Error;

/// Starts the HTTP API on `0.0.0.0:port`, serving `/api/v1/info` and
/// `/api/v1/metrics`.
///
/// Resolves once the server stops, which happens on the relayer shutdown
/// signal.
pub async fn build_axum_services(
    ctx: Arc<RelayerContext>,
    port: u16,
) -> crate::Result<()> {
    let app = Router::new()
        .nest("/api/v1", agent_relayer_handlers::api_routes(ctx.clone()))
        .into_make_service();
    let socket_addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting the server on {}", socket_addr);
    let mut shutdown = ctx.shutdown_signal();
    axum::Server::try_bind(&socket_addr)?
        .serve(app)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await?;
    Ok(())
}

/// Fires up the invocation pipeline in a background task.
///
/// Everything the pipeline needs is built before returning, so a bad ABI or
/// private key fails here instead of inside the task. The returned handle
/// resolves when the pipeline stops: after a shutdown signal, or on an error
/// it cannot recover from.
///
/// # Arguments
///
/// * `ctx` - RelayContext reference that holds the configuration
pub fn ignite(
    ctx: &RelayerContext,
) -> crate::Result<JoinHandle<crate::Result<()>>> {
    let config = &ctx.config;
    let client = ctx.evm_provider()?;
    let abi = ctx.abi().as_ref().clone();
    tracing::debug!(
        chain_id = config.chain_id,
        call_manager = ?config.call_manager_address,
        "Starting Background Services for chain {}",
        config.chain_id,
    );

    let reader = CallManagerContractWrapper::new(
        config.call_manager_address,
        abi.clone(),
        client.clone(),
    )?;
    let private_key =
        config.private_key.as_ref().ok_or(Error::MissingSecrets)?;
    let signer: Arc<dyn SigningBackend> = Arc::new(
        LocalSigningBackend::from_private_key(private_key, config.chain_id)?,
    );
    let writer = EthersChainWriter::builder()
        .client(client)
        .contract_address(config.call_manager_address)
        .contract(abi)
        .signer(signer.clone())
        .tx_config(config.tx.clone())
        .explorer(config.explorer.clone())
        .metrics(ctx.metrics.clone())
        .rpc_timeout(config.rpc_timeout())
        .build();

    let pipeline = InvocationPipeline::builder()
        .reader(reader)
        .writer(writer)
        .producer(make_result_producer(config)?)
        .uploader(Box::new(DataUriUploader))
        .signer(signer)
        .store(ctx.store().clone())
        .key(ctx.history_key())
        .metrics(ctx.metrics.clone())
        .config(PipelineConfig::from(config))
        .build();

    let shutdown = ctx.shutdown_signal();
    let handle = tokio::spawn(async move { pipeline.run(shutdown).await });
    Ok(handle)
}

/// Picks the result producer for `config`.
///
/// Live generation needs an API key; without one the relayer falls back to
/// the mock producer even when mock mode is off.
fn make_result_producer(
    config: &AgentRelayerConfig,
) -> crate::Result<Box<dyn ResultProducer>> {
    match &config.openai_api_key {
        Some(api_key) if config.uses_live_generation() => {
            let endpoint = url::Url::parse(&config.generation_endpoint)?;
            tracing::info!(
                model = %config.generation_model,
                "Generating results with {}",
                endpoint,
            );
            let producer = OpenAiResultProducer::builder()
                .api_key(api_key.as_str())
                .model(config.generation_model.as_str())
                .endpoint(endpoint)
                .build();
            Ok(Box::new(producer))
        }
        _ => {
            if !config.mock_mode {
                tracing::warn!(
                    "No generation API key configured, using mock results"
                );
            } else {
                tracing::info!("Mock mode enabled, using mock results");
            }
            Ok(Box::new(MockResultProducer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_relayer_config::utils::parse_from_str;

    fn config(extra: &str) -> AgentRelayerConfig {
        parse_from_str(&format!(
            r#"
            rpc_url = "http://localhost:8545"
            chain_id = 31337
            private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            call_manager_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
            {extra}
            "#
        ))
        .unwrap()
    }

    #[test]
    fn mock_mode_ignores_the_api_key() {
        let config = config(
            r#"
            mock_mode = true
            openai_api_key = "sk-test"
            "#,
        );
        let producer = make_result_producer(&config).unwrap();
        let debug = format!("{producer:?}");
        assert!(debug.contains("MockResultProducer"), "{debug}");
    }

    #[test]
    fn live_generation_with_an_api_key() {
        let config = config(
            r#"
            mock_mode = false
            openai_api_key = "sk-test"
            "#,
        );
        let producer = make_result_producer(&config).unwrap();
        let debug = format!("{producer:?}");
        assert!(debug.contains("OpenAiResultProducer"), "{debug}");
        assert!(!debug.contains("sk-test"));
    }

    #[tokio::test]
    async fn ignite_stops_on_shutdown() {
        let ctx = RelayerContext::with_abi(
            config("start_block = 1"),
            Default::default(),
            agent_relayer_config::contract::load_call_manager_abi(
                std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                    .join("../../abis/AgentCallManagerWithVerify.json"),
            )
            .unwrap(),
        )
        .unwrap();
        let handle = ignite(&ctx).unwrap();
        ctx.shutdown();
        // the node is not running, the pipeline only sees connection errors
        // until it notices the shutdown.
        tokio::time::timeout(std::time::Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

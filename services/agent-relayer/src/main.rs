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

//! Agent Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use ethers::signers::Signer;
use tokio::signal::unix;

use agent_relayer::service::{build_axum_services, ignite};
use agent_relayer_config::cli::{load_config, load_dotenv, setup_logger, Opts};
use agent_relayer_context::RelayerContext;
use agent_relayer_store::InMemoryStore;

/// The main entry point for the relayer.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose, "agent_relayer")?;
    let network = args.network();
    match load_dotenv(&network) {
        Some(path) => {
            tracing::trace!("Loaded {}", path.display());
        }
        None => {
            tracing::warn!("No .env file found for network {}", network);
        }
    }

    // The configuration is validated and configured from the given directory
    let config = load_config(args.config_dir.clone())?;
    config.verify()?;

    // The RelayerContext takes a configuration, and populates objects that are needed
    // throughout the lifetime of the relayer.
    let ctx = RelayerContext::new(config, InMemoryStore::default())?;
    let relayer = ctx.evm_wallet()?;
    tracing::info!(
        chain_id = ctx.config.chain_id,
        mock_mode = ctx.config.mock_mode,
        rpc_url = %ctx.config.rpc_url,
        "Relaying as {:?} to call manager {:?}",
        relayer.address(),
        ctx.config.call_manager_address,
    );

    let server_handle = ctx.config.port.map(|port| {
        let ctx = Arc::new(ctx.clone());
        tokio::spawn(async move {
            if let Err(e) = build_axum_services(ctx, port).await {
                tracing::error!("HTTP API stopped: {e}");
            }
        })
    });

    // start the pipeline in the background.
    let mut pipeline = ignite(&ctx)?;
    tracing::event!(
        target: agent_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %agent_relayer_utils::probe::Kind::Lifecycle,
        started = true
    );

    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    let stopped = tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
            None
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
            None
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
            None
        },
        result = &mut pipeline => Some(result),
    };

    tracing::event!(
        target: agent_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %agent_relayer_utils::probe::Kind::Lifecycle,
        shutdown = true
    );
    tracing::warn!("Shutting down...");
    // send shutdown signal to all of the application.
    ctx.shutdown();
    let result = match stopped {
        Some(result) => result,
        // the pipeline finishes the range it is working on.
        None => pipeline.await,
    };
    if let Some(handle) = server_handle {
        let _ = handle.await;
    }
    result??;
    tracing::info!("Clean Exit ..");
    Ok(())
}

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
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use futures::prelude::*;
use typed_builder::TypedBuilder;

use agent_event_watcher_traits::ChainReader;
use agent_relayer_context::Shutdown;
use agent_relayer_result_backends::{ResultProducer, Uploader};
use agent_relayer_signing_backend::{ConfirmationNonce, SigningBackend};
use agent_relayer_store::{
    HistoryStore, HistoryStoreKey, InMemoryStore, InvocationStore,
};
use agent_relayer_tx_relay::ChainWriter;
use agent_relayer_types::invocation::{
    DispatchStage, ObservedInvocation, RequestDescriptor, SignedConfirmation,
};
use agent_relayer_utils::metric::Metrics;
use agent_relayer_utils::retry::{
    chain_read_backoff, with_timeout, ConstantWithMaxRetryCount,
};
use agent_relayer_utils::{Error, Result};

use crate::config::PipelineConfig;
use crate::report::{ConfirmedInvocation, DispatchFailure, RangeReport};

/// A Helper tag used to identify the watcher during the logs.
const TAG: &str = "Call Manager Watcher";

/// Watches the call manager and confirms the result of every invocation.
#[derive(TypedBuilder)]
pub struct InvocationPipeline<R, W> {
    reader: R,
    writer: W,
    producer: Box<dyn ResultProducer>,
    uploader: Box<dyn Uploader>,
    signer: Arc<dyn SigningBackend>,
    #[builder(default)]
    nonce: ConfirmationNonce,
    store: InMemoryStore,
    /// The key of the watched contract in the store.
    key: HistoryStoreKey,
    metrics: Arc<Metrics>,
    #[builder(default)]
    config: PipelineConfig,
}

impl<R, W> InvocationPipeline<R, W>
where
    R: ChainReader,
    W: ChainWriter,
{
    /// The last fully dispatched block.
    pub fn checkpoint(&self) -> Result<u64> {
        self.store.get_last_block_number(self.key, 0)
    }

    /// Sets the checkpoint to `start_block - 1`, or to the current head when no
    /// start block is configured.
    ///
    /// Reading the head is retried, with back-off, for as long as it fails
    /// with transient errors.
    #[tracing::instrument(skip_all, fields(tag = %TAG, key = %self.key))]
    pub async fn initialize(&self) -> Result<u64> {
        let checkpoint = match self.config.start_block {
            Some(start_block) => start_block.saturating_sub(1),
            None => {
                let backoff = chain_read_backoff(
                    self.config.error_backoff,
                    self.config.max_error_backoff,
                );
                let task = || self.head().map_err(classify);
                let notify = |e: Error, after: Duration| {
                    self.metrics.chain_read_back_off.inc();
                    tracing::warn!(
                        "Failed to read the head: {e}, retrying in {after:?}"
                    );
                };
                backoff::future::retry_notify(backoff, task, notify).await?
            }
        };
        self.store.set_last_block_number(self.key, checkpoint)?;
        self.metrics.checkpoint.set(checkpoint as f64);
        tracing::info!(checkpoint, "Watching invocations after block #{checkpoint}");
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::Sync,
            chain_id = %self.key.chain_id(),
            checkpoint,
            initialized = true,
        );
        Ok(checkpoint)
    }

    /// Queries and dispatches the next block range.
    ///
    /// Returns `None` when there is no new block. An error means the head or
    /// the logs could not be read in time, nothing was dispatched and the
    /// checkpoint did not move.
    #[tracing::instrument(skip_all, fields(tag = %TAG))]
    pub async fn poll_once(&self) -> Result<Option<RangeReport>> {
        let checkpoint = self.checkpoint()?;
        let head = self.head().await?;
        self.store.set_target_block_number(self.key, head)?;
        if head <= checkpoint {
            return Ok(None);
        }
        let from = checkpoint + 1;
        let to = head.min(
            checkpoint.saturating_add(self.config.max_blocks_per_step.max(1)),
        );
        let events = with_timeout(
            "eth_getLogs",
            self.config.rpc_timeout,
            self.reader.invocations(from, to),
        )
        .await?;
        tracing::trace!("Found #{} invocations in #{from}..=#{to}", events.len());

        let mut report = RangeReport::new(from, to, head);
        let mut fresh = Vec::with_capacity(events.len());
        for event in events {
            self.metrics.invocations_observed.inc();
            let invocation_id = event.request.invocation_id;
            if self.store.mark_dispatched(self.key, invocation_id)? {
                fresh.push(event);
            } else {
                tracing::warn!(
                    ?invocation_id,
                    block_number = event.block_number,
                    "Skipping already dispatched invocation",
                );
                self.metrics.duplicate_invocations_skipped.inc();
                report.duplicates.push(invocation_id);
            }
        }

        let dispatches = fresh
            .iter()
            .map(|e| self.dispatch_with_retry(e).boxed())
            .collect::<Vec<_>>();
        let outcomes = stream::iter(dispatches)
            .buffered(self.config.max_concurrent.max(1))
            .collect::<Vec<_>>()
            .await;
        for outcome in outcomes {
            match outcome {
                Ok(confirmed) => {
                    self.metrics.invocations_confirmed.inc();
                    report.confirmed.push(confirmed);
                }
                Err(failure) => {
                    tracing::error!(
                        invocation_id = ?failure.invocation_id,
                        stage = %failure.stage,
                        "{failure}",
                    );
                    self.metrics.dispatch_failures.inc();
                    if matches!(
                        failure.error,
                        Error::TransactionReverted { .. }
                    ) {
                        self.metrics.confirmations_reverted.inc();
                    }
                    self.store.record_failure(self.key, failure.to_record())?;
                    report.failures.push(failure);
                }
            }
        }

        self.store.advance_last_block_number(self.key, to)?;
        self.metrics.checkpoint.set(to as f64);
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::TRACE,
            kind = %agent_relayer_utils::probe::Kind::Sync,
            chain_id = %self.key.chain_id(),
            from,
            to,
            head,
            confirmed = report.confirmed.len(),
            duplicates = report.duplicates.len(),
            failures = report.failures.len(),
        );
        Ok(Some(report))
    }

    /// Runs the pipeline until `shutdown` fires or a permanent error happens.
    ///
    /// Shutdown is only checked between two polls, a range that started is
    /// always finished. Chain reads are bounded by `rpc_timeout`, so a hung
    /// node delays shutdown by at most one timeout.
    #[tracing::instrument(skip_all, fields(tag = %TAG, key = %self.key))]
    pub async fn run(&self, mut shutdown: Shutdown) -> Result<()> {
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::Lifecycle,
            starting = true,
        );
        tokio::select! {
            checkpoint = self.initialize() => { checkpoint?; }
            _ = shutdown.recv() => {
                tracing::info!("Shutting down before the first poll");
                return Ok(());
            }
        }

        let mut backoff = chain_read_backoff(
            self.config.error_backoff,
            self.config.max_error_backoff,
        );
        // saves the last time we printed sync progress.
        let mut instant = Instant::now();
        while !shutdown.is_shutdown() {
            let cooldown = match self.poll_once().await {
                Ok(report) => {
                    backoff.reset();
                    match report {
                        Some(report) if report.is_behind() => Duration::ZERO,
                        _ => self.config.poll_interval,
                    }
                }
                Err(e) if e.is_transient() => {
                    self.metrics.chain_read_back_off.inc();
                    let after = backoff
                        .next_backoff()
                        .unwrap_or(self.config.max_error_backoff);
                    tracing::warn!(
                        "Failed to read the chain: {e}, retrying in {after:?}"
                    );
                    tracing::event!(
                        target: agent_relayer_utils::probe::TARGET,
                        tracing::Level::DEBUG,
                        kind = %agent_relayer_utils::probe::Kind::Retry,
                        error = %e,
                        backoff = ?after,
                    );
                    after
                }
                Err(e) => {
                    tracing::error!("Stopping, cannot recover from: {e}");
                    tracing::event!(
                        target: agent_relayer_utils::probe::TARGET,
                        tracing::Level::DEBUG,
                        kind = %agent_relayer_utils::probe::Kind::Lifecycle,
                        errored = true,
                        error = %e,
                    );
                    return Err(e);
                }
            };

            if let Some(interval) = self.config.print_progress_interval {
                if instant.elapsed() > interval {
                    self.print_progress()?;
                    instant = Instant::now();
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {}
                _ = tokio::time::sleep(cooldown) => {}
            }
        }
        tracing::info!("Shutting down, last checkpoint #{}", self.checkpoint()?);
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::Lifecycle,
            shutdown = true,
        );
        Ok(())
    }

    async fn head(&self) -> Result<u64> {
        with_timeout(
            "eth_blockNumber",
            self.config.rpc_timeout,
            self.reader.block_number(),
        )
        .await
    }

    fn print_progress(&self) -> Result<()> {
        let currently_at = self.checkpoint()?;
        let target_block = self.store.get_target_block_number(self.key, 0)?;
        let diff = target_block.saturating_sub(currently_at);
        let progress = if target_block == 0 {
            100.0
        } else {
            currently_at as f64 / target_block as f64 * 100.0
        };
        let is_syncing = progress < 99.99;
        tracing::info!(
            target_block,
            currently_at,
            diff,
            is_syncing,
            progress,
            chain_id = %self.key.chain_id(),
        );
        Ok(())
    }

    /// Dispatches `event`, retrying transient failures.
    ///
    /// Every attempt starts over from the Produce stage, so it signs a fresh
    /// nonce.
    async fn dispatch_with_retry(
        &self,
        event: &ObservedInvocation,
    ) -> std::result::Result<ConfirmedInvocation, DispatchFailure> {
        let backoff = ConstantWithMaxRetryCount::new(
            self.config.retry_interval,
            self.config.max_retries,
        );
        let task = || {
            self.dispatch(event).map_err(|failure| {
                if failure.is_transient() {
                    backoff::Error::transient(failure)
                } else {
                    backoff::Error::permanent(failure)
                }
            })
        };
        let notify = |failure: DispatchFailure, after: Duration| {
            tracing::warn!("{failure}, retrying in {after:?}");
            tracing::event!(
                target: agent_relayer_utils::probe::TARGET,
                tracing::Level::DEBUG,
                kind = %agent_relayer_utils::probe::Kind::Retry,
                invocation_id = ?event.request.invocation_id,
                stage = %failure.stage,
            );
        };
        backoff::future::retry_notify(backoff, task, notify).await
    }

    /// Produce → Upload → Sign → Submit for one invocation.
    #[tracing::instrument(
        skip_all,
        fields(
            invocation_id = ?event.request.invocation_id,
            agent_id = %event.request.agent_id,
            block_number = event.block_number,
        )
    )]
    async fn dispatch(
        &self,
        event: &ObservedInvocation,
    ) -> std::result::Result<ConfirmedInvocation, DispatchFailure> {
        let request = &event.request;
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::Dispatch,
            invocation_id = ?request.invocation_id,
            agent_id = %request.agent_id,
            caller = ?request.caller,
            paid_amount = %request.paid_amount,
            started = true,
        );

        let descriptor = RequestDescriptor::for_invocation(request);
        let payload = self
            .producer
            .produce(&descriptor)
            .await
            .map_err(|e| DispatchFailure::new(event, DispatchStage::Produce, e))?;
        let record = self
            .uploader
            .upload(&payload)
            .await
            .map_err(|e| DispatchFailure::new(event, DispatchStage::Upload, e))?;
        tracing::debug!(
            content_hash = ?record.content_hash,
            "Result uploaded to {}",
            truncated(&record.locator),
        );

        let message = self.signer.confirmation_message(
            request.agent_id,
            request.invocation_id,
            record.content_hash,
            self.nonce.next(),
        );
        let signature = self
            .signer
            .sign_confirmation(&message)
            .await
            .map_err(|e| DispatchFailure::new(event, DispatchStage::Sign, e))?;
        let signed = SignedConfirmation { message, signature };

        let receipt = self
            .writer
            .confirm(&signed)
            .await
            .map_err(|e| DispatchFailure::new(event, DispatchStage::Submit, e))?;
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::Dispatch,
            invocation_id = ?request.invocation_id,
            tx_hash = %receipt.transaction_hash,
            confirmed = true,
        );
        Ok(ConfirmedInvocation {
            invocation_id: request.invocation_id,
            agent_id: request.agent_id,
            block_number: event.block_number,
            locator: record.locator,
            content_hash: record.content_hash,
            tx_hash: receipt.transaction_hash,
        })
    }
}

fn classify(e: Error) -> backoff::Error<Error> {
    if e.is_transient() {
        backoff::Error::transient(e)
    } else {
        backoff::Error::permanent(e)
    }
}

fn truncated(locator: &str) -> &str {
    const MAX: usize = 80;
    match locator.char_indices().nth(MAX) {
        Some((idx, _)) => &locator[..idx],
        None => locator,
    }
}

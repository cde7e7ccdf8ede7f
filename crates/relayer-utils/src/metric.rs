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

use prometheus::core::{AtomicF64, GenericCounter, GenericGauge};
use prometheus::{opts, Encoder, Registry, TextEncoder};

/// A struct definition for collecting metrics in the relayer.
///
/// Every instance owns its registry, so several relayers (or tests) can live
/// in the same process.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Invocation events decoded from the chain
    pub invocations_observed: GenericCounter<AtomicF64>,
    /// Invocations whose confirmation was included successfully
    pub invocations_confirmed: GenericCounter<AtomicF64>,
    /// Invocation logs skipped because the invocation was already dispatched
    pub duplicate_invocations_skipped: GenericCounter<AtomicF64>,
    /// Invocations that failed in any pipeline stage
    pub dispatch_failures: GenericCounter<AtomicF64>,
    /// Confirmation transactions that were mined but reverted
    pub confirmations_reverted: GenericCounter<AtomicF64>,
    /// Chain read back off metric
    pub chain_read_back_off: GenericCounter<AtomicF64>,
    /// Total transaction made Relayer metric
    pub total_transaction_made: GenericCounter<AtomicF64>,
    /// Gas spent metric
    pub gas_spent: GenericCounter<AtomicF64>,
    /// Last fully processed block
    pub checkpoint: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Instantiates the various metrics and their counters, also creates a registry for the counters and
    /// registers the counters
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let invocations_observed = counter(
            &registry,
            "invocations_observed",
            "The total number of invocation events decoded",
        )?;
        let invocations_confirmed = counter(
            &registry,
            "invocations_confirmed",
            "The total number of invocations confirmed on chain",
        )?;
        let duplicate_invocations_skipped = counter(
            &registry,
            "duplicate_invocations_skipped",
            "How many invocation logs were skipped as duplicates",
        )?;
        let dispatch_failures = counter(
            &registry,
            "dispatch_failures",
            "How many invocations failed to be confirmed",
        )?;
        let confirmations_reverted = counter(
            &registry,
            "confirmations_reverted",
            "How many confirmation transactions reverted",
        )?;
        let chain_read_back_off = counter(
            &registry,
            "chain_read_back_off",
            "specifies how many times the chain reader backed off",
        )?;
        let total_transaction_made = counter(
            &registry,
            "total_transaction_made",
            "The total number of transaction made",
        )?;
        let gas_spent =
            counter(&registry, "gas_spent", "The total number of gas spent")?;

        let checkpoint = GenericGauge::with_opts(opts!(
            "checkpoint_block",
            "The last block whose invocations were all processed"
        ))?;
        registry.register(Box::new(checkpoint.clone()))?;

        Ok(Self {
            registry,
            invocations_observed,
            invocations_confirmed,
            duplicate_invocations_skipped,
            dispatch_failures,
            confirmations_reverted,
            chain_read_back_off,
            total_transaction_made,
            gas_spent,
            checkpoint,
        })
    }

    /// Gathers the whole relayer metrics
    pub fn gather_metrics(&self) -> Result<String, GatherMetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}

fn counter(
    registry: &Registry,
    name: &str,
    help: &str,
) -> Result<GenericCounter<AtomicF64>, prometheus::Error> {
    let counter = GenericCounter::with_opts(opts!(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

#[derive(Debug, thiserror::Error)]
pub enum GatherMetricsError {
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    #[error(transparent)]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}

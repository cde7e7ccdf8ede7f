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

use agent_relayer_types::invocation::{
    DispatchStage, FailureRecord, ObservedInvocation,
};
use agent_relayer_utils::Error;
use ethers::types::{H256, U256};

/// An invocation whose result was confirmed on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedInvocation {
    pub invocation_id: H256,
    pub agent_id: U256,
    pub block_number: u64,
    pub locator: String,
    pub content_hash: H256,
    pub tx_hash: H256,
}

/// An invocation that could not be confirmed, and the stage it failed in.
#[derive(Debug, thiserror::Error)]
#[error("invocation {invocation_id:#x} failed to {stage}: {error}")]
pub struct DispatchFailure {
    pub invocation_id: H256,
    pub agent_id: U256,
    pub block_number: u64,
    pub stage: DispatchStage,
    #[source]
    pub error: Error,
}

impl DispatchFailure {
    pub(crate) fn new(
        event: &ObservedInvocation,
        stage: DispatchStage,
        error: Error,
    ) -> Self {
        Self {
            invocation_id: event.request.invocation_id,
            agent_id: event.request.agent_id,
            block_number: event.block_number,
            stage,
            error,
        }
    }

    /// Whether trying the whole dispatch again could succeed.
    pub fn is_transient(&self) -> bool {
        self.error.is_transient()
    }

    /// The stored form of this failure.
    pub fn to_record(&self) -> FailureRecord {
        FailureRecord {
            invocation_id: self.invocation_id,
            agent_id: self.agent_id,
            block_number: self.block_number,
            stage: self.stage,
            reason: self.error.to_string(),
        }
    }
}

/// The outcome of one [`poll_once`](crate::InvocationPipeline::poll_once).
#[derive(Debug)]
pub struct RangeReport {
    /// First block of the queried range.
    pub from: u64,
    /// Last block of the queried range, the new checkpoint.
    pub to: u64,
    /// The chain head seen by this poll.
    pub head: u64,
    /// Confirmed invocations, in chain order.
    pub confirmed: Vec<ConfirmedInvocation>,
    /// Invocations skipped because they were already dispatched.
    pub duplicates: Vec<H256>,
    /// Invocations that failed, in chain order.
    pub failures: Vec<DispatchFailure>,
}

impl RangeReport {
    pub(crate) fn new(from: u64, to: u64, head: u64) -> Self {
        Self {
            from,
            to,
            head,
            confirmed: Vec::new(),
            duplicates: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Whether the head is past this range, i.e. the next poll should start
    /// right away.
    pub fn is_behind(&self) -> bool {
        self.to < self.head
    }
}

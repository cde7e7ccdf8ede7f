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
//! # Relayer Events Watcher Module 🕸️
//!
//! A module that reads invocations from the watched chain.
//!
//! ## Overview
//!
//! The pipeline only needs two things from the chain: how far it got, and
//! which `AgentInvoked` events were emitted in a block range. Both are behind
//! the [`ChainReader`] trait so the pipeline can be driven by an in-memory
//! chain in tests. [`evm::CallManagerContractWrapper`] implements it over an
//! `ethers` provider.

use agent_relayer_types::invocation::ObservedInvocation;

/// Reading `AgentInvoked` events through `ethers`.
pub mod evm;

pub use evm::CallManagerContractWrapper;

/// Read access to the watched chain.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// The current head block number.
    async fn block_number(&self) -> agent_relayer_utils::Result<u64>;

    /// All invocations emitted in blocks `from..=to`, in the order the chain
    /// returned them.
    async fn invocations(
        &self,
        from: u64,
        to: u64,
    ) -> agent_relayer_utils::Result<Vec<ObservedInvocation>>;
}

#[async_trait::async_trait]
impl<T: ChainReader + ?Sized> ChainReader for std::sync::Arc<T> {
    async fn block_number(&self) -> agent_relayer_utils::Result<u64> {
        (**self).block_number().await
    }

    async fn invocations(
        &self,
        from: u64,
        to: u64,
    ) -> agent_relayer_utils::Result<Vec<ObservedInvocation>> {
        (**self).invocations(from, to).await
    }
}

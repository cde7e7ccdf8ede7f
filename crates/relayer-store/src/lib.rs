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

//! # Relayer Store Module 🕸️
//!
//! A module for managing the storage of the relayer.
//!
//! ## Overview
//!
//! The relayer store keeps the checkpoint of the watched contract and the set
//! of invocations already dispatched. Nothing is persisted: a restarted relayer
//! starts from an empty store.
use std::fmt::{Debug, Display};

use agent_relayer_types::invocation::FailureRecord;
use agent_relayer_utils::Result;
use ethers::types::{Address, H256};

/// A module for managing in-memory storage of the relayer.
pub mod mem;

/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;

/// HistoryStoreKey contains the keys used to store the history of events.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HistoryStoreKey {
    /// A contract on an EVM chain.
    Contract {
        /// The chain id.
        chain_id: u64,
        /// The contract address.
        address: Address,
    },
}

impl HistoryStoreKey {
    /// Returns the chain id of the chain this key is for.
    pub fn chain_id(&self) -> u64 {
        match self {
            HistoryStoreKey::Contract { chain_id, .. } => *chain_id,
        }
    }

    /// Returns the address of the contract this key is for.
    pub fn address(&self) -> Address {
        match self {
            HistoryStoreKey::Contract { address, .. } => *address,
        }
    }
}

impl Display for HistoryStoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contract { chain_id, address } => {
                write!(f, "Contract(ChainId {chain_id}, {address:?})")
            }
        }
    }
}

impl From<(u64, Address)> for HistoryStoreKey {
    fn from((chain_id, address): (u64, Address)) -> Self {
        Self::Contract { chain_id, address }
    }
}

/// HistoryStore is a simple trait for storing and retrieving history
/// of block numbers.
pub trait HistoryStore: Clone + Send + Sync {
    /// Sets the new block number for that contract in the cache and returns the old one.
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> Result<u64>;

    /// Get the last block number for that contract.
    /// if not found, returns the `default_block_number`.
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> Result<u64>;

    /// Moves the last block number forward to `block_number`.
    ///
    /// Fails with [`agent_relayer_utils::Error::CheckpointRegression`] when
    /// `block_number` is lower than the stored one. Setting the same value
    /// again is accepted.
    fn advance_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> Result<u64>;

    /// Sets the Target Block number (Usually the latest block number of the target chain)
    /// This used to be able to check if we are fully synced with the target chain or not.
    fn set_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> Result<u64>;

    /// Get the target block number.
    /// if not found, returns the `default_block_number`.
    fn get_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> Result<u64>;
}

/// Keeps track of which invocations were handed to the pipeline and which of
/// them failed.
pub trait InvocationStore: Clone + Send + Sync {
    /// Marks `invocation_id` as dispatched.
    ///
    /// Returns `false` if it was already marked, in which case the caller must
    /// not dispatch it again.
    fn mark_dispatched<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        invocation_id: H256,
    ) -> Result<bool>;

    /// Records a failed dispatch for operator follow-up.
    fn record_failure<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        failure: FailureRecord,
    ) -> Result<()>;

    /// The recorded failures, oldest first.
    fn failures<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
    ) -> Result<Vec<FailureRecord>>;
}

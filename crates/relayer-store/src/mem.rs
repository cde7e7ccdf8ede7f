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

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;

use agent_relayer_types::invocation::FailureRecord;
use agent_relayer_utils::Error;
use ethers::types::H256;
use parking_lot::RwLock;

use super::{HistoryStore, HistoryStoreKey, InvocationStore};

/// How many failures are kept per contract, older ones are dropped first.
pub const MAX_FAILURE_RECORDS: usize = 1024;

type BlockNumbers = HashMap<HistoryStoreKey, u64>;

/// InMemoryStore is a store that stores the history of events in memory.
///
/// The dispatched set holds one 32 byte id per invocation seen since startup
/// and is never pruned: a replayed log can show up at any later block, so ids
/// below the checkpoint are still needed to skip it. It is emptied only by a
/// restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    last_block_numbers: Arc<RwLock<BlockNumbers>>,
    target_block_numbers: Arc<RwLock<BlockNumbers>>,
    dispatched: Arc<RwLock<HashMap<HistoryStoreKey, HashSet<H256>>>>,
    failures: Arc<RwLock<HashMap<HistoryStoreKey, VecDeque<FailureRecord>>>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl HistoryStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let guard = self.last_block_numbers.read();
        let val = guard
            .get(&key.into())
            .cloned()
            .unwrap_or(default_block_number);
        Ok(val)
    }

    #[tracing::instrument(skip(self))]
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.last_block_numbers.write();
        let val = guard.entry(key.into()).or_insert(block_number);
        let old = *val;
        *val = block_number;
        Ok(old)
    }

    #[tracing::instrument(skip(self))]
    fn advance_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.last_block_numbers.write();
        let val = guard.entry(key.into()).or_insert(block_number);
        let old = *val;
        if block_number < old {
            return Err(Error::CheckpointRegression {
                current: old,
                attempted: block_number,
            });
        }
        *val = block_number;
        Ok(old)
    }

    #[tracing::instrument(skip(self))]
    fn set_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.target_block_numbers.write();
        let val = guard.entry(key.into()).or_insert(block_number);
        let old = *val;
        *val = block_number;
        Ok(old)
    }

    #[tracing::instrument(skip(self))]
    fn get_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let guard = self.target_block_numbers.read();
        let val = guard
            .get(&key.into())
            .cloned()
            .unwrap_or(default_block_number);
        Ok(val)
    }
}

impl InvocationStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    fn mark_dispatched<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        invocation_id: H256,
    ) -> crate::Result<bool> {
        let mut guard = self.dispatched.write();
        Ok(guard.entry(key.into()).or_default().insert(invocation_id))
    }

    #[tracing::instrument(skip(self))]
    fn record_failure<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        failure: FailureRecord,
    ) -> crate::Result<()> {
        let mut guard = self.failures.write();
        let records = guard.entry(key.into()).or_default();
        if records.len() == MAX_FAILURE_RECORDS {
            records.pop_front();
        }
        records.push_back(failure);
        Ok(())
    }

    fn failures<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
    ) -> crate::Result<Vec<FailureRecord>> {
        let guard = self.failures.read();
        Ok(guard
            .get(&key.into())
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_relayer_types::invocation::DispatchStage;
    use ethers::types::{Address, U256};

    fn key() -> HistoryStoreKey {
        HistoryStoreKey::from((50312u64, Address::repeat_byte(0xaa)))
    }

    #[test]
    fn checkpoint_only_moves_forward() {
        let store = InMemoryStore::default();
        assert_eq!(store.get_last_block_number(key(), 7).unwrap(), 7);
        store.advance_last_block_number(key(), 100).unwrap();
        assert_eq!(store.advance_last_block_number(key(), 100).unwrap(), 100);
        assert_eq!(store.advance_last_block_number(key(), 150).unwrap(), 100);
        let err = store.advance_last_block_number(key(), 120).unwrap_err();
        assert!(matches!(
            err,
            Error::CheckpointRegression {
                current: 150,
                attempted: 120
            }
        ));
        assert_eq!(store.get_last_block_number(key(), 0).unwrap(), 150);
    }

    #[test]
    fn keys_are_independent() {
        let store = InMemoryStore::default();
        let other = HistoryStoreKey::from((1u64, Address::repeat_byte(0xaa)));
        store.set_last_block_number(key(), 10).unwrap();
        assert_eq!(store.get_last_block_number(other, 0).unwrap(), 0);
        store.set_target_block_number(key(), 42).unwrap();
        assert_eq!(store.get_target_block_number(key(), 0).unwrap(), 42);
        assert_eq!(store.get_target_block_number(other, 1).unwrap(), 1);
    }

    #[test]
    fn invocations_are_marked_once() {
        let store = InMemoryStore::default();
        let id = H256::repeat_byte(0x11);
        assert!(store.mark_dispatched(key(), id).unwrap());
        assert!(!store.mark_dispatched(key(), id).unwrap());
        let other = HistoryStoreKey::from((1u64, Address::repeat_byte(0xaa)));
        assert!(store.mark_dispatched(other, id).unwrap());
    }

    #[test]
    fn failure_log_is_bounded() {
        let store = InMemoryStore::default();
        for i in 0..(MAX_FAILURE_RECORDS + 2) {
            store
                .record_failure(
                    key(),
                    FailureRecord {
                        invocation_id: H256::from_low_u64_be(i as u64),
                        agent_id: U256::from(7),
                        block_number: i as u64,
                        stage: DispatchStage::Produce,
                        reason: "boom".into(),
                    },
                )
                .unwrap();
        }
        let failures = store.failures(key()).unwrap();
        assert_eq!(failures.len(), MAX_FAILURE_RECORDS);
        assert_eq!(failures[0].block_number, 2);
    }
}

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

use std::future::Future;

use ethers::types::U256;
use tokio::sync::{Mutex, MutexGuard};

/// Hands out account nonces for the relayer's transactions.
///
/// The next nonce is fetched from the chain the first time it is needed and
/// then tracked locally. A [`NonceReservation`] keeps the allocator locked, so
/// only one transaction is between "pick nonce" and "broadcast" at a time.
#[derive(Debug, Default)]
pub struct TxNonceManager {
    next: Mutex<Option<U256>>,
}

impl TxNonceManager {
    /// Creates a new, unsynced TxNonceManager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next nonce, calling `fetch` if it is not known yet.
    pub async fn reserve<F, Fut>(
        &self,
        fetch: F,
    ) -> agent_relayer_utils::Result<NonceReservation<'_>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = agent_relayer_utils::Result<U256>>,
    {
        let mut guard = self.next.lock().await;
        let nonce = match *guard {
            Some(nonce) => nonce,
            None => {
                let nonce = fetch().await?;
                tracing::debug!(%nonce, "synced account nonce");
                *guard = Some(nonce);
                nonce
            }
        };
        Ok(NonceReservation { guard, nonce })
    }

    /// Forgets the tracked nonce, the next reservation fetches it again.
    pub async fn invalidate(&self) {
        *self.next.lock().await = None;
    }

    #[cfg(test)]
    async fn peek(&self) -> Option<U256> {
        *self.next.lock().await
    }
}

/// A nonce picked for one transaction.
///
/// Dropping the reservation without calling [`Self::commit`] or
/// [`Self::release`] leaves the nonce available for the next transaction.
#[derive(Debug)]
pub struct NonceReservation<'a> {
    guard: MutexGuard<'a, Option<U256>>,
    nonce: U256,
}

impl NonceReservation<'_> {
    /// The reserved nonce.
    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    /// The transaction was broadcast, move on to the next nonce.
    pub fn commit(mut self) {
        *self.guard = Some(self.nonce + 1);
    }

    /// The broadcast failed and the local view may be stale, resync next time.
    pub fn release(mut self) {
        *self.guard = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn chain_nonce(
        nonce: u64,
    ) -> impl FnOnce() -> std::future::Ready<agent_relayer_utils::Result<U256>>
    {
        move || std::future::ready(Ok(U256::from(nonce)))
    }

    #[tokio::test]
    async fn syncs_once_then_counts_locally() {
        let manager = TxNonceManager::new();
        let counter = AtomicUsize::new(0);
        let fetches = &counter;
        let fetch = move || async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, agent_relayer_utils::Error>(U256::from(5))
        };
        let first = manager.reserve(fetch).await.unwrap();
        assert_eq!(first.nonce(), U256::from(5));
        first.commit();
        let second = manager.reserve(fetch).await.unwrap();
        assert_eq!(second.nonce(), U256::from(6));
        second.commit();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(manager.peek().await, Some(U256::from(7)));
    }

    #[tokio::test]
    async fn release_and_invalidate_resync() {
        let manager = TxNonceManager::new();
        let reservation = manager.reserve(chain_nonce(5)).await.unwrap();
        reservation.release();
        assert_eq!(manager.peek().await, None);

        let reservation = manager.reserve(chain_nonce(9)).await.unwrap();
        assert_eq!(reservation.nonce(), U256::from(9));
        reservation.commit();
        manager.invalidate().await;
        let reservation = manager.reserve(chain_nonce(12)).await.unwrap();
        assert_eq!(reservation.nonce(), U256::from(12));
    }

    #[tokio::test]
    async fn dropped_reservation_keeps_the_nonce() {
        let manager = TxNonceManager::new();
        let reservation = manager.reserve(chain_nonce(3)).await.unwrap();
        drop(reservation);
        assert_eq!(manager.peek().await, Some(U256::from(3)));
    }

    #[tokio::test]
    async fn failed_fetch_is_returned() {
        let manager = TxNonceManager::new();
        let result = manager
            .reserve(|| {
                std::future::ready(Err(agent_relayer_utils::Error::Generic(
                    "node down",
                )))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(manager.peek().await, None);
    }

    #[tokio::test]
    async fn concurrent_reservations_are_unique() {
        let manager = Arc::new(TxNonceManager::new());
        let handles = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    let reservation =
                        manager.reserve(chain_nonce(0)).await.unwrap();
                    let nonce = reservation.nonce();
                    tokio::task::yield_now().await;
                    reservation.commit();
                    nonce
                })
            })
            .collect::<Vec<_>>();
        let mut nonces = Vec::new();
        for handle in handles {
            nonces.push(handle.await.unwrap().as_u64());
        }
        nonces.sort_unstable();
        assert_eq!(nonces, (0..16).collect::<Vec<_>>());
    }
}

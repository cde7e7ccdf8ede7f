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

use std::sync::{atomic, Arc};
use std::time::{SystemTime, UNIX_EPOCH};

use ethers::types::U256;

/// Source of confirmation nonces.
///
/// Every call to [`ConfirmationNonce::next`] returns a value strictly greater
/// than all values returned before, and never lower than the current unix time
/// in seconds. The lower bound keeps nonces fresh across restarts, where the
/// counter itself is lost.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationNonce {
    last: Arc<atomic::AtomicU64>,
}

impl ConfirmationNonce {
    /// Create a new `ConfirmationNonce`, the first nonce will be the current time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next nonce.
    pub fn next(&self) -> U256 {
        self.next_at(unix_now())
    }

    fn next_at(&self, now: u64) -> U256 {
        let bump = |last: u64| last.saturating_add(1).max(now);
        let previous = match self.last.fetch_update(
            atomic::Ordering::SeqCst,
            atomic::Ordering::SeqCst,
            |last| Some(bump(last)),
        ) {
            Ok(previous) | Err(previous) => previous,
        };
        U256::from(bump(previous))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn follows_the_clock() {
        let nonce = ConfirmationNonce::new();
        assert_eq!(nonce.next_at(1_700_000_000), U256::from(1_700_000_000u64));
        assert_eq!(nonce.next_at(1_700_000_005), U256::from(1_700_000_005u64));
    }

    #[test]
    fn strictly_increases_within_the_same_second() {
        let nonce = ConfirmationNonce::new();
        let first = nonce.next_at(1_700_000_000);
        let second = nonce.next_at(1_700_000_000);
        let third = nonce.next_at(1_699_999_999);
        assert!(first < second && second < third);
        assert_eq!(nonce.last.load(atomic::Ordering::SeqCst), 1_700_000_002);
    }

    #[test]
    fn never_goes_below_the_seed() {
        let nonce = ConfirmationNonce {
            last: Arc::new(atomic::AtomicU64::new(u64::MAX - 1)),
        };
        assert_eq!(nonce.next(), U256::from(u64::MAX));
    }

    #[test]
    fn concurrent_callers_get_unique_nonces() {
        let nonce = ConfirmationNonce::new();
        let handles = (0..8)
            .map(|_| {
                let nonce = nonce.clone();
                std::thread::spawn(move || {
                    (0..100).map(|_| nonce.next()).collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        let all = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>();
        let unique = all.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), all.len());
    }
}

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
//! # Transaction Relay 🕸️
//!
//! Everything needed to get a [`SignedConfirmation`] on chain: encoding the
//! `confirmResult` call, picking the account nonce, signing, broadcasting and
//! waiting for the receipt.

use agent_relayer_types::invocation::SignedConfirmation;
use ethers::types::{TransactionReceipt, U256};

/// `confirmResult` submission through `ethers`.
pub mod evm;
/// Account nonce allocation.
pub mod nonce_manager;

pub use evm::EthersChainWriter;
pub use nonce_manager::{NonceReservation, TxNonceManager};

/// Write access to the watched chain.
#[async_trait::async_trait]
pub trait ChainWriter: Send + Sync {
    /// Submits `confirmResult` for `signed` and waits for its receipt.
    ///
    /// Returns only once the transaction was mined successfully. Errors after
    /// the transaction was broadcast are never transient.
    async fn confirm(
        &self,
        signed: &SignedConfirmation,
    ) -> agent_relayer_utils::Result<TransactionReceipt>;
}

#[async_trait::async_trait]
impl<T: ChainWriter + ?Sized> ChainWriter for std::sync::Arc<T> {
    async fn confirm(
        &self,
        signed: &SignedConfirmation,
    ) -> agent_relayer_utils::Result<TransactionReceipt> {
        (**self).confirm(signed).await
    }
}

fn wei_to_gwei(wei: U256) -> f64 {
    ethers::utils::format_units(wei, "gwei")
        .ok()
        .and_then(|gas| gas.parse::<f64>().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_wei_to_gwei() {
        assert_eq!(wei_to_gwei(U256::from(1_500_000_000u64)), 1.5);
        assert_eq!(wei_to_gwei(U256::zero()), 0.0);
    }
}

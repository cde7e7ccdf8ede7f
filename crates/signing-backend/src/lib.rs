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

//! # Signing Backends 🕸️
//!
//! The relayer signs two things with the same key: the confirmation message
//! checked by the contract, and the transaction carrying it.

use agent_relayer_types::invocation::ConfirmationMessage;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Signature, H256, U256};

/// A module for signing with a key held in memory.
pub mod local;
/// Nonces for confirmation messages.
pub mod nonce;

pub use local::LocalSigningBackend;
pub use nonce::ConfirmationNonce;

/// A Signing backend holds the relayer credential.
#[async_trait::async_trait]
pub trait SigningBackend: Send + Sync {
    /// The relayer address, the one the contract recovers from signatures.
    fn address(&self) -> Address;

    /// The chain id bound into every confirmation message.
    fn chain_id(&self) -> u64;

    /// Builds the message for one result, bound to [`Self::chain_id`].
    fn confirmation_message(
        &self,
        agent_id: U256,
        invocation_id: H256,
        content_hash: H256,
        nonce: U256,
    ) -> ConfirmationMessage {
        ConfirmationMessage {
            agent_id,
            invocation_id,
            content_hash,
            nonce,
            chain_id: U256::from(self.chain_id()),
        }
    }

    /// Signs `keccak256(message)` with the personal message prefix
    /// (`"\x19Ethereum Signed Message:\n32"`).
    async fn sign_confirmation(
        &self,
        message: &ConfirmationMessage,
    ) -> agent_relayer_utils::Result<Signature>;

    /// Signs a chain transaction sent from [`Self::address`].
    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
    ) -> agent_relayer_utils::Result<Signature>;
}

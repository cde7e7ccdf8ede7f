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

use agent_relayer_types::invocation::ConfirmationMessage;
use agent_relayer_types::private_key::PrivateKey;
use ethers::core::k256::SecretKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Signature};
use typed_builder::TypedBuilder;

/// A SigningBackend that uses the relayer's private key held in memory.
#[derive(Debug, Clone, TypedBuilder)]
pub struct LocalSigningBackend {
    /// The relayer wallet, its chain id is the one bound into messages.
    wallet: LocalWallet,
}

impl LocalSigningBackend {
    /// Creates the backend from a raw private key.
    pub fn from_private_key(
        private_key: &PrivateKey,
        chain_id: u64,
    ) -> agent_relayer_utils::Result<Self> {
        let key = SecretKey::from_slice(private_key.as_bytes())?;
        let wallet = LocalWallet::from(key).with_chain_id(chain_id);
        Ok(Self { wallet })
    }
}

#[async_trait::async_trait]
impl super::SigningBackend for LocalSigningBackend {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    fn chain_id(&self) -> u64 {
        self.wallet.chain_id()
    }

    #[tracing::instrument(
        skip_all,
        fields(invocation_id = ?message.invocation_id, nonce = %message.nonce)
    )]
    async fn sign_confirmation(
        &self,
        message: &ConfirmationMessage,
    ) -> agent_relayer_utils::Result<Signature> {
        let hash = message.hash();
        let signature = self.wallet.sign_message(hash.as_bytes()).await?;
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::SigningBackend,
            backend = "Local",
            invocation_id = ?message.invocation_id,
            message_hash = ?hash,
            signature = %hex::encode(signature.to_vec()),
        );
        Ok(signature)
    }

    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
    ) -> agent_relayer_utils::Result<Signature> {
        let signature = self.wallet.sign_transaction(tx).await?;
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SigningBackend;
    use ethers::types::{TransactionRequest, H256, U256};
    use ethers::utils::keccak256;

    // anvil / hardhat account #0
    const KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn backend(chain_id: u64) -> LocalSigningBackend {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(KEY, &mut bytes).unwrap();
        LocalSigningBackend::from_private_key(
            &PrivateKey::from(H256(bytes)),
            chain_id,
        )
        .unwrap()
    }

    fn message(signer: &LocalSigningBackend) -> ConfirmationMessage {
        signer.confirmation_message(
            U256::from(7),
            H256::repeat_byte(0x11),
            H256::repeat_byte(0x22),
            U256::from(1_700_000_000u64),
        )
    }

    #[tokio::test]
    async fn signature_recovers_to_relayer_address() {
        let signer = backend(50312);
        assert_eq!(format!("{:?}", signer.address()), ADDRESS);
        let message = message(&signer);
        assert_eq!(message.chain_id, U256::from(50312));
        let signature = signer.sign_confirmation(&message).await.unwrap();
        assert_eq!(signature.to_vec().len(), 65);

        // What `ecrecover(toEthSignedMessageHash(hash), sig)` does on chain.
        let mut prefixed = b"\x19Ethereum Signed Message:\n32".to_vec();
        prefixed.extend_from_slice(message.hash().as_bytes());
        let eth_signed_hash = H256(keccak256(prefixed));
        assert_eq!(signature.recover(eth_signed_hash).unwrap(), signer.address());
        signature
            .verify(message.hash().as_bytes(), signer.address())
            .unwrap();
    }

    #[tokio::test]
    async fn signing_is_deterministic() {
        let signer = backend(50312);
        let message = message(&signer);
        let first = signer.sign_confirmation(&message).await.unwrap();
        let second = signer.sign_confirmation(&message).await.unwrap();
        assert_eq!(first, second);

        let mut other = message;
        other.nonce = other.nonce + 1;
        let third = signer.sign_confirmation(&other).await.unwrap();
        assert_ne!(first, third);
    }

    #[tokio::test]
    async fn chain_id_changes_the_signature() {
        let a = backend(1);
        let b = backend(2);
        let sig_a = a.sign_confirmation(&message(&a)).await.unwrap();
        let sig_b = b.sign_confirmation(&message(&b)).await.unwrap();
        assert_ne!(sig_a, sig_b);
    }

    #[tokio::test]
    async fn transactions_recover_to_relayer_address() {
        let signer = backend(31337);
        let tx: TypedTransaction = TransactionRequest::new()
            .from(signer.address())
            .to(ethers::types::Address::repeat_byte(0xaa))
            .nonce(0u64)
            .gas(600_000u64)
            .gas_price(1u64)
            .chain_id(31337u64)
            .into();
        let signature = signer.sign_transaction(&tx).await.unwrap();
        assert_eq!(signature.recover(tx.sighash()).unwrap(), signer.address());
    }
}

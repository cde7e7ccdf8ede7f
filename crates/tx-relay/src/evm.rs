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

use std::sync::Arc;
use std::time::Duration;

use agent_relayer_config::TxConfig;
use agent_relayer_signing_backend::SigningBackend;
use agent_relayer_types::invocation::{SignedConfirmation, CONFIRM_RESULT_FN};
use agent_relayer_utils::clickable_link::{tx_explorer_url, ClickableLink};
use agent_relayer_utils::metric::Metrics;
use agent_relayer_utils::retry::with_timeout;
use agent_relayer_utils::{Error, Result};
use ethers::abi::Abi;
use ethers::contract::BaseContract;
use ethers::providers::{JsonRpcClient, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, BlockNumber, Bytes, TransactionReceipt, TransactionRequest, H256,
    U256,
};
use ethers::utils::keccak256;
use typed_builder::TypedBuilder;
use url::Url;

use crate::nonce_manager::TxNonceManager;

/// A [`ChainWriter`](crate::ChainWriter) that sends legacy transactions
/// through an `ethers` provider.
#[derive(TypedBuilder)]
pub struct EthersChainWriter<P: JsonRpcClient> {
    client: Arc<Provider<P>>,
    /// The call manager contract address.
    contract_address: Address,
    /// The call manager ABI, used to encode `confirmResult`.
    #[builder(setter(transform = |abi: Abi| BaseContract::from(abi)))]
    contract: BaseContract,
    signer: Arc<dyn SigningBackend>,
    tx_config: TxConfig,
    #[builder(default)]
    explorer: Option<Url>,
    metrics: Arc<Metrics>,
    /// Bound of every call made before the receipt wait.
    #[builder(default = Duration::from_secs(30))]
    rpc_timeout: Duration,
    #[builder(default)]
    nonces: TxNonceManager,
}

impl<P: JsonRpcClient> std::fmt::Debug for EthersChainWriter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthersChainWriter")
            .field("contract_address", &self.contract_address)
            .field("relayer", &self.signer.address())
            .field("tx_config", &self.tx_config)
            .finish()
    }
}

impl<P: JsonRpcClient + 'static> EthersChainWriter<P> {
    /// ABI encoded `confirmResult(agentId, invocationId, resultHash, nonce, signature)`.
    pub fn encode_confirmation(
        &self,
        signed: &SignedConfirmation,
    ) -> Result<Bytes> {
        encode_confirmation(&self.contract, signed)
    }

    fn link(&self, tx_hash: H256) -> String {
        let text = format!("{tx_hash:#x}");
        match tx_explorer_url(self.explorer.as_ref(), tx_hash) {
            Some(url) => ClickableLink::new(&text, url.as_str()).to_string(),
            None => text,
        }
    }

    /// Signs and broadcasts the transaction, returning its hash.
    ///
    /// Holds the nonce reservation until the node accepted the transaction.
    async fn broadcast(&self, data: Bytes) -> Result<H256> {
        let relayer = self.signer.address();
        let client = &self.client;
        let timeout = self.rpc_timeout;
        let gas_price = with_timeout("eth_gasPrice", timeout, async {
            Ok::<_, Error>(client.get_gas_price().await?)
        })
        .await?;
        let reservation = self
            .nonces
            .reserve(move || {
                with_timeout("eth_getTransactionCount", timeout, async move {
                    let nonce = client
                        .get_transaction_count(
                            relayer,
                            Some(BlockNumber::Pending.into()),
                        )
                        .await?;
                    Ok::<_, Error>(nonce)
                })
            })
            .await?;
        let tx = build_transaction(
            relayer,
            self.contract_address,
            data,
            reservation.nonce(),
            self.tx_config.gas_limit,
            gas_price,
            self.signer.chain_id(),
        );
        let signature = self.signer.sign_transaction(&tx).await?;
        let raw = tx.rlp_signed(&signature);
        let tx_hash = H256(keccak256(&raw));

        let sent = with_timeout("eth_sendRawTransaction", timeout, async {
            let pending = client.send_raw_transaction(raw).await?;
            Ok::<_, Error>(*pending)
        })
        .await;
        match sent {
            Ok(tx_hash) => {
                reservation.commit();
                Ok(tx_hash)
            }
            Err(e) => {
                reservation.release();
                tracing::error!(
                    "Error while sending tx {}, {}",
                    self.link(tx_hash),
                    e
                );
                tracing::event!(
                    target: agent_relayer_utils::probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %agent_relayer_utils::probe::Kind::TxRelay,
                    errored = true,
                    %tx_hash,
                    error = %e,
                );
                Err(e)
            }
        }
    }

    /// Waits for the receipt of a broadcast transaction.
    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<TransactionReceipt> {
        let timeout = self.tx_config.receipt_timeout();
        let pending = ethers::providers::PendingTransaction::new(
            tx_hash,
            self.client.as_ref(),
        )
        .interval(self.tx_config.receipt_poll_interval())
        .confirmations(self.tx_config.block_confirmations);
        match tokio::time::timeout(timeout, pending).await {
            Ok(Ok(Some(receipt))) => Ok(receipt),
            // a node behind a load balancer may not have seen the tx yet.
            Ok(Ok(None)) => {
                match lookup_receipt(self.client.as_ref(), tx_hash, self.rpc_timeout)
                    .await
                {
                    Ok(Some(receipt)) => {
                        tracing::debug!("Tx {} was mined after all", self.link(tx_hash));
                        Ok(receipt)
                    }
                    Ok(None) => {
                        tracing::warn!(
                            "Tx {} Dropped from Mempool!!",
                            self.link(tx_hash)
                        );
                        // the nonce was not used after all.
                        self.nonces.invalidate().await;
                        Err(Error::TransactionDropped { tx_hash })
                    }
                    Err(e) => Err(Error::ReceiptUnavailable {
                        tx_hash,
                        reason: e.to_string(),
                    }),
                }
            }
            Ok(Err(e)) => Err(Error::ReceiptUnavailable {
                tx_hash,
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ReceiptTimeout { tx_hash, timeout }),
        }
    }
}

#[async_trait::async_trait]
impl<P: JsonRpcClient + 'static> super::ChainWriter for EthersChainWriter<P> {
    #[tracing::instrument(
        skip_all,
        fields(
            invocation_id = ?signed.message.invocation_id,
            nonce = %signed.message.nonce,
        )
    )]
    async fn confirm(
        &self,
        signed: &SignedConfirmation,
    ) -> Result<TransactionReceipt> {
        let invocation_id = signed.message.invocation_id;
        let data = self.encode_confirmation(signed)?;
        let tx_hash = self.broadcast(data).await?;
        self.metrics.total_transaction_made.inc();
        tracing::info!("Tx {} is submitted and pending!", self.link(tx_hash));
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::TxRelay,
            pending = true,
            ?invocation_id,
            %tx_hash,
        );

        let receipt = self.wait_for_receipt(tx_hash).await?;
        let gas_used = receipt.gas_used.unwrap_or_default();
        let gas_price = receipt.effective_gas_price.unwrap_or_default();
        self.metrics
            .gas_spent
            .inc_by(crate::wei_to_gwei(gas_used.saturating_mul(gas_price)));
        let receipt = check_receipt(receipt, invocation_id)?;
        tracing::info!("Tx {} Finalized", self.link(receipt.transaction_hash));
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::TxRelay,
            finalized = true,
            ?invocation_id,
            tx_hash = %receipt.transaction_hash,
            block_number = ?receipt.block_number,
        );
        Ok(receipt)
    }
}

/// Fetches the receipt of `tx_hash` once, `None` when the node does not know it.
pub async fn lookup_receipt<P: JsonRpcClient>(
    client: &Provider<P>,
    tx_hash: H256,
    timeout: Duration,
) -> Result<Option<TransactionReceipt>> {
    with_timeout("eth_getTransactionReceipt", timeout, async {
        Ok::<_, Error>(client.get_transaction_receipt(tx_hash).await?)
    })
    .await
}

/// ABI encoded `confirmResult` call data.
pub fn encode_confirmation(
    contract: &BaseContract,
    signed: &SignedConfirmation,
) -> Result<Bytes> {
    let message = &signed.message;
    let data = contract.encode(
        CONFIRM_RESULT_FN,
        (
            message.agent_id,
            message.invocation_id.to_fixed_bytes(),
            message.content_hash.to_fixed_bytes(),
            message.nonce,
            signed.signature_bytes(),
        ),
    )?;
    Ok(data)
}

/// A legacy transaction to the call manager.
pub fn build_transaction(
    from: Address,
    to: Address,
    data: Bytes,
    nonce: U256,
    gas_limit: u64,
    gas_price: U256,
    chain_id: u64,
) -> TypedTransaction {
    TransactionRequest::new()
        .from(from)
        .to(to)
        .data(data)
        .nonce(nonce)
        .gas(gas_limit)
        .gas_price(gas_price)
        .chain_id(chain_id)
        .into()
}

/// Turns a mined but reverted transaction into an error.
pub fn check_receipt(
    receipt: TransactionReceipt,
    invocation_id: H256,
) -> Result<TransactionReceipt> {
    match receipt.status {
        Some(status) if status.is_zero() => {
            tracing::error!(
                ?invocation_id,
                tx_hash = ?receipt.transaction_hash,
                "confirmResult reverted"
            );
            Err(Error::TransactionReverted {
                invocation_id,
                tx_hash: receipt.transaction_hash,
            })
        }
        _ => Ok(receipt),
    }
}

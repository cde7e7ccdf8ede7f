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

use axum::extract::State;
use axum::Json;
use ethers::signers::Signer;
use ethers::types::Address;
use serde::Serialize;

use agent_relayer_context::RelayerContext;
use agent_relayer_store::{HistoryStore, InvocationStore};
use agent_relayer_types::invocation::FailureRecord;
use agent_relayer_utils::HandlerError;

/// What the relayer is watching and how far it got.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerInformationResponse {
    /// The address confirmations are signed and sent from.
    pub relayer: Address,
    /// The watched chain.
    pub chain_id: u64,
    /// The watched call manager contract.
    pub call_manager: Address,
    /// The agent registry, informational only.
    pub registry: Option<Address>,
    /// Whether results come from the mock producer.
    pub mock_mode: bool,
    /// The last fully dispatched block.
    pub checkpoint: u64,
    /// The chain head at the last poll.
    pub target_block: u64,
    /// Failed dispatches, oldest first.
    pub failures: Vec<FailureRecord>,
}

/// Handles relayer information requests
///
/// Returns a Result with the `RelayerInformationResponse` on success
///
/// # Arguments
///
/// * `ctx` - RelayContext reference that holds the configuration
pub async fn handle_relayer_info(
    State(ctx): State<Arc<RelayerContext>>,
) -> Result<Json<RelayerInformationResponse>, HandlerError> {
    let wallet = ctx.evm_wallet()?;
    let key = ctx.history_key();
    let store = ctx.store();
    Ok(Json(RelayerInformationResponse {
        relayer: wallet.address(),
        chain_id: ctx.config.chain_id,
        call_manager: ctx.config.call_manager_address,
        registry: ctx.config.registry_address,
        mock_mode: !ctx.config.uses_live_generation(),
        checkpoint: store.get_last_block_number(key, 0)?,
        target_block: store.get_target_block_number(key, 0)?,
        failures: store.failures(key)?,
    }))
}

#[cfg(test)]
mod tests {
    use agent_relayer_types::invocation::DispatchStage;
    use ethers::types::{H256, U256};

    use super::*;
    use crate::routes::test_utils::context;

    #[tokio::test]
    async fn reports_progress_and_failures() {
        let ctx = context();
        let key = ctx.history_key();
        ctx.store().set_last_block_number(key, 100).unwrap();
        ctx.store().set_target_block_number(key, 120).unwrap();
        ctx.store()
            .record_failure(
                key,
                FailureRecord {
                    invocation_id: H256::repeat_byte(0x11),
                    agent_id: U256::from(7),
                    block_number: 100,
                    stage: DispatchStage::Submit,
                    reason: "reverted".into(),
                },
            )
            .unwrap();

        let Json(info) = handle_relayer_info(State(ctx)).await.ok().unwrap();
        assert_eq!(info.chain_id, 31337);
        assert_eq!(info.checkpoint, 100);
        assert_eq!(info.target_block, 120);
        assert!(info.mock_mode);
        assert_eq!(info.failures.len(), 1);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json["relayer"],
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(json["failures"][0]["stage"], "submit");
    }
}

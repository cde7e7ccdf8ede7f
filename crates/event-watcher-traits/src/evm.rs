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

use std::ops;
use std::sync::Arc;

use agent_relayer_types::invocation::{
    InvocationRequest, ObservedInvocation, AGENT_INVOKED_EVENT,
};
use agent_relayer_utils::{Error, Result};
use ethers::abi::{self, Abi, Event, RawLog, Token};
use ethers::contract::Contract;
use ethers::providers::{JsonRpcClient, Middleware, Provider};
use ethers::types::{Address, Filter, Log, H256};

/// Names the paid amount parameter goes by in the deployed contract versions.
const PAID_PARAM_NAMES: &[&str] = &["paid", "value", "paidAmount"];

/// The call manager contract, together with the client used to query it.
#[derive(Debug)]
pub struct CallManagerContractWrapper<P: JsonRpcClient> {
    contract: Contract<Provider<P>>,
    client: Arc<Provider<P>>,
    event: Event,
}

impl<P: JsonRpcClient> CallManagerContractWrapper<P> {
    /// Creates a new CallManagerContractWrapper.
    ///
    /// Fails if `abi` has no `AgentInvoked` event.
    pub fn new(
        address: Address,
        abi: Abi,
        client: Arc<Provider<P>>,
    ) -> Result<Self> {
        let event = abi
            .event(AGENT_INVOKED_EVENT)
            .map_err(|_| Error::MissingAbiEntry {
                name: AGENT_INVOKED_EVENT,
            })?
            .clone();
        Ok(Self {
            contract: Contract::new(address, abi, client.clone()),
            client,
            event,
        })
    }
}

impl<P: JsonRpcClient> ops::Deref for CallManagerContractWrapper<P> {
    type Target = Contract<Provider<P>>;

    fn deref(&self) -> &Self::Target {
        &self.contract
    }
}

#[async_trait::async_trait]
impl<P> super::ChainReader for CallManagerContractWrapper<P>
where
    P: JsonRpcClient + 'static,
{
    async fn block_number(&self) -> Result<u64> {
        let block = self.client.get_block_number().await?;
        Ok(block.as_u64())
    }

    #[tracing::instrument(skip(self), fields(address = %self.address()))]
    async fn invocations(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<ObservedInvocation>> {
        if to < from {
            return Ok(Vec::new());
        }
        let filter = Filter::new()
            .address(self.address())
            .topic0(self.event.signature())
            .from_block(from)
            .to_block(to);
        let logs = self.client.get_logs(&filter).await?;
        tracing::trace!("Found #{} logs", logs.len());
        logs.into_iter()
            .map(|log| decode_invocation(&self.event, log))
            .collect()
    }
}

/// Decodes one `AgentInvoked` log with the event description from the ABI.
pub fn decode_invocation(event: &Event, log: Log) -> Result<ObservedInvocation> {
    let block_number = log
        .block_number
        .ok_or_else(|| invalid("log has no block number"))?
        .as_u64();
    let parsed = event
        .parse_log(RawLog {
            topics: log.topics,
            data: log.data.to_vec(),
        })
        .map_err(|e| invalid(e.to_string()))?;

    let agent_id = param(&parsed, &["agentId"])?
        .into_uint()
        .ok_or_else(|| invalid("agentId is not an uint"))?;
    let invocation_id = param(&parsed, &["invocationId"])?
        .into_fixed_bytes()
        .filter(|bytes| bytes.len() == 32)
        .map(|bytes| H256::from_slice(&bytes))
        .ok_or_else(|| invalid("invocationId is not a bytes32"))?;
    let caller = param(&parsed, &["caller"])?
        .into_address()
        .ok_or_else(|| invalid("caller is not an address"))?;
    let paid_amount = param(&parsed, PAID_PARAM_NAMES)?
        .into_uint()
        .ok_or_else(|| invalid("paid amount is not an uint"))?;

    Ok(ObservedInvocation {
        request: InvocationRequest {
            agent_id,
            invocation_id,
            caller,
            paid_amount,
        },
        block_number,
        log_index: log.log_index,
        transaction_hash: log.transaction_hash,
    })
}

fn param(log: &abi::Log, names: &[&str]) -> Result<Token> {
    log.params
        .iter()
        .find(|p| names.contains(&p.name.as_str()))
        .map(|p| p.value.clone())
        .ok_or_else(|| invalid(format!("missing parameter {}", names[0])))
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidEvent {
        reason: reason.into(),
    }
}

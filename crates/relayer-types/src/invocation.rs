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

//! Invocation and confirmation types.
//!
//! An invocation flows through the relayer as
//! [`InvocationRequest`] → [`RequestDescriptor`] → [`ResultPayload`] →
//! [`UploadRecord`] → [`ConfirmationMessage`] → [`SignedConfirmation`].

use ethers::abi::Token;
use ethers::types::{Address, Bytes, Signature, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

/// Name of the contract function that accepts a signed result.
pub const CONFIRM_RESULT_FN: &str = "confirmResult";
/// Name of the contract event emitted for every invocation.
pub const AGENT_INVOKED_EVENT: &str = "AgentInvoked";

/// A request for off-chain computation, decoded from one `AgentInvoked` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    pub agent_id: U256,
    pub invocation_id: H256,
    pub caller: Address,
    pub paid_amount: U256,
}

/// An [`InvocationRequest`] together with where it was found on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedInvocation {
    pub request: InvocationRequest,
    pub block_number: u64,
    pub log_index: Option<U256>,
    pub transaction_hash: Option<H256>,
}

/// Describes which computation to run for an invocation.
///
/// Only depends on the agent and invocation ids, so building it again for a
/// retried dispatch gives the same descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub agent_id: U256,
    pub invocation_id: H256,
    pub prompt: String,
}

impl RequestDescriptor {
    pub fn for_invocation(request: &InvocationRequest) -> Self {
        let prompt = format!(
            "Run agent {} for invocation {:#x}",
            request.agent_id, request.invocation_id
        );
        Self {
            agent_id: request.agent_id,
            invocation_id: request.invocation_id,
            prompt,
        }
    }
}

/// The result produced for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub agent_id: U256,
    pub invocation_id: H256,
    pub output: String,
}

impl ResultPayload {
    /// Compact JSON with the fields in declaration order.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Where a payload was stored and the digest binding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub locator: String,
    pub content_hash: H256,
}

/// The tuple the contract verifies the relayer signature against.
///
/// Field order and widths must match the on-chain verifier:
/// `(uint256 agentId, bytes32 invocationId, bytes32 resultHash, uint256 nonce, uint256 chainId)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationMessage {
    pub agent_id: U256,
    pub invocation_id: H256,
    pub content_hash: H256,
    pub nonce: U256,
    pub chain_id: U256,
}

impl ConfirmationMessage {
    /// Solidity `abi.encodePacked` of the five fields, 160 bytes.
    ///
    /// Every field is a full 32 byte word, so the packed encoding equals the
    /// standard one.
    pub fn encode(&self) -> Vec<u8> {
        ethers::abi::encode(&[
            Token::Uint(self.agent_id),
            Token::FixedBytes(self.invocation_id.as_bytes().to_vec()),
            Token::FixedBytes(self.content_hash.as_bytes().to_vec()),
            Token::Uint(self.nonce),
            Token::Uint(self.chain_id),
        ])
    }

    /// `keccak256` of [`Self::encode`], the digest that gets signed.
    pub fn hash(&self) -> H256 {
        H256(keccak256(self.encode()))
    }
}

/// A confirmation message with the relayer's signature over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedConfirmation {
    pub message: ConfirmationMessage,
    pub signature: Signature,
}

impl SignedConfirmation {
    /// The 65 byte `r ‖ s ‖ v` form the contract expects.
    pub fn signature_bytes(&self) -> Bytes {
        Bytes::from(self.signature.to_vec())
    }
}

/// The pipeline stage an invocation failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStage {
    Produce,
    Upload,
    Sign,
    Submit,
}

impl std::fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Produce => "produce",
            Self::Upload => "upload",
            Self::Sign => "sign",
            Self::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// A failed dispatch kept for operator follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub invocation_id: H256,
    pub agent_id: U256,
    pub block_number: u64,
    pub stage: DispatchStage,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InvocationRequest {
        InvocationRequest {
            agent_id: U256::from(7),
            invocation_id: H256::repeat_byte(0x11),
            caller: Address::repeat_byte(0xab),
            paid_amount: U256::from(1000),
        }
    }

    #[test]
    fn descriptor_depends_only_on_ids() {
        let first = RequestDescriptor::for_invocation(&request());
        let mut other = request();
        other.paid_amount = U256::from(1);
        other.caller = Address::zero();
        assert_eq!(first, RequestDescriptor::for_invocation(&other));
        assert_eq!(
            first.prompt,
            format!("Run agent 7 for invocation 0x{}", "11".repeat(32))
        );
    }

    #[test]
    fn confirmation_message_layout() {
        let message = ConfirmationMessage {
            agent_id: U256::from(7),
            invocation_id: H256::repeat_byte(0x11),
            content_hash: H256::repeat_byte(0x22),
            nonce: U256::from(1_700_000_000u64),
            chain_id: U256::from(50312),
        };
        let encoded = message.encode();
        assert_eq!(encoded.len(), 160);
        assert_eq!(U256::from_big_endian(&encoded[0..32]), U256::from(7));
        assert_eq!(&encoded[32..64], H256::repeat_byte(0x11).as_bytes());
        assert_eq!(&encoded[64..96], H256::repeat_byte(0x22).as_bytes());
        assert_eq!(
            U256::from_big_endian(&encoded[96..128]),
            U256::from(1_700_000_000u64)
        );
        assert_eq!(
            U256::from_big_endian(&encoded[128..160]),
            U256::from(50312)
        );
        assert_eq!(message.hash(), H256(keccak256(&encoded)));
    }

    #[test]
    fn canonical_bytes_are_stable() {
        let payload = ResultPayload {
            agent_id: U256::from(7),
            invocation_id: H256::repeat_byte(0x11),
            output: "hello".into(),
        };
        let bytes = payload.canonical_bytes().unwrap();
        assert_eq!(bytes, payload.clone().canonical_bytes().unwrap());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\"agentId\":\"0x7\",\"invocationId\":\"0x1111"));
        assert!(text.ends_with(",\"output\":\"hello\"}"));
    }
}

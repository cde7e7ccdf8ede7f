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

use agent_relayer_types::invocation::{ResultPayload, UploadRecord};
use agent_relayer_utils::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ethers::types::H256;
use ethers::utils::keccak256;

/// An Uploader that does not upload at all: the locator carries the whole
/// payload as a base64 `data:` URI.
///
/// The content hash is `keccak256` over the canonical payload bytes, so
/// whoever resolves the locator can check it against the confirmed hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUriUploader;

impl DataUriUploader {
    /// Prefix of every locator.
    pub const PREFIX: &'static str = "data:application/json;base64,";
}

#[async_trait::async_trait]
impl super::Uploader for DataUriUploader {
    async fn upload(&self, payload: &ResultPayload) -> Result<UploadRecord> {
        let body = payload.canonical_bytes()?;
        let content_hash = H256(keccak256(&body));
        let locator = format!("{}{}", Self::PREFIX, STANDARD.encode(&body));
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::ResultBackend,
            backend = "DataUri",
            invocation_id = ?payload.invocation_id,
            content_hash = ?content_hash,
            size = body.len(),
        );
        Ok(UploadRecord {
            locator,
            content_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Uploader;
    use ethers::types::U256;

    use super::*;

    fn payload(output: &str) -> ResultPayload {
        ResultPayload {
            agent_id: U256::from(7),
            invocation_id: H256::repeat_byte(0x11),
            output: output.into(),
        }
    }

    #[tokio::test]
    async fn upload_is_idempotent() {
        let first = DataUriUploader.upload(&payload("hello")).await.unwrap();
        let second = DataUriUploader.upload(&payload("hello")).await.unwrap();
        assert_eq!(first, second);

        let other = DataUriUploader.upload(&payload("hello!")).await.unwrap();
        assert_ne!(first.content_hash, other.content_hash);
    }

    #[tokio::test]
    async fn locator_resolves_to_hashed_bytes() {
        let payload = payload("[MOCK RESPONSE] Run agent 7");
        let record = DataUriUploader.upload(&payload).await.unwrap();
        let encoded = record
            .locator
            .strip_prefix(DataUriUploader::PREFIX)
            .expect("data uri prefix");
        let body = STANDARD.decode(encoded).unwrap();
        assert_eq!(H256(keccak256(&body)), record.content_hash);
        let decoded: ResultPayload = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded, payload);
    }
}

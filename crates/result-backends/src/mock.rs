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

use agent_relayer_types::invocation::{RequestDescriptor, ResultPayload};
use agent_relayer_utils::Result;

/// A ResultProducer that echoes the prompt back.
///
/// Used when the relayer runs in mock mode, or when no API key was configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockResultProducer;

impl MockResultProducer {
    /// Prefix of every mock output.
    pub const PREFIX: &'static str = "[MOCK RESPONSE]";
}

#[async_trait::async_trait]
impl super::ResultProducer for MockResultProducer {
    async fn produce(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResultPayload> {
        let output = format!("{} {}", Self::PREFIX, descriptor.prompt);
        tracing::event!(
            target: agent_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %agent_relayer_utils::probe::Kind::ResultBackend,
            backend = "Mock",
            invocation_id = ?descriptor.invocation_id,
        );
        Ok(ResultPayload {
            agent_id: descriptor.agent_id,
            invocation_id: descriptor.invocation_id,
            output,
        })
    }
}

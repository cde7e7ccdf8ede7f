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

mod info;
mod metric;

pub use info::*;
pub use metric::*;

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::Arc;

    use agent_relayer_config::utils::parse_from_str;
    use agent_relayer_context::RelayerContext;
    use agent_relayer_store::InMemoryStore;
    use ethers::abi::Abi;

    pub fn context() -> Arc<RelayerContext> {
        let config = parse_from_str(
            r#"
            rpc_url = "http://localhost:8545"
            chain_id = 31337
            private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            call_manager_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
            "#,
        )
        .unwrap();
        Arc::new(
            RelayerContext::with_abi(
                config,
                InMemoryStore::default(),
                Abi::default(),
            )
            .unwrap(),
        )
    }
}

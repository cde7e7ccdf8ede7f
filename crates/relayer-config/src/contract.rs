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

use std::path::Path;

use agent_relayer_types::invocation::{AGENT_INVOKED_EVENT, CONFIRM_RESULT_FN};
use agent_relayer_utils::Error;
use ethers::abi::{Abi, ParamType};

/// Loads the `AgentCallManagerWithVerify` ABI.
///
/// The file can either be a compiler artifact (`{"abi": [...], ...}`) or a bare
/// ABI array. The ABI must contain the `AgentInvoked` event and a
/// `confirmResult(uint256,bytes32,bytes32,uint256,bytes)` function.
pub fn load_call_manager_abi<P: AsRef<Path>>(
    path: P,
) -> agent_relayer_utils::Result<Abi> {
    let path = path.as_ref();
    tracing::debug!("Loading contract ABI from {}", path.display());
    let raw = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingContractAbi {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    let artifact: serde_json::Value = serde_json::from_slice(&raw)?;
    let abi_value = match artifact {
        serde_json::Value::Object(mut fields) => {
            fields.remove("abi").ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{} is a JSON object without an `abi` field",
                    path.display()
                ))
            })?
        }
        other => other,
    };
    let abi: Abi = serde_json::from_value(abi_value)?;
    check_call_manager_abi(&abi)?;
    Ok(abi)
}

fn check_call_manager_abi(abi: &Abi) -> agent_relayer_utils::Result<()> {
    let confirm = abi.function(CONFIRM_RESULT_FN).map_err(|_| {
        Error::MissingAbiEntry {
            name: CONFIRM_RESULT_FN,
        }
    })?;
    let expected = [
        ParamType::Uint(256),
        ParamType::FixedBytes(32),
        ParamType::FixedBytes(32),
        ParamType::Uint(256),
        ParamType::Bytes,
    ];
    let actual = confirm
        .inputs
        .iter()
        .map(|p| p.kind.clone())
        .collect::<Vec<_>>();
    if actual != expected {
        return Err(Error::InvalidConfig(format!(
            "{CONFIRM_RESULT_FN} has inputs {actual:?}, expected (uint256,bytes32,bytes32,uint256,bytes)"
        )));
    }
    abi.event(AGENT_INVOKED_EVENT)
        .map_err(|_| Error::MissingAbiEntry {
            name: AGENT_INVOKED_EVENT,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// The ABI entries the relayer needs, in the layout the contract compiler emits.
    const CALL_MANAGER_ABI: &str = r#"[
        {
            "type": "event",
            "name": "AgentInvoked",
            "anonymous": false,
            "inputs": [
                { "name": "agentId", "type": "uint256", "indexed": true },
                { "name": "invocationId", "type": "bytes32", "indexed": true },
                { "name": "caller", "type": "address", "indexed": true },
                { "name": "paid", "type": "uint256", "indexed": false }
            ]
        },
        {
            "type": "function",
            "name": "confirmResult",
            "stateMutability": "nonpayable",
            "inputs": [
                { "name": "agentId", "type": "uint256" },
                { "name": "invocationId", "type": "bytes32" },
                { "name": "resultHash", "type": "bytes32" },
                { "name": "nonce", "type": "uint256" },
                { "name": "signature", "type": "bytes" }
            ],
            "outputs": []
        }
    ]"#;

    fn write_tmp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_bare_abi_and_artifact() {
        let bare = write_tmp(CALL_MANAGER_ABI);
        let abi = load_call_manager_abi(bare.path()).unwrap();
        assert!(abi.function("confirmResult").is_ok());

        let artifact = write_tmp(&format!(
            r#"{{ "contractName": "AgentCallManagerWithVerify", "abi": {CALL_MANAGER_ABI} }}"#
        ));
        let abi = load_call_manager_abi(artifact.path()).unwrap();
        assert!(abi.event("AgentInvoked").is_ok());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AgentCallManagerWithVerify.json");
        assert!(matches!(
            load_call_manager_abi(&path),
            Err(Error::MissingContractAbi { path: p }) if p == path
        ));
    }

    #[test]
    fn missing_entries_are_reported() {
        let file = write_tmp(
            r#"[{ "type": "function", "name": "other", "inputs": [], "outputs": [] }]"#,
        );
        assert!(matches!(
            load_call_manager_abi(file.path()),
            Err(Error::MissingAbiEntry {
                name: "confirmResult"
            })
        ));
    }

    #[test]
    fn wrong_confirm_signature_is_rejected() {
        let abi = CALL_MANAGER_ABI.replace(
            r#"{ "name": "nonce", "type": "uint256" },"#,
            "",
        );
        let file = write_tmp(&abi);
        assert!(matches!(
            load_call_manager_abi(file.path()),
            Err(Error::InvalidConfig(_))
        ));
    }
}

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

use ethers::types::H256;
use serde::Deserialize;

/// PrivateKey represents a secp256k1 private key.
///
/// It never shows up in `Debug` output and cannot be serialized.
#[derive(Clone)]
pub struct PrivateKey(H256);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").finish()
    }
}

impl From<H256> for PrivateKey {
    fn from(secret: H256) -> Self {
        PrivateKey(secret)
    }
}

impl std::ops::Deref for PrivateKey {
    type Target = H256;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn parse_hex_secret(value: &str) -> Result<H256, String> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.len() != 64 {
        return Err(format!(
            "expected 64 hex chars (optionally prefixed with 0x) but found {}",
            digits.len()
        ));
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(digits, &mut bytes).map_err(|e| e.to_string())?;
    Ok(H256(bytes))
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct PrivateKeyVistor;
        impl<'de> serde::de::Visitor<'de> for PrivateKeyVistor {
            type Value = H256;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str(
                    "hex string or an env var containing a hex string in it",
                )
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if let Some(var) = value.strip_prefix('$') {
                    tracing::trace!("Reading {} from env", var);
                    let val = std::env::var(var).map_err(|e| {
                        serde::de::Error::custom(format!(
                            "error while loading this env {var}: {e}",
                        ))
                    })?;
                    parse_hex_secret(&val).map_err(serde::de::Error::custom)
                } else if value.starts_with('>') {
                    Err(serde::de::Error::custom(
                        "command execution is not supported for private keys",
                    ))
                } else {
                    parse_hex_secret(value).map_err(serde::de::Error::custom)
                }
            }
        }

        let secret = deserializer.deserialize_str(PrivateKeyVistor)?;
        Ok(Self(secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str =
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn parses_prefixed_and_bare_hex() {
        let prefixed: PrivateKey =
            serde_json::from_value(serde_json::json!(KEY)).unwrap();
        let bare: PrivateKey =
            serde_json::from_value(serde_json::json!(&KEY[2..])).unwrap();
        assert_eq!(*prefixed, *bare);
    }

    #[test]
    fn reads_key_from_env() {
        std::env::set_var("AGENT_RELAYER_TEST_PRIVATE_KEY", KEY);
        let key: PrivateKey = serde_json::from_value(serde_json::json!(
            "$AGENT_RELAYER_TEST_PRIVATE_KEY"
        ))
        .unwrap();
        assert_eq!(format!("{:#x}", *key), KEY);
    }

    #[test]
    fn rejects_short_keys_and_commands() {
        assert!(serde_json::from_value::<PrivateKey>(serde_json::json!(
            "0x1234"
        ))
        .is_err());
        assert!(serde_json::from_value::<PrivateKey>(serde_json::json!(
            "> pass show relayer"
        ))
        .is_err());
    }

    #[test]
    fn debug_does_not_leak_the_key() {
        let key: PrivateKey =
            serde_json::from_value(serde_json::json!(KEY)).unwrap();
        assert_eq!(format!("{key:?}"), "PrivateKey");
    }
}

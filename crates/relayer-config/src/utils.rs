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

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigBuilder, File, FileFormat};

use crate::AgentRelayerConfig;

/// Prefix of the environment variables read into the config,
/// `RELAYER_TX__GAS_LIMIT` sets `tx.gas_limit`.
pub const ENV_PREFIX: &str = "RELAYER";

/// Plain environment variable names accepted for the most common keys, so a
/// bare `.env` file is enough to run the relayer.
pub const ENV_ALIASES: [(&str, &str); 7] = [
    ("SOMNIA_RPC", "rpc_url"),
    ("CHAIN_ID", "chain_id"),
    ("ROUTER_PRIVATE_KEY", "private_key"),
    ("CALL_MANAGER_ADDRESS", "call_manager_address"),
    ("REGISTRY_ADDRESS", "registry_address"),
    ("MOCK_MODE", "mock_mode"),
    ("OPENAI_API_KEY", "openai_api_key"),
];

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> agent_relayer_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(agent_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`AgentRelayerConfig`] from the given config file(s) and the
/// process environment.
pub fn parse_from_files(
    files: &[PathBuf],
) -> agent_relayer_utils::Result<AgentRelayerConfig> {
    parse_with_env(files, None)
}

/// Same as [`parse_from_files`], but reads the environment from `env` when given
/// instead of the process environment.
pub fn parse_with_env(
    files: &[PathBuf],
    env: Option<HashMap<String, String>>,
) -> agent_relayer_utils::Result<AgentRelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let format = match ext {
            "toml" => FileFormat::Toml,
            "json" => FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }
    build(builder, env)
}

/// Parses a TOML document, ignoring the process environment.
pub fn parse_from_str(
    toml: &str,
) -> agent_relayer_utils::Result<AgentRelayerConfig> {
    let builder =
        Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
    build(builder, Some(HashMap::new()))
}

fn build(
    builder: ConfigBuilder<config::builder::DefaultState>,
    env: Option<HashMap<String, String>>,
) -> agent_relayer_utils::Result<AgentRelayerConfig> {
    let env = env.unwrap_or_else(|| std::env::vars().collect());
    let aliases = ENV_ALIASES
        .iter()
        .filter_map(|(var, key)| {
            env.get(*var)
                .filter(|value| !value.trim().is_empty())
                .map(|value| (key.to_string(), value.clone()))
        })
        .collect::<HashMap<_, _>>();
    // aliases first, so the prefixed variables win.
    let builder = builder
        .add_source(config::Environment::default().source(Some(aliases)))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(Some(env)),
        );
    let cfg = builder.build()?;
    let config: Result<
        AgentRelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files and
///
/// Returns `Ok(AgentRelayerConfig)` on success, or `Err(Error)` on failure.
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> agent_relayer_utils::Result<AgentRelayerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: AgentRelayerConfig,
) -> agent_relayer_utils::Result<AgentRelayerConfig> {
    tracing::trace!("Checking configration sanity ...");

    if let Some(key) = config.openai_api_key.take() {
        let key = key.trim().to_owned();
        config.openai_api_key = (!key.is_empty()).then_some(key);
    }

    if !config.mock_mode && config.openai_api_key.is_none() {
        tracing::warn!(
            "!!WARNING!!: mock_mode is disabled but no openai_api_key is configured,
            falling back to mock results"
        );
    }

    if config.max_error_backoff < config.error_backoff {
        tracing::warn!(
            "max_error_backoff ({}s) is lower than error_backoff ({}s), using {}s",
            config.max_error_backoff,
            config.error_backoff,
            config.error_backoff
        );
        config.max_error_backoff = config.error_backoff;
    }

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY: &str =
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_are_applied() {
        let config = parse_from_str(&format!(
            r#"
            rpc_url = "http://localhost:8545"
            chain_id = 50312
            private_key = "{KEY}"
            call_manager_address = "0x00000000000000000000000000000000000000aa"
            "#
        ))
        .unwrap();
        assert!(config.mock_mode);
        assert_eq!(config.poll_interval, 3);
        assert_eq!(config.max_blocks_per_step, 500);
        assert_eq!(config.tx.gas_limit, 600_000);
        assert_eq!(config.dispatch.max_concurrent, 1);
        assert_eq!(
            config.contract_abi,
            PathBuf::from("abis/AgentCallManagerWithVerify.json")
        );
        assert!(config.port.is_none());
    }

    #[test]
    fn env_overrides_files_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        write(
            dir.path(),
            "main.toml",
            r#"
            rpc_url = "http://localhost:8545"
            chain_id = 1
            call_manager_address = "0x00000000000000000000000000000000000000aa"

            [tx]
            gas_limit = 100000
            "#,
        );
        write(&nested, "extra.json", r#"{ "poll_interval": 9 }"#);

        let files = search_config_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let env = HashMap::from([
            ("CHAIN_ID".to_string(), "50312".to_string()),
            ("ROUTER_PRIVATE_KEY".to_string(), KEY.to_string()),
            ("MOCK_MODE".to_string(), "false".to_string()),
            ("RELAYER_TX__GAS_LIMIT".to_string(), "700000".to_string()),
            ("RELAYER_MOCK_MODE".to_string(), "true".to_string()),
            ("OPENAI_API_KEY".to_string(), "".to_string()),
        ]);
        let config = parse_with_env(&files, Some(env)).unwrap();
        assert_eq!(config.chain_id, 50312);
        assert!(config.private_key.is_some());
        assert!(config.mock_mode);
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.poll_interval, 9);
        assert_eq!(config.tx.gas_limit, 700_000);
        config.verify().unwrap();
    }

    #[test]
    fn reports_the_failing_path() {
        let err = parse_from_str(
            r#"
            rpc_url = "http://localhost:8545"
            chain_id = 1
            call_manager_address = "not an address"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("call_manager_address"));
    }

    #[test]
    fn backoff_cap_is_raised_to_the_initial_backoff() {
        let config = parse_from_str(
            r#"
            rpc_url = "http://localhost:8545"
            chain_id = 1
            call_manager_address = "0x00000000000000000000000000000000000000aa"
            error_backoff = 30
            max_error_backoff = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.max_error_backoff, 30);
    }
}

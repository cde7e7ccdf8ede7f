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

use crate::AgentRelayerConfig;
use anyhow::Context;
use directories_next::ProjectDirs;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

/// Package identifier, where the default configuration is defined.
/// If the user does not start the relayer with the `--config-dir`
/// it will default to read from the default location depending on the OS.
pub const PACKAGE_ID: [&str; 3] = ["tools", "webb", "agent-relayer"];

/// Network used to pick the `.env.<network>` file when none is given.
pub const DEFAULT_NETWORK: &str = "sepolia";

/// The Agent Relayer Command-line tool
///
/// Start the relayer from a config directory:
///
/// $ agent-relayer -vvv -c <CONFIG_DIR_PATH>
///
/// or only from the environment (`.env.<network>` or `.env`):
///
/// $ agent-relayer -vv --network sepolia
#[derive(StructOpt)]
#[structopt(name = "Agent Relayer")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Directory that contains configration files.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// Network name, selects the `.env.<network>` file.
    /// Falls back to the `NETWORK` env var, then to `sepolia`.
    #[structopt(long, value_name = "NAME")]
    pub network: Option<String>,
}

impl Opts {
    /// The network name to use.
    pub fn network(&self) -> String {
        self.network
            .clone()
            .or_else(|| std::env::var("NETWORK").ok())
            .unwrap_or_else(|| DEFAULT_NETWORK.to_string())
    }
}

/// Loads `.env.<network>` from the working directory, or `.env` when it does not exist.
///
/// Returns the loaded file, if any. Variables already set in the
/// environment are never overridden.
pub fn load_dotenv(network: &str) -> Option<PathBuf> {
    let network_file = PathBuf::from(format!(".env.{network}"));
    if network_file.exists() {
        match dotenv::from_path(&network_file) {
            Ok(()) => return Some(network_file),
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", network_file.display(), e)
            }
        }
    }
    dotenv::dotenv().ok()
}

/// Loads the configuration from the given directory.
///
/// Returns `Ok(Config)` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `config_dir` - An optional `PathBuf` representing the directory that contains the configuration.
///
/// When no directory is given, the OS specific config directory is used if it
/// exists, otherwise the configuration comes from the environment only.
pub fn load_config<P>(
    config_dir: Option<P>,
) -> Result<AgentRelayerConfig, anyhow::Error>
where
    P: AsRef<Path>,
{
    let path = match config_dir {
        Some(p) => {
            let p = p.as_ref().to_path_buf();
            // return an error if the path is not a directory.
            if !p.is_dir() {
                return Err(anyhow::anyhow!("{} is not a directory", p.display()));
            }
            Some(p)
        }
        None => {
            tracing::debug!("Getting default dirs for agent relayer");
            let dirs =
                ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
                    .context("failed to get config")?;
            let p = dirs.config_dir().to_path_buf();
            p.is_dir().then_some(p)
        }
    };
    let config = match path {
        Some(path) => {
            tracing::trace!("Loading Config from {} ..", path.display());
            crate::utils::load(path)?
        }
        None => {
            tracing::trace!("Loading Config from the environment ..");
            crate::utils::parse_from_files(&[])?
        }
    };
    tracing::trace!("Config loaded..");
    Ok(config)
}

/// Sets up the logger for the relayer, based on the verbosity level passed in.
///
/// Returns `Ok(())` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `verbosity` - An i32 integer representing the verbosity level.
/// * `filter` -  An filter for the target crates.
///
/// # Examples
///
/// ```no_run
/// agent_relayer_config::cli::setup_logger(3, "agent_relayer")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn setup_logger(verbosity: i32, filter: &str) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for target in filter.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        env_filter =
            env_filter.add_directive(format!("{target}={log_level}").parse()?);
    }
    let probe_directive =
        format!("{}={}", agent_relayer_utils::probe::TARGET, log_level);
    let env_filter = env_filter.add_directive(probe_directive.parse()?);
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter);
    // if we are not compiling for integration tests, we should use pretty logs
    #[cfg(not(feature = "integration-tests"))]
    let logger = logger.pretty();
    // otherwise, we should use json, which is easy to parse.
    #[cfg(feature = "integration-tests")]
    let logger = logger.json().flatten_event(true).with_current_span(false);

    logger
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set up the logger: {e}"))?;
    Ok(())
}

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

use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ethers::types::H256;

pub mod clickable_link;

/// Metrics functionality
pub mod metric;
/// A module used for debugging relayer lifecycle, sync state, or other relayer state.
pub mod probe;
/// Retry functionality
pub mod retry;

/// An enum of all possible errors that could be encountered during the execution of the Agent
/// Relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// HTTP Error
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    /// Elliptic Curve error.
    #[error(transparent)]
    EllipticCurve(#[from] ethers::core::k256::elliptic_curve::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// ABI encoding/decoding error.
    #[error(transparent)]
    Abi(#[from] ethers::abi::Error),
    /// Error while encoding a call with the contract ABI.
    #[error(transparent)]
    ContractAbi(#[from] ethers::contract::AbiError),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWalletError(#[from] ethers::signers::WalletError),
    /// Reqwest error
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// Missing Secrets in the config, i.e. the relayer private key.
    #[error("Missing required private-key in the config")]
    MissingSecrets,
    /// A configuration value is present but unusable.
    #[error("Invalid config: {}", _0)]
    InvalidConfig(String),
    /// The contract interface artifact could not be found.
    #[error("Contract ABI not found at {}", path.display())]
    MissingContractAbi {
        /// Where we looked for the artifact.
        path: PathBuf,
    },
    /// The contract ABI does not describe a function or event the relayer relies on.
    #[error("Contract ABI has no entry named `{}`", name)]
    MissingAbiEntry {
        /// The missing function or event name.
        name: &'static str,
    },
    /// A log returned by the chain could not be decoded as an invocation.
    #[error("Invalid invocation event: {}", reason)]
    InvalidEvent {
        /// What was wrong with the log.
        reason: String,
    },
    /// The result generation backend failed.
    #[error("Result generation failed: {}", reason)]
    GenerationFailed {
        /// Backend provided reason.
        reason: String,
    },
    /// The confirmation transaction was mined but reverted.
    #[error("Confirmation for invocation {:#x} reverted in tx {:#x}", invocation_id, tx_hash)]
    TransactionReverted {
        /// The invocation this confirmation was for.
        invocation_id: H256,
        /// The hash of the reverted transaction.
        tx_hash: H256,
    },
    /// The transaction was broadcast but disappeared from the mempool.
    #[error("Tx {:#x} dropped from mempool", tx_hash)]
    TransactionDropped {
        /// The hash of the dropped transaction.
        tx_hash: H256,
    },
    /// The transaction was broadcast but no receipt arrived in time.
    #[error("Timed out after {:?} waiting for the receipt of tx {:#x}", timeout, tx_hash)]
    ReceiptTimeout {
        /// The hash of the pending transaction.
        tx_hash: H256,
        /// How long we waited.
        timeout: Duration,
    },
    /// The transaction was broadcast but polling for its receipt failed.
    #[error("Failed to fetch the receipt of tx {:#x}: {}", tx_hash, reason)]
    ReceiptUnavailable {
        /// The hash of the pending transaction.
        tx_hash: H256,
        /// The underlying provider error.
        reason: String,
    },
    /// Someone tried to move the checkpoint backwards.
    #[error("Checkpoint cannot move from block {} back to block {}", current, attempted)]
    CheckpointRegression {
        /// The current checkpoint.
        current: u64,
        /// The rejected block number.
        attempted: u64,
    },
    /// A chain call did not complete in time.
    #[error("{} timed out after {:?}", operation, timeout)]
    RequestTimeout {
        /// The call that timed out.
        operation: &'static str,
        /// The configured bound.
        timeout: Duration,
    },
    /// The generation backend refused the request itself, e.g. a bad API key.
    #[error("Result generation rejected: {}", reason)]
    GenerationRejected {
        /// Backend provided reason.
        reason: String,
    },
}

impl Error {
    /// Whether retrying the failed operation could succeed.
    ///
    /// Configuration problems, malformed data and anything that happens after a
    /// transaction has been broadcast are permanent: retrying them would either
    /// fail the same way or risk a second confirmation for the same invocation.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::Config(_)
                | Self::ParseConfig(_)
                | Self::GlobPattern(_)
                | Self::Url(_)
                | Self::EllipticCurve(_)
                | Self::Abi(_)
                | Self::ContractAbi(_)
                | Self::EtherWalletError(_)
                | Self::MissingSecrets
                | Self::InvalidConfig(_)
                | Self::MissingContractAbi { .. }
                | Self::MissingAbiEntry { .. }
                | Self::GenerationRejected { .. }
                | Self::TransactionReverted { .. }
                | Self::TransactionDropped { .. }
                | Self::ReceiptTimeout { .. }
                | Self::ReceiptUnavailable { .. }
                | Self::CheckpointRegression { .. }
        )
    }
}

/// A type alias for the result for agent relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for HandlerError {
    fn from(value: Error) -> Self {
        HandlerError(StatusCode::INTERNAL_SERVER_ERROR, value.to_string())
    }
}

/// Error type for HTTP handlers
pub struct HandlerError(
    /// HTTP status code for response
    pub StatusCode,
    /// Response message
    pub String,
);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

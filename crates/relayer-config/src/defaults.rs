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

/// Where the call manager ABI artifact is looked up by default.
pub fn contract_abi() -> PathBuf {
    PathBuf::from("abis/AgentCallManagerWithVerify.json")
}
/// Mock generation is enabled by default.
pub const fn mock_mode() -> bool {
    true
}
pub fn generation_model() -> String {
    String::from("gpt-4o-mini")
}
pub fn generation_endpoint() -> String {
    String::from("https://api.openai.com/v1/chat/completions")
}
/// Seconds between two polls of the chain head.
pub const fn poll_interval() -> u64 {
    3
}
/// Seconds to wait after the first failed chain read.
pub const fn error_backoff() -> u64 {
    5
}
pub const fn max_error_backoff() -> u64 {
    60
}
/// The maximum blocks per step is set to `500` by default.
pub const fn max_blocks_per_step() -> u64 {
    500
}
pub const fn rpc_timeout() -> u64 {
    30
}
/// The print progress interval is set to `7_000` by default.
pub const fn print_progress_interval() -> u64 {
    7_000
}
pub const fn gas_limit() -> u64 {
    600_000
}
pub const fn block_confirmations() -> usize {
    1
}
/// Milliseconds between two receipt polls.
pub const fn receipt_poll_interval() -> u64 {
    1_000
}
/// Seconds to wait for a receipt before giving up.
pub const fn receipt_timeout() -> u64 {
    120
}
/// Invocations are dispatched one at a time by default.
pub const fn max_concurrent() -> usize {
    1
}
pub const fn max_retries() -> usize {
    3
}
/// Milliseconds between two attempts of the same dispatch.
pub const fn retry_interval() -> u64 {
    1_000
}

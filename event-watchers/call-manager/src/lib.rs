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

//! # Call Manager Event Watcher 🕸️
//!
//! Watches the `AgentInvoked` event of the call manager contract and answers
//! every invocation with a signed `confirmResult` transaction.
//!
//! ## Overview
//!
//! The [`InvocationPipeline`] polls the chain in block ranges starting right
//! after its checkpoint. For every invocation found it runs
//! Produce → Upload → Sign → Submit, then moves the checkpoint to the end of
//! the range. An invocation that fails is recorded and skipped, it never holds
//! back the ones after it.

/// Pipeline settings.
mod config;
/// The poll loop and the per invocation dispatch.
mod pipeline;
/// What a poll did.
mod report;

pub use config::PipelineConfig;
pub use pipeline::InvocationPipeline;
pub use report::{ConfirmedInvocation, DispatchFailure, RangeReport};

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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Agent Relayer Crate 🕸️
//!
//! Relays the results of off-chain agent runs back to the
//! `AgentCallManagerWithVerify` contract.
//!
//! ## Overview
//!
//! Callers invoke an agent on chain and pay for the run; the contract emits
//! an `AgentInvoked` event. The relayer watches those events, produces the
//! result of every invocation, uploads it, signs a confirmation over the
//! result hash and submits it with `confirmResult`. The contract recovers
//! the relayer address from the signature before accepting the result.
//!
//! Results come either from a chat completion endpoint or, in mock mode,
//! from a deterministic local producer. Uploads are `data:` URIs holding the
//! payload itself.

/// A module for starting the long-running relayer tasks.
pub mod service;

pub use agent_relayer_utils::{Error, Result};

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

//! # Result Backends 🕸️
//!
//! A result backend turns an invocation into something the contract can be
//! told about. It happens in two steps:
//!
//! 1. A [`ResultProducer`] runs the requested computation and returns a
//!    [`ResultPayload`].
//! 2. An [`Uploader`] stores the payload somewhere and returns its locator,
//!    together with the `keccak256` digest that gets signed and confirmed.
//!
//! As of now, the following backends are supported:
//! - [`MockResultProducer`], deterministic output for local and test networks.
//! - [`OpenAiResultProducer`], chat completions against an OpenAI compatible API.
//! - [`DataUriUploader`], inlines the payload as a `data:` URI.
//!
//! ## Usage
//! ```rust,ignore
//! use agent_relayer_result_backends::{MockResultProducer, DataUriUploader, ResultProducer, Uploader};
//! let payload = MockResultProducer.produce(&descriptor).await?;
//! let record = DataUriUploader.upload(&payload).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use agent_relayer_types::invocation::{
    RequestDescriptor, ResultPayload, UploadRecord,
};
use agent_relayer_utils::Result;

/// Inline `data:` URI uploads.
mod data_uri;
/// A deterministic producer.
mod mock;
/// OpenAI chat completions.
mod openai;

pub use data_uri::DataUriUploader;
pub use mock::MockResultProducer;
pub use openai::OpenAiResultProducer;

/// Produces the result of an invocation.
#[async_trait::async_trait]
pub trait ResultProducer: std::fmt::Debug + Send + Sync {
    /// Runs the computation described by `descriptor`.
    ///
    /// Errors are returned as is; whether they are worth retrying is decided
    /// by the caller through [`agent_relayer_utils::Error::is_transient`].
    async fn produce(&self, descriptor: &RequestDescriptor)
        -> Result<ResultPayload>;
}

/// Stores a produced result.
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    /// Stores `payload` and returns where it went and its content hash.
    ///
    /// Uploading the same payload twice must return the same content hash.
    async fn upload(&self, payload: &ResultPayload) -> Result<UploadRecord>;
}

#[async_trait::async_trait]
impl<T: ResultProducer + ?Sized> ResultProducer for Box<T> {
    async fn produce(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResultPayload> {
        (**self).produce(descriptor).await
    }
}

#[async_trait::async_trait]
impl<T: Uploader + ?Sized> Uploader for Box<T> {
    async fn upload(&self, payload: &ResultPayload) -> Result<UploadRecord> {
        (**self).upload(payload).await
    }
}

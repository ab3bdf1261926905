// Copyright 2025 LinkRPC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde_json::Value;
use thiserror::Error;

/// Failure reported by a method handler.
///
/// The message becomes the `error` field of the response as-is, so it
/// should be written for the remote caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MethodError {
    /// The caller sent parameters the method cannot use
    #[error("{0}")]
    InvalidParams(String),

    /// The method ran and failed
    #[error("{0}")]
    Failed(String),
}

impl MethodError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        MethodError::InvalidParams(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        MethodError::Failed(message.into())
    }
}

pub type MethodResult = std::result::Result<Value, MethodError>;

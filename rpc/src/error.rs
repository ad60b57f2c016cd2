/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::fmt::{self, Display, Formatter};

use dubbo_base::{ExtensionError, UrlError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Timeout,
    Network,
    /// The callee ran and failed.
    Business,
    /// The callee could not be invoked at all, e.g. unknown method or undecodable arguments.
    Dispatch,
    Destroyed,
    NoProvider,
    /// The provider's thread pool refused the call.
    Overloaded,
    Serialization,
}

impl FailureKind {
    /// Whether another invoker may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::Business | FailureKind::Dispatch)
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Business => "business",
            FailureKind::Dispatch => "dispatch",
            FailureKind::Destroyed => "destroyed",
            FailureKind::NoProvider => "no provider",
            FailureKind::Overloaded => "overloaded",
            FailureKind::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

/// A failure raised while invoking, carried in [`crate::RpcResult`] and across the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Type of the business error the callee returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// The business error itself, so the caller can rebuild it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Endpoints tried before giving up, in attempt order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
}

impl InvocationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        InvocationFailure {
            kind,
            message: message.into(),
            type_name: None,
            payload: None,
            endpoints: Vec::new(),
        }
    }

    pub fn business(type_name: &str, payload: Option<Value>, message: impl Into<String>) -> Self {
        InvocationFailure {
            type_name: Some(type_name.to_string()),
            payload,
            ..Self::new(FailureKind::Business, message)
        }
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Dispatch, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Serialization, message)
    }

    pub fn with_endpoints(self, endpoints: Vec<String>) -> Self {
        Self { endpoints, ..self }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Rebuilds the business error when it was raised as an `E`.
    pub fn downcast_business<E: DeserializeOwned>(&self) -> Option<E> {
        if self.kind != FailureKind::Business || self.type_name.as_deref() != Some(std::any::type_name::<E>()) {
            return None;
        }
        self.payload
            .clone()
            .and_then(|payload| serde_json::from_value(payload).ok())
    }
}

impl Display for InvocationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.kind, self.message)?;
        if !self.endpoints.is_empty() {
            write!(f, " (tried {})", self.endpoints.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for InvocationFailure {}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error(transparent)]
    MalformedAddress(#[from] UrlError),
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("unsupported {kind} extension: {name}")]
    UnsupportedExtension { kind: String, name: String },
    #[error("failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },
    #[error("failed to refer {url}: {reason}")]
    Refer { url: String, reason: String },
    #[error(transparent)]
    Invocation(#[from] InvocationFailure),
}

impl RpcError {
    pub fn failure(&self) -> Option<&InvocationFailure> {
        match self {
            RpcError::Invocation(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        self.failure().map(|failure| failure.kind)
    }

    /// Only invocation failures of a retryable kind may be retried on another invoker.
    pub fn is_retryable(&self) -> bool {
        self.failure()
            .map(InvocationFailure::is_retryable)
            .unwrap_or(false)
    }

    /// The failure to report to a remote caller.
    pub fn into_failure(self) -> InvocationFailure {
        match self {
            RpcError::Invocation(failure) => failure,
            other => InvocationFailure::dispatch(other.to_string()),
        }
    }
}

impl From<ExtensionError> for RpcError {
    fn from(err: ExtensionError) -> Self {
        match err {
            ExtensionError::NotFound { kind, name } => RpcError::UnsupportedExtension {
                kind: kind.to_string(),
                name,
            },
        }
    }
}

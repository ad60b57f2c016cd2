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

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{InvocationFailure, RpcError};

/// Outcome of an invocation: a value or a failure, plus attachments echoed by the callee.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResult {
    outcome: Result<Value, RpcError>,
    attachments: HashMap<String, String>,
}

impl RpcResult {
    pub fn ok(value: Value) -> Self {
        RpcResult {
            outcome: Ok(value),
            attachments: HashMap::new(),
        }
    }

    pub fn err(error: impl Into<RpcError>) -> Self {
        RpcResult {
            outcome: Err(error.into()),
            attachments: HashMap::new(),
        }
    }

    pub fn from_outcome(outcome: Result<Value, RpcError>) -> Self {
        RpcResult {
            outcome,
            attachments: HashMap::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn is_err(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn value(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&RpcError> {
        self.outcome.as_ref().err()
    }

    pub fn failure(&self) -> Option<&InvocationFailure> {
        self.error().and_then(RpcError::failure)
    }

    pub fn outcome(&self) -> &Result<Value, RpcError> {
        &self.outcome
    }

    pub fn into_outcome(self) -> Result<Value, RpcError> {
        self.outcome
    }

    pub fn attachments(&self) -> &HashMap<String, String> {
        &self.attachments
    }

    pub fn with_attachments(mut self, attachments: HashMap<String, String>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    pub fn add_attachment(&mut self, key: &str, value: &str) {
        self.attachments.insert(key.to_string(), value.to_string());
    }

    pub fn get_attachment_or_default(&self, key: &str, default_value: &str) -> String {
        self.attachments
            .get(key)
            .cloned()
            .unwrap_or_else(|| default_value.to_string())
    }
}

impl From<Result<Value, RpcError>> for RpcResult {
    fn from(outcome: Result<Value, RpcError>) -> Self {
        RpcResult::from_outcome(outcome)
    }
}

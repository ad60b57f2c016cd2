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

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One method call: what to call, with which arguments, plus out-of-band attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcInvocation {
    service_name: String,
    method_name: String,
    #[serde(default)]
    parameter_types: Vec<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    attachments: HashMap<String, String>,
}

impl RpcInvocation {
    pub fn new(service_name: &str, method_name: &str) -> Self {
        RpcInvocation {
            service_name: service_name.to_string(),
            method_name: method_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_parameter_types(self, parameter_types: Vec<String>) -> Self {
        Self {
            parameter_types,
            ..self
        }
    }

    pub fn with_arguments(self, arguments: Vec<Value>) -> Self {
        Self { arguments, ..self }
    }

    pub fn with_attachment(mut self, key: &str, value: &str) -> Self {
        self.attachments.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_attachments(mut self, attachments: HashMap<String, String>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn attachments(&self) -> &HashMap<String, String> {
        &self.attachments
    }

    pub fn get_attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::RpcInvocation;

    #[test]
    fn test_builder() {
        let invocation = RpcInvocation::new("demo.Greeter", "sayHello")
            .with_parameter_types(vec!["string".to_string()])
            .with_arguments(vec![json!("world")])
            .with_attachment("traceId", "abc");
        assert_eq!(invocation.method_name(), "sayHello");
        assert_eq!(invocation.arguments(), &[json!("world")]);
        assert_eq!(invocation.get_attachment("traceId"), Some("abc"));
        assert_eq!(invocation.get_attachment("timeout"), None);
    }
}

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

use serde::{Deserialize, Serialize};

use crate::{
    merge::{AppendParameters, Parameters},
    types::{interface::InterfaceConfig, method::MethodConfig, ConfigValidator},
    ConfigError,
};

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub interface: String,
    /// Id of the protocol config to export on; the only configured one when absent.
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
    #[serde(flatten)]
    pub base: InterfaceConfig,
}

impl ServiceConfig {
    pub fn new(interface: &str) -> Self {
        ServiceConfig {
            interface: interface.to_string(),
            ..Default::default()
        }
    }

    pub fn with_protocol(self, protocol: &str) -> Self {
        Self {
            protocol: Some(protocol.to_string()),
            ..self
        }
    }
}

impl AppendParameters for ServiceConfig {
    fn append_parameters(&self, params: &mut Parameters) {
        self.base.append_parameters(params);
        self.methods.append_parameters(params);
    }
}

impl ConfigValidator for ServiceConfig {
    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        if self.interface.trim().is_empty() {
            return Err(ConfigError::Invalid {
                kind: "service",
                id: id.to_string(),
                reason: "interface is required".to_string(),
            });
        }
        Ok(())
    }
}

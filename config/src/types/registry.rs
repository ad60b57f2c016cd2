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

use dubbo_base::constants::{
    CHECK_KEY, PASSWORD_KEY, PORT_KEY, PROTOCOL_KEY, REGISTER_KEY, SUBSCRIBE_KEY, TIMEOUT_KEY,
    USERNAME_KEY,
};

use crate::{
    merge::{append, AppendParameters, Parameters},
    types::ConfigValidator,
    ConfigError,
};

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct RegistryConfig {
    /// `host:port`, several separated by `|` or `;`, backups by `,`. `N/A` disables it.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub check: Option<bool>,
    #[serde(default)]
    pub register: Option<bool>,
    #[serde(default)]
    pub subscribe: Option<bool>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl RegistryConfig {
    pub fn new(address: &str) -> Self {
        RegistryConfig {
            address: address.to_string(),
            ..Default::default()
        }
    }
}

impl AppendParameters for RegistryConfig {
    fn append_parameters(&self, params: &mut Parameters) {
        append(params, PROTOCOL_KEY, &self.protocol);
        append(params, PORT_KEY, &self.port);
        append(params, USERNAME_KEY, &self.username);
        append(params, PASSWORD_KEY, &self.password);
        append(params, TIMEOUT_KEY, &self.timeout);
        append(params, CHECK_KEY, &self.check);
        append(params, REGISTER_KEY, &self.register);
        append(params, SUBSCRIBE_KEY, &self.subscribe);
        params.extend(self.parameters.clone());
    }
}

impl ConfigValidator for RegistryConfig {
    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        if let (Some((scheme, _)), Some(protocol)) = (self.address.split_once("://"), &self.protocol) {
            if scheme != protocol {
                return Err(ConfigError::Invalid {
                    kind: "registry",
                    id: id.to_string(),
                    reason: format!("address scheme '{}' contradicts protocol '{}'", scheme, protocol),
                });
            }
        }
        Ok(())
    }
}

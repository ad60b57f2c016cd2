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

use dubbo_base::constants::APPLICATION_KEY;

use crate::merge::{append, append_str, AppendParameters, Parameters};

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ApplicationConfig {
    pub fn new(name: &str) -> Self {
        ApplicationConfig {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl AppendParameters for ApplicationConfig {
    fn append_parameters(&self, params: &mut Parameters) {
        append_str(params, APPLICATION_KEY, &self.name);
        append(params, "application.version", &self.version);
        append(params, "owner", &self.owner);
        append(params, "organization", &self.organization);
        append(params, "environment", &self.environment);
        params.extend(self.parameters.clone());
    }
}

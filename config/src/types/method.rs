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
    CLUSTER_KEY, FORKS_KEY, LOADBALANCE_KEY, RETRIES_KEY, TIMEOUT_KEY,
};

use crate::merge::{append, AppendParameters, Parameters};

/// Per-method overrides, contributed as `<name>.<key>` parameters.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct MethodConfig {
    pub name: String,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub retries: Option<usize>,
    #[serde(default)]
    pub forks: Option<usize>,
    #[serde(default)]
    pub loadbalance: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl MethodConfig {
    pub fn new(name: &str) -> Self {
        MethodConfig {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl AppendParameters for MethodConfig {
    fn append_parameters(&self, params: &mut Parameters) {
        if self.name.is_empty() {
            return;
        }
        let mut own = Parameters::new();
        append(&mut own, TIMEOUT_KEY, &self.timeout);
        append(&mut own, RETRIES_KEY, &self.retries);
        append(&mut own, FORKS_KEY, &self.forks);
        append(&mut own, LOADBALANCE_KEY, &self.loadbalance);
        append(&mut own, CLUSTER_KEY, &self.cluster);
        own.extend(self.parameters.clone());
        for (key, value) in own {
            params.insert(format!("{}.{}", self.name, key), value);
        }
    }
}

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
    CHECK_KEY, CLUSTER_AVAILABLE_CHECK_KEY, CLUSTER_KEY, CLUSTER_STICKY_KEY, FORKS_KEY,
    GENERIC_KEY, GROUP_KEY, LOADBALANCE_KEY, REGISTER_KEY, RETRIES_KEY, TIMEOUT_KEY,
    VERSION_KEY,
};

use crate::merge::{append, AppendParameters, Parameters};

/// Interface level defaults shared by consumer, provider, reference and service configs.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub loadbalance: Option<String>,
    #[serde(default)]
    pub retries: Option<usize>,
    #[serde(default)]
    pub forks: Option<usize>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub check: Option<bool>,
    #[serde(default)]
    pub generic: Option<bool>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub lazy: Option<bool>,
    #[serde(default)]
    pub sticky: Option<bool>,
    #[serde(default)]
    pub availablecheck: Option<bool>,
    #[serde(default)]
    pub register: Option<bool>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl AppendParameters for InterfaceConfig {
    fn append_parameters(&self, params: &mut Parameters) {
        append(params, CLUSTER_KEY, &self.cluster);
        append(params, LOADBALANCE_KEY, &self.loadbalance);
        append(params, RETRIES_KEY, &self.retries);
        append(params, FORKS_KEY, &self.forks);
        append(params, TIMEOUT_KEY, &self.timeout);
        append(params, CHECK_KEY, &self.check);
        append(params, GENERIC_KEY, &self.generic);
        append(params, GROUP_KEY, &self.group);
        append(params, VERSION_KEY, &self.version);
        append(params, "lazy", &self.lazy);
        append(params, CLUSTER_STICKY_KEY, &self.sticky);
        append(params, CLUSTER_AVAILABLE_CHECK_KEY, &self.availablecheck);
        append(params, REGISTER_KEY, &self.register);
        params.extend(self.parameters.clone());
    }
}

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
    ALIVE_KEY, CORE_THREADS_KEY, DUMP_DIRECTORY, QUEUES_KEY, REGISTER_KEY, THREADPOOL_KEY,
    THREADS_KEY, THREAD_NAME_KEY,
};

use crate::{
    merge::{append, AppendParameters, Parameters},
    types::ConfigValidator,
    ConfigError,
};

/// Where and how a provider listens: the protocol scheme plus its server thread pool.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub threadpool: Option<String>,
    #[serde(default)]
    pub threadname: Option<String>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub corethreads: Option<usize>,
    #[serde(default)]
    pub queues: Option<usize>,
    #[serde(default)]
    pub alive: Option<u64>,
    #[serde(default)]
    pub dump_directory: Option<String>,
    #[serde(default)]
    pub register: Option<bool>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ProtocolConfig {
    pub fn new(name: &str) -> Self {
        ProtocolConfig {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_host(self, host: &str) -> Self {
        Self {
            host: Some(host.to_string()),
            ..self
        }
    }

    pub fn with_port(self, port: u16) -> Self {
        Self {
            port: Some(port),
            ..self
        }
    }
}

impl AppendParameters for ProtocolConfig {
    fn append_parameters(&self, params: &mut Parameters) {
        append(params, THREADPOOL_KEY, &self.threadpool);
        append(params, THREAD_NAME_KEY, &self.threadname);
        append(params, THREADS_KEY, &self.threads);
        append(params, CORE_THREADS_KEY, &self.corethreads);
        append(params, QUEUES_KEY, &self.queues);
        append(params, ALIVE_KEY, &self.alive);
        append(params, DUMP_DIRECTORY, &self.dump_directory);
        append(params, REGISTER_KEY, &self.register);
        params.extend(self.parameters.clone());
    }
}

impl ConfigValidator for ProtocolConfig {
    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                kind: "protocol",
                id: id.to_string(),
                reason: "name is required".to_string(),
            });
        }
        if let (Some(core), Some(max)) = (self.corethreads, self.threads) {
            if core > max {
                return Err(ConfigError::Invalid {
                    kind: "protocol",
                    id: id.to_string(),
                    reason: format!("corethreads {} exceeds threads {}", core, max),
                });
            }
        }
        Ok(())
    }
}

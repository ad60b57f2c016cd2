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

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use dubbo_logger::tracing::{debug, info};
use dubbo_utils::yaml_util::yaml_file_parser;

use crate::{location::get_config_location, ConfigError};

pub mod application;
pub mod consumer;
pub mod interface;
pub mod method;
pub mod protocol;
pub mod provider;
pub mod reference;
pub mod registry;
pub mod service;

use self::{
    application::ApplicationConfig, consumer::ConsumerConfig, protocol::ProtocolConfig,
    provider::ProviderConfig, reference::ReferenceConfig, registry::RegistryConfig,
    service::ServiceConfig,
};

pub const DUBBO_KEY: &str = "dubbo";

/// All structured config of one application, read from the `dubbo:` section of a yaml file
/// or assembled in code.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct RootConfig {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub registries: HashMap<String, RegistryConfig>,

    #[serde(default)]
    pub protocols: HashMap<String, ProtocolConfig>,

    #[serde(default)]
    pub consumer: ConsumerConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub references: HashMap<String, ReferenceConfig>,

    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
}

impl RootConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the file `DUBBO_CONFIG_PATH` points at, or `dubbo.yaml` in the app root.
    pub fn load() -> Result<Self, ConfigError> {
        let path = get_config_location();
        info!("load config from {:?}", path);
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let document: Value = yaml_file_parser(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(document)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_yaml::from_str(yaml)?)
    }

    fn from_value(document: Value) -> Result<Self, ConfigError> {
        let section = document
            .get(DUBBO_KEY)
            .cloned()
            .ok_or(ConfigError::MissingRoot(DUBBO_KEY))?;
        let root: RootConfig = serde_yaml::from_value(section)?;
        root.validate()?;
        debug!("origin config: {:?}", root);
        Ok(root)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, registry) in &self.registries {
            registry.validate(id)?;
        }
        for (id, protocol) in &self.protocols {
            protocol.validate(id)?;
        }
        for (id, reference) in &self.references {
            reference.validate(id)?;
        }
        for (id, service) in &self.services {
            service.validate(id)?;
        }
        Ok(())
    }

    pub fn with_application(self, application: ApplicationConfig) -> Self {
        Self {
            application,
            ..self
        }
    }

    pub fn add_registry(mut self, id: &str, registry: RegistryConfig) -> Self {
        self.registries.insert(id.to_string(), registry);
        self
    }

    pub fn add_protocol(mut self, id: &str, protocol: ProtocolConfig) -> Self {
        self.protocols.insert(id.to_string(), protocol);
        self
    }

    pub fn add_reference(mut self, id: &str, reference: ReferenceConfig) -> Self {
        self.references.insert(id.to_string(), reference);
        self
    }

    pub fn add_service(mut self, id: &str, service: ServiceConfig) -> Self {
        self.services.insert(id.to_string(), service);
        self
    }
}

pub trait ConfigValidator {
    fn validate(&self, id: &str) -> Result<(), ConfigError>;
}

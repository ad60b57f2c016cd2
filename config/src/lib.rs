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

use once_cell::sync::OnceCell;

pub use crate::{
    error::ConfigError,
    merge::{apply_property_fallback, merge_layers, AppendParameters, Parameters},
    types::{
        application::ApplicationConfig, consumer::ConsumerConfig, interface::InterfaceConfig,
        method::MethodConfig, protocol::ProtocolConfig, provider::ProviderConfig,
        reference::ReferenceConfig, registry::RegistryConfig, service::ServiceConfig,
        ConfigValidator, RootConfig,
    },
    url_builder::{load_registries, reference_url, service_url},
};

pub mod error;
pub mod location;
pub mod merge;
pub mod types;
pub mod url_builder;

static GLOBAL_ROOT_CONFIG: OnceCell<RootConfig> = OnceCell::new();

/// The process configuration, loaded from the config file on first use.
pub fn get_global_config() -> Result<&'static RootConfig, ConfigError> {
    GLOBAL_ROOT_CONFIG.get_or_try_init(RootConfig::load)
}

/// Installs `config` as the process configuration unless one was loaded already.
pub fn set_global_config(config: RootConfig) -> Result<(), RootConfig> {
    GLOBAL_ROOT_CONFIG.set(config)
}

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

use std::{collections::HashMap, fmt::Display};

use dubbo_base::constants::{
    APPLICATION_KEY, CHECK_KEY, CLUSTER_KEY, FORKS_KEY, LOADBALANCE_KEY, REGISTER_KEY,
    RETRIES_KEY, TIMEOUT_KEY,
};
use dubbo_logger::tracing::debug;
use dubbo_utils::env_util::get_property;

pub type Parameters = HashMap<String, String>;

/// Keys that may be filled from `dubbo.<key>` process properties when no layer set them.
pub const PROPERTY_FALLBACK_KEYS: [&str; 8] = [
    CHECK_KEY,
    RETRIES_KEY,
    FORKS_KEY,
    CLUSTER_KEY,
    TIMEOUT_KEY,
    LOADBALANCE_KEY,
    REGISTER_KEY,
    APPLICATION_KEY,
];

/// A configuration value object that contributes url parameters.
pub trait AppendParameters {
    fn append_parameters(&self, params: &mut Parameters);
}

impl<T: AppendParameters> AppendParameters for Option<T> {
    fn append_parameters(&self, params: &mut Parameters) {
        if let Some(inner) = self {
            inner.append_parameters(params);
        }
    }
}

impl<T: AppendParameters> AppendParameters for Vec<T> {
    fn append_parameters(&self, params: &mut Parameters) {
        for item in self {
            item.append_parameters(params);
        }
    }
}

pub(crate) fn append<T: Display>(params: &mut Parameters, key: &str, value: &Option<T>) {
    if let Some(value) = value {
        let value = value.to_string();
        if !value.is_empty() {
            params.insert(key.to_string(), value);
        }
    }
}

pub(crate) fn append_str(params: &mut Parameters, key: &str, value: &str) {
    if !value.is_empty() {
        params.insert(key.to_string(), value.to_string());
    }
}

/// Merges `layers` in order, each later layer overriding the earlier ones.
///
/// A key in `protected` keeps the first value any layer gave it.
pub fn merge_layers(layers: &[&dyn AppendParameters], protected: &[&str]) -> Parameters {
    let mut merged = Parameters::new();
    for layer in layers {
        let mut contributed = Parameters::new();
        layer.append_parameters(&mut contributed);
        for (key, value) in contributed {
            if protected.contains(&key.as_str()) && merged.contains_key(&key) {
                continue;
            }
            merged.insert(key, value);
        }
    }
    merged
}

/// Fills each of `keys` still missing from `params` from the process properties.
///
/// Every missing key is looked up exactly once per call and nothing is cached, so a
/// property changed between two assemblies is picked up by the second one.
pub fn apply_property_fallback(params: &mut Parameters, keys: &[&str]) {
    for key in keys {
        if params.contains_key(*key) {
            continue;
        }
        if let Some(value) = get_property(&format!("dubbo.{}", key)) {
            debug!("use system property dubbo.{}={}", key, value);
            params.insert(key.to_string(), value);
        }
    }
}

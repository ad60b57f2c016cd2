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

use std::path::PathBuf;

use dubbo_utils::{env_util::get_env_value, path_util::app_root_dir};

pub const ENV_DUBBO_CONFIG_PATH: &str = "DUBBO_CONFIG_PATH";

pub const DEFAULT_CONFIG_FILE: &str = "dubbo.yaml";

// resolve yaml config file
pub fn get_config_location() -> PathBuf {
    match get_env_value(ENV_DUBBO_CONFIG_PATH) {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
        _ => app_root_dir().join(DEFAULT_CONFIG_FILE),
    }
}

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

use dubbo_utils::{env_util::get_env_value, path_util::app_root_dir, yaml_util::yaml_key_reader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{level::LevelWrapper, CONFIG_PATH_ENV, LOG_LEVEL_ENV, LOG_LEVEL_KEY};

pub(crate) fn default() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match get_env_value(EnvFilter::DEFAULT_ENV) {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::default().add_directive(LevelFilter::from_level(configured_level()).into()),
    };
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_line_number(true)
        // sets this to be the default, global collector for this application.
        .try_init()
}

pub(crate) fn configured_level() -> crate::Level {
    get_env_value(LOG_LEVEL_ENV)
        .or_else(|| parse_from_config(&config_file()))
        .map(|level| LevelWrapper::from(level).inner)
        .unwrap_or(crate::Level::INFO)
}

// same lookup as the config loader, which depends on this crate
fn config_file() -> PathBuf {
    match get_env_value(CONFIG_PATH_ENV) {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
        _ => app_root_dir().join("dubbo.yaml"),
    }
}

/// `dubbo.logger.level` of the config file, if the file exists and sets it.
pub(crate) fn parse_from_config(path: &std::path::Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    yaml_key_reader(path, LOG_LEVEL_KEY).ok().flatten()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::parse_from_config;

    #[test]
    fn test_level_from_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dubbo:\n  logger:\n    level: debug").unwrap();
        assert_eq!(parse_from_config(file.path()), Some("debug".to_string()));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dubbo:\n  application:\n    name: demo").unwrap();
        assert_eq!(parse_from_config(file.path()), None);
        assert_eq!(parse_from_config(&file.path().with_extension("missing")), None);
    }
}

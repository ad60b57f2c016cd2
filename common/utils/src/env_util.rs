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

use std::env;

pub fn get_env_value(env_key: &str) -> Option<String> {
    env::var(env_key).ok()
}

/// Looks a dotted key such as `dubbo.registry.address` up in the process environment.
///
/// The key is tried verbatim first, then in its shell form (`DUBBO_REGISTRY_ADDRESS`).
/// Blank values count as unset.
pub fn get_property(key: &str) -> Option<String> {
    let shell_key: String = key
        .chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    get_env_value(key)
        .or_else(|| get_env_value(&shell_key))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use crate::env_util::{get_env_value, get_property};
    use std::env;

    #[test]
    fn test_get_env_value() {
        env::set_var("TEST_ENV", "testxxx1");
        assert!(get_env_value("TEST_ENV").is_some());
        assert!(get_env_value("TEST_ENV2").is_none());
    }

    #[test]
    fn test_get_property() {
        env::set_var("UTILS_TEST_REGISTRY_ADDRESS", " 10.0.0.1:2181 ");
        env::set_var("UTILS_TEST_BLANK", "  ");
        assert_eq!(
            get_property("utils.test.registry.address"),
            Some("10.0.0.1:2181".to_string())
        );
        assert_eq!(get_property("utils.test.blank"), None);
        assert_eq!(get_property("utils.test.missing"), None);
    }
}

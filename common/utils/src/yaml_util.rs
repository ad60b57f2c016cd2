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

use std::{fs, path::Path};

use anyhow::Error;
use serde_yaml::{from_slice, Value};

// parse yaml file to structs
pub fn yaml_file_parser<T>(path: &Path) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned,
{
    if !path.is_file() {
        return Err(anyhow::anyhow!("path is not a file: {:?}", path));
    }
    let data = fs::read(path)?;
    Ok(from_slice(&data)?)
}

// read value by a key like: logging.level
pub fn yaml_key_reader(path: &Path, key: &str) -> Result<Option<String>, Error> {
    let mut value: Value = yaml_file_parser(path)?;
    for key in key.split('.') {
        value = match value.get(key) {
            Some(v) => v.clone(),
            None => return Ok(None),
        };
    }
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(serde_yaml::to_string(&other)?.trim_end().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use serde_yaml::Value;
    use std::{collections::HashMap, io::Write};

    use crate::yaml_util::{yaml_file_parser, yaml_key_reader};

    fn sample() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "logging:\n  level: INFO\n  file:\n    path: /tmp/test.log\ndubbo:\n  threads: 20"
        )
        .unwrap();
        file
    }

    #[test]
    fn test_yaml_file_parser() {
        let file = sample();
        let config = yaml_file_parser::<HashMap<String, Value>>(file.path()).unwrap();
        assert!(config.contains_key("logging"));
        assert!(yaml_file_parser::<Value>(std::path::Path::new("/no/such/file.yaml")).is_err());
    }

    #[test]
    fn test_yaml_key_reader() {
        let file = sample();
        assert_eq!(
            yaml_key_reader(file.path(), "logging.level").unwrap(),
            Some("INFO".to_string())
        );
        assert_eq!(
            yaml_key_reader(file.path(), "logging.file.path").unwrap(),
            Some("/tmp/test.log".to_string())
        );
        assert_eq!(
            yaml_key_reader(file.path(), "dubbo.threads").unwrap(),
            Some("20".to_string())
        );
        assert_eq!(yaml_key_reader(file.path(), "logging.missing").unwrap(), None);
    }
}

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

use std::io::Write;

use anyhow::Error;
use dubbo_config::{
    location::ENV_DUBBO_CONFIG_PATH, reference_url, service_url, ConfigError, RootConfig,
};

const CONFIG: &str = r#"
dubbo:
  application:
    name: greeter-app
    owner: team-a
  registries:
    demoZK:
      protocol: zookeeper
      address: 127.0.0.1:2181
      timeout: 3000
  protocols:
    json:
      name: jsonrpc
      host: 127.0.0.1
      port: 20991
      threadpool: cached
      threads: 50
      corethreads: 5
      dump_directory: /tmp/dumps
  consumer:
    timeout: 2000
    check: false
  references:
    greeter:
      interface: org.apache.dubbo.demo.Greeter
      url: jsonrpc://127.0.0.1:20991
      cluster: failover
      retries: 1
      methods:
        - name: sayHello
          timeout: 300
          loadbalance: roundrobin
  services:
    greeter:
      interface: org.apache.dubbo.demo.Greeter
      version: 1.0.0
      group: blue
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() -> Result<(), Error> {
    let file = write_config(CONFIG);
    let root = RootConfig::from_file(file.path())?;

    assert_eq!(root.application.name, "greeter-app");
    assert_eq!(root.registries["demoZK"].timeout, Some(3000));
    assert_eq!(root.protocols["json"].threads, Some(50));
    assert_eq!(root.consumer.base.check, Some(false));
    let reference = &root.references["greeter"];
    assert_eq!(reference.base.retries, Some(1));
    assert_eq!(reference.methods[0].loadbalance.as_deref(), Some("roundrobin"));
    Ok(())
}

#[test]
fn test_assemble_urls_from_file() -> Result<(), Error> {
    let file = write_config(CONFIG);
    let root = RootConfig::from_file(file.path())?;

    let consumer = reference_url(&root, &root.references["greeter"])?;
    assert_eq!(consumer.address(), "127.0.0.1:20991");
    assert_eq!(consumer.get_param("check"), Some("false"));
    assert_eq!(consumer.get_param("timeout"), Some("2000"));
    assert_eq!(consumer.method_parameter("sayHello", "timeout", "0"), "300");
    assert_eq!(consumer.get_param("owner"), Some("team-a"));

    let provider = service_url(&root, &root.services["greeter"])?;
    assert_eq!(provider.scheme(), "jsonrpc");
    assert_eq!(provider.service_key(), "blue/org.apache.dubbo.demo.Greeter:1.0.0");
    assert_eq!(provider.get_param("threadpool"), Some("cached"));
    assert_eq!(provider.get_param("corethreads"), Some("5"));
    assert_eq!(provider.get_param("dump.directory"), Some("/tmp/dumps"));
    Ok(())
}

#[test]
fn test_load_from_env_location() -> Result<(), Error> {
    let file = write_config(CONFIG);
    std::env::set_var(ENV_DUBBO_CONFIG_PATH, file.path());
    let root = RootConfig::load()?;
    std::env::remove_var(ENV_DUBBO_CONFIG_PATH);
    assert_eq!(root.services.len(), 1);
    Ok(())
}

#[test]
fn test_invalid_configs() {
    let missing_root = RootConfig::from_yaml_str("logging:\n  level: info\n");
    assert!(matches!(missing_root, Err(ConfigError::MissingRoot("dubbo"))));

    let no_interface =
        RootConfig::from_yaml_str("dubbo:\n  references:\n    broken:\n      retries: 2\n");
    assert!(matches!(no_interface, Err(ConfigError::Invalid { .. })));

    let missing_file = RootConfig::from_file(std::path::Path::new("/no/such/dubbo.yaml"));
    assert!(matches!(missing_file, Err(ConfigError::Io { .. })));
}

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

use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use thiserror::Error;

use crate::constants::{
    BACKUP_KEY, DEFAULT_PROTOCOL, GROUP_KEY, HOST_KEY, INTERFACE_KEY, PASSWORD_KEY, PATH_KEY,
    PORT_KEY, PROTOCOL_KEY, USERNAME_KEY, VERSION_KEY,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("malformed address '{address}': {reason}")]
    MalformedAddress {
        address: String,
        reason: &'static str,
    },
}

impl UrlError {
    fn malformed(address: &str, reason: &'static str) -> Self {
        UrlError::MalformedAddress {
            address: address.to_string(),
            reason,
        }
    }
}

/// Typed view over a single url parameter.
pub trait UrlParam: FromStr {
    type TargetType;

    fn name() -> &'static str;

    fn value(&self) -> Self::TargetType;

    fn as_str(&self) -> Cow<str>;
}

/// Immutable configuration unit: `scheme://[user[:password]@]host[:port]/path?k=v`.
///
/// Every mutator returns a new `Url`. Equality is structural and does not depend on the
/// order parameters were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Url {
    scheme: String,
    username: Option<String>,
    password: Option<String>,
    host: String,
    // 0 means unset
    port: u16,
    // interface name in most cases, stored without the leading '/'
    path: String,
    params: HashMap<String, String>,
}

impl Url {
    pub fn new(scheme: &str, host: &str, port: u16, path: &str) -> Self {
        Url {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            path: path.trim_start_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn parse(address: &str) -> Result<Self, UrlError> {
        let raw = address;
        let address = address.trim();
        if address.is_empty() {
            return Err(UrlError::malformed(raw, "address is empty"));
        }

        let (rest, query) = match address.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (address, None),
        };
        let params = match query {
            Some(query) => decode_query(raw, query)?,
            None => HashMap::new(),
        };

        let (scheme, rest) = match rest.find("://") {
            Some(idx) => {
                let scheme = &rest[..idx];
                if scheme.is_empty() {
                    return Err(UrlError::malformed(raw, "missing scheme before '://'"));
                }
                (scheme, &rest[idx + 3..])
            }
            None => ("", rest),
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };

        let (user_info, host_port) = match authority.rsplit_once('@') {
            Some((user_info, host_port)) => (Some(user_info), host_port),
            None => (None, authority),
        };
        let (username, password) = match user_info {
            Some(info) => match info.split_once(':') {
                Some((user, password)) => (
                    Some(decode(raw, user)?),
                    Some(decode(raw, password)?),
                ),
                None => (Some(decode(raw, info)?), None),
            },
            None => (None, None),
        };

        let (host, port) = split_host_port(raw, host_port)?;

        Ok(Url {
            scheme: scheme.to_string(),
            username,
            password,
            host: host.to_string(),
            port,
            path: decode(raw, path)?,
            params,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn protocol(&self) -> &str {
        &self.scheme
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn params_count(&self) -> usize {
        self.params.len()
    }

    /// `host:port`, or just the host when no port is set.
    pub fn address(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == 0 {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// The interface this url addresses, the `interface` parameter winning over the path.
    pub fn service_interface(&self) -> String {
        self.get_param(INTERFACE_KEY)
            .filter(|interface| !interface.is_empty())
            .unwrap_or(&self.path)
            .to_string()
    }

    // serviceKey format in dubbo java and go '{group}/{interfaceName}:{version}'
    pub fn service_key(&self) -> String {
        let mut key = String::new();
        if let Some(group) = self.get_param(GROUP_KEY).filter(|g| !g.is_empty()) {
            key.push_str(group);
            key.push('/');
        }
        key.push_str(&self.service_interface());
        if let Some(version) = self.get_param(VERSION_KEY).filter(|v| !v.is_empty()) {
            key.push(':');
            key.push_str(version);
        }
        key
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Value of `key`, or `default` when absent or empty.
    pub fn parameter(&self, key: &str, default: &str) -> String {
        match self.get_param(key) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    }

    /// Parsed value of `key`; absent, empty and unparsable values all yield `default`.
    pub fn parameter_as<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get_param(key)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// `<method>.<key>` if configured, else `key`, else `default`.
    pub fn method_parameter(&self, method: &str, key: &str, default: &str) -> String {
        match self.get_param(&format!("{}.{}", method, key)) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => self.parameter(key, default),
        }
    }

    pub fn method_parameter_as<T: FromStr>(&self, method: &str, key: &str, default: T) -> T {
        match self
            .get_param(&format!("{}.{}", method, key))
            .filter(|value| !value.is_empty())
            .and_then(|value| value.trim().parse().ok())
        {
            Some(value) => value,
            None => self.parameter_as(key, default),
        }
    }

    pub fn query<T: UrlParam>(&self) -> Option<T> {
        self.get_param(T::name()).and_then(|value| value.parse().ok())
    }

    pub fn with_query<T: UrlParam>(&self, param: T) -> Url {
        self.with(T::name(), param.as_str().as_ref())
    }

    pub fn with(&self, key: &str, value: &str) -> Url {
        let mut url = self.clone();
        url.params.insert(key.to_string(), value.to_string());
        url
    }

    pub fn with_if_absent(&self, key: &str, value: &str) -> Url {
        if self.has_param(key) {
            return self.clone();
        }
        self.with(key, value)
    }

    pub fn with_params<'a, I>(&self, params: I) -> Url
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut url = self.clone();
        for (key, value) in params {
            url.params.insert(key.clone(), value.clone());
        }
        url
    }

    pub fn without(&self, key: &str) -> Url {
        let mut url = self.clone();
        url.params.remove(key);
        url
    }

    pub fn with_scheme(&self, scheme: &str) -> Url {
        Url {
            scheme: scheme.to_string(),
            ..self.clone()
        }
    }

    pub fn with_host(&self, host: &str) -> Url {
        Url {
            host: host.to_string(),
            ..self.clone()
        }
    }

    pub fn with_port(&self, port: u16) -> Url {
        Url {
            port,
            ..self.clone()
        }
    }

    pub fn with_path(&self, path: &str) -> Url {
        Url {
            path: path.trim_start_matches('/').to_string(),
            ..self.clone()
        }
    }

    pub fn with_credentials(&self, username: Option<&str>, password: Option<&str>) -> Url {
        Url {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            ..self.clone()
        }
    }

    // short_url is used for tcp listening
    pub fn short_url(&self) -> String {
        let mut short = String::new();
        if !self.scheme.is_empty() {
            short.push_str(&self.scheme);
            short.push_str("://");
        }
        short.push_str(&self.address());
        if !self.path.is_empty() {
            short.push('/');
            short.push_str(&encode_path(&self.path));
        }
        short
    }

    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.to_string()).into_owned()
    }

    fn encode_params(&self) -> String {
        let mut keys: Vec<&String> = self.params.keys().collect();
        keys.sort();
        keys.iter()
            .map(|key| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(&self.params[*key])
                )
            })
            .collect::<Vec<String>>()
            .join("&")
    }
}

impl Display for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}://", self.scheme)?;
        }
        if let Some(username) = &self.username {
            f.write_str(&urlencoding::encode(username))?;
            if let Some(password) = &self.password {
                write!(f, ":{}", urlencoding::encode(password))?;
            }
            f.write_str("@")?;
        }
        f.write_str(&self.address())?;
        if !self.path.is_empty() {
            write!(f, "/{}", encode_path(&self.path))?;
        }
        if !self.params.is_empty() {
            write!(f, "?{}", self.encode_params())?;
        }
        Ok(())
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s)
    }
}

/// Parses `address` and fills whatever it leaves unset from `defaults`.
///
/// `defaults` may carry `protocol`, `username`, `password`, `host`, `port` and `path`; every
/// other entry becomes a parameter unless the address already sets it. A comma separated
/// address keeps the first entry and records the rest under `backup`.
pub fn parse_url(address: &str, defaults: &HashMap<String, String>) -> Result<Url, UrlError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(UrlError::malformed(address, "address is empty"));
    }

    let mut entries = trimmed
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty());
    let main = entries
        .next()
        .ok_or_else(|| UrlError::malformed(address, "address is empty"))?;
    let backup: Vec<&str> = entries.collect();

    let default_protocol = defaults
        .get(PROTOCOL_KEY)
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .unwrap_or(DEFAULT_PROTOCOL);

    let mut url = Url::parse(main)?;
    if url.scheme.is_empty() {
        url.scheme = default_protocol.to_string();
    }
    if url.username.is_none() {
        url.username = defaults.get(USERNAME_KEY).filter(|u| !u.is_empty()).cloned();
    }
    if url.password.is_none() {
        url.password = defaults.get(PASSWORD_KEY).filter(|p| !p.is_empty()).cloned();
    }
    if url.host.is_empty() {
        if let Some(host) = defaults.get(HOST_KEY) {
            url.host = host.clone();
        }
    }
    if url.port == 0 {
        if let Some(port) = defaults.get(PORT_KEY).and_then(|p| p.parse::<u16>().ok()) {
            url.port = port;
        }
    }
    if url.path.is_empty() {
        if let Some(path) = defaults.get(PATH_KEY) {
            url.path = path.trim_start_matches('/').to_string();
        }
    }
    if url.host.is_empty() {
        return Err(UrlError::malformed(address, "missing host"));
    }

    for (key, value) in defaults {
        if matches!(
            key.as_str(),
            PROTOCOL_KEY | USERNAME_KEY | PASSWORD_KEY | HOST_KEY | PORT_KEY | PATH_KEY
        ) {
            continue;
        }
        url.params.entry(key.clone()).or_insert_with(|| value.clone());
    }
    if !backup.is_empty() {
        url.params.insert(BACKUP_KEY.to_string(), backup.join(","));
    }
    Ok(url)
}

/// Splits a registry-style address list on `|` or `;` and parses every entry.
pub fn parse_urls(address: &str, defaults: &HashMap<String, String>) -> Result<Vec<Url>, UrlError> {
    let entries: Vec<&str> = address
        .split(|c| c == '|' || c == ';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();
    if entries.is_empty() {
        return Err(UrlError::malformed(address, "address is empty"));
    }
    entries
        .into_iter()
        .map(|entry| parse_url(entry, defaults))
        .collect()
}

fn split_host_port<'a>(raw: &str, host_port: &'a str) -> Result<(&'a str, u16), UrlError> {
    if let Some(stripped) = host_port.strip_prefix('[') {
        let (host, rest) = stripped
            .split_once(']')
            .ok_or_else(|| UrlError::malformed(raw, "unterminated '[' in host"))?;
        let port = match rest.strip_prefix(':') {
            Some(port) => parse_port(raw, port)?,
            None if rest.is_empty() => 0,
            None => return Err(UrlError::malformed(raw, "unexpected text after host")),
        };
        return Ok((host, port));
    }
    if host_port.matches(':').count() > 1 {
        return Err(UrlError::malformed(raw, "ipv6 hosts must be enclosed in '[]'"));
    }
    match host_port.split_once(':') {
        Some((host, port)) => Ok((host, parse_port(raw, port)?)),
        None => Ok((host_port, 0)),
    }
}

fn parse_port(raw: &str, port: &str) -> Result<u16, UrlError> {
    port.parse::<u16>()
        .map_err(|_| UrlError::malformed(raw, "invalid port"))
}

fn decode(raw: &str, value: &str) -> Result<String, UrlError> {
    urlencoding::decode(value)
        .map(Cow::into_owned)
        .map_err(|_| UrlError::malformed(raw, "invalid percent encoding"))
}

fn decode_query(raw: &str, query: &str) -> Result<HashMap<String, String>, UrlError> {
    let mut params = HashMap::new();
    for pair in query.split('&').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) => {
                params.insert(decode(raw, key.trim())?, decode(raw, value.trim())?);
            }
            // a bare key stands for itself, e.g. `?anyhost`
            None => {
                let key = decode(raw, pair)?;
                params.insert(key.clone(), key);
            }
        }
    }
    Ok(params)
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<String>>()
        .join("/")
}

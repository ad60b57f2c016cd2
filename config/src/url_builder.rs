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

use std::time::{SystemTime, UNIX_EPOCH};

use dubbo_base::{
    constants::{
        ANYHOST_KEY, ANYHOST_VALUE, BIND_IP_KEY, CONSUMER, DEFAULT_PROTOCOL, GENERIC_KEY, INJVM, INTERFACE_KEY,
        LOCALHOST_VALUE, METHODS_KEY, NO_AVAILABLE, PATH_KEY, PID_KEY, PROTOCOL_KEY, PROVIDER,
        REGISTER_KEY, REGISTRY_KEY, REGISTRY_PROTOCOL, SIDE_KEY, SUBSCRIBE_KEY, TIMESTAMP_KEY,
    },
    parse_url, parse_urls, Url,
};
use dubbo_logger::tracing::{debug, info};
use dubbo_utils::{env_util::get_property, host_util::local_ip};

use crate::{
    merge::{apply_property_fallback, merge_layers, Parameters, PROPERTY_FALLBACK_KEYS},
    types::{
        method::MethodConfig, protocol::ProtocolConfig, reference::ReferenceConfig,
        service::ServiceConfig, RootConfig,
    },
    ConfigError,
};

pub const REGISTRY_SERVICE: &str = "org.apache.dubbo.registry.RegistryService";

pub const REGISTRY_ADDRESS_PROPERTY: &str = "dubbo.registry.address";

/// Registry urls of every configured registry, for the provider or the consumer side.
///
/// Each url is rewritten to the `registry` scheme with the real scheme kept in the
/// `registry` parameter. Registries with `register=false` (provider) or `subscribe=false`
/// (consumer) are left out.
pub fn load_registries(root: &RootConfig, provider: bool) -> Result<Vec<Url>, ConfigError> {
    let mut ids: Vec<&String> = root.registries.keys().collect();
    ids.sort();

    let mut registries = Vec::new();
    for id in ids {
        let config = &root.registries[id];
        let mut address = config.address.trim().to_string();
        if address.is_empty() {
            address = ANYHOST_VALUE.to_string();
        }
        if let Some(overridden) = get_property(REGISTRY_ADDRESS_PROPERTY) {
            address = overridden;
        }
        if address.eq_ignore_ascii_case(NO_AVAILABLE) {
            debug!("registry {} disabled", id);
            continue;
        }

        let mut params = merge_layers(&[&root.application, config], &[PROTOCOL_KEY]);
        params.insert(PATH_KEY.to_string(), REGISTRY_SERVICE.to_string());
        stamp(&mut params);
        params
            .entry(PROTOCOL_KEY.to_string())
            .or_insert_with(|| DEFAULT_PROTOCOL.to_string());

        for url in parse_urls(&address, &params)? {
            let url = url
                .with(REGISTRY_KEY, url.scheme())
                .with_scheme(REGISTRY_PROTOCOL);
            let enabled = if provider {
                url.parameter_as(REGISTER_KEY, true)
            } else {
                url.parameter_as(SUBSCRIBE_KEY, true)
            };
            if enabled {
                registries.push(url);
            }
        }
    }
    Ok(registries)
}

/// The consumer url of `reference`, from application, consumer and reference layers.
///
/// A reference with a point-to-point `url` targets it; otherwise the `injvm` scheme (or
/// the configured protocol) on the local host is used.
pub fn reference_url(root: &RootConfig, reference: &ReferenceConfig) -> Result<Url, ConfigError> {
    let mut params = merge_layers(&[&root.application, &root.consumer, reference], &[]);
    params.insert(SIDE_KEY.to_string(), CONSUMER.to_string());
    params.insert(INTERFACE_KEY.to_string(), reference.interface.clone());
    let generic = params
        .get(GENERIC_KEY)
        .map(|g| g.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if generic {
        params.insert(METHODS_KEY.to_string(), "*".to_string());
    } else {
        append_methods(&mut params, &reference.methods);
    }
    stamp(&mut params);
    apply_property_fallback(&mut params, &PROPERTY_FALLBACK_KEYS);

    let url = match &reference.url {
        Some(address) if !address.trim().is_empty() => {
            let mut defaults = params;
            defaults.insert(PATH_KEY.to_string(), reference.interface.clone());
            if let Some(protocol) = &reference.protocol {
                defaults.insert(PROTOCOL_KEY.to_string(), protocol.clone());
            }
            parse_url(address, &defaults)?
        }
        _ => {
            let scheme = reference.protocol.as_deref().unwrap_or(INJVM);
            Url::new(scheme, LOCALHOST_VALUE, 0, &reference.interface).with_params(&params)
        }
    };
    info!("reference url: {}", url);
    Ok(url)
}

/// The provider url of `service` on its protocol.
pub fn service_url(root: &RootConfig, service: &ServiceConfig) -> Result<Url, ConfigError> {
    let local_protocol = ProtocolConfig::new(INJVM);
    let protocol = select_protocol(root, service, &local_protocol)?;

    let mut params = merge_layers(
        &[&root.application, &root.provider, protocol, service],
        &[],
    );
    params.insert(SIDE_KEY.to_string(), PROVIDER.to_string());
    params.insert(INTERFACE_KEY.to_string(), service.interface.clone());
    append_methods(&mut params, &service.methods);
    stamp(&mut params);
    apply_property_fallback(&mut params, &PROPERTY_FALLBACK_KEYS);

    let mut host = protocol
        .host
        .clone()
        .or_else(|| root.provider.host.clone())
        .filter(|host| !host.trim().is_empty())
        .unwrap_or_else(|| local_ip().to_string());
    if host == ANYHOST_VALUE {
        params.insert(ANYHOST_KEY.to_string(), "true".to_string());
        params.insert(BIND_IP_KEY.to_string(), ANYHOST_VALUE.to_string());
        host = local_ip().to_string();
    }

    let url = Url::new(
        &protocol.name,
        &host,
        protocol.port.unwrap_or(0),
        &service.interface,
    )
    .with_params(&params);
    info!("service url: {}", url);
    Ok(url)
}

fn select_protocol<'a>(
    root: &'a RootConfig,
    service: &ServiceConfig,
    fallback: &'a ProtocolConfig,
) -> Result<&'a ProtocolConfig, ConfigError> {
    match &service.protocol {
        Some(id) => root.protocols.get(id).ok_or_else(|| ConfigError::Invalid {
            kind: "service",
            id: service.interface.clone(),
            reason: format!("protocol '{}' is not configured", id),
        }),
        None => match root.protocols.len() {
            0 => Ok(fallback),
            1 => Ok(root.protocols.values().next().unwrap_or(fallback)),
            _ => Err(ConfigError::Invalid {
                kind: "service",
                id: service.interface.clone(),
                reason: "several protocols are configured, name one".to_string(),
            }),
        },
    }
}

fn append_methods(params: &mut Parameters, methods: &[MethodConfig]) {
    let names: Vec<&str> = methods
        .iter()
        .map(|method| method.name.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    if !names.is_empty() {
        params.insert(METHODS_KEY.to_string(), names.join(","));
    }
}

fn stamp(params: &mut Parameters) {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    params.insert(TIMESTAMP_KEY.to_string(), millis.to_string());
    params.insert(PID_KEY.to_string(), std::process::id().to_string());
}

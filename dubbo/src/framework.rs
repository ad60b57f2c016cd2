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

use std::sync::Arc;

use dubbo_base::{
    constants::{BACKUP_KEY, COMMA_SEPARATOR, JSONRPC},
    Node, Url,
};
use dubbo_cluster::{ClusterDirectory, StaticDirectory};
use dubbo_config::{
    get_global_config, reference_url, service_url, ConfigError, ReferenceConfig, RootConfig,
    ServiceConfig,
};
use dubbo_logger::tracing::{debug, info, warn};
use dubbo_protocol_jsonrpc::JsonRpcProtocol;
use dubbo_rpc::{
    BoxExporter, BoxInvoker, GenericProxy, ProtocolDirectory, ProxyFactory, RpcError,
    ServiceDescriptor, ServiceProxy,
};
use dubbo_threadpool::ThreadPoolGuard;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameworkError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("no {kind} named '{id}' is configured")]
    NotConfigured { kind: &'static str, id: String },
}

/// Wires configuration to protocols, clusters and proxies for one application.
///
/// Services are exported from [`ServiceConfig`]s and references are built from
/// [`ReferenceConfig`]s, both resolved against the application's [`RootConfig`].
/// Dropping the framework leaves everything exported; call [`Framework::destroy`].
pub struct Framework {
    config: RootConfig,
    guard: Arc<ThreadPoolGuard>,
    protocols: ProtocolDirectory,
    clusters: ClusterDirectory,
    proxy_factory: ProxyFactory,
    exporters: Mutex<Vec<BoxExporter>>,
    references: Mutex<Vec<BoxInvoker>>,
}

impl Framework {
    pub fn new(config: RootConfig) -> Self {
        let guard = Arc::new(ThreadPoolGuard::new());
        let protocols = ProtocolDirectory::new();
        protocols.register_instance(JSONRPC, Arc::new(JsonRpcProtocol::new(guard.clone())));
        Framework {
            config,
            guard,
            protocols,
            clusters: ClusterDirectory::new(),
            proxy_factory: ProxyFactory::new(),
            exporters: Mutex::new(Vec::new()),
            references: Mutex::new(Vec::new()),
        }
    }

    /// A framework over the process configuration, see [`get_global_config`].
    pub fn from_global() -> Result<Self, FrameworkError> {
        Ok(Self::new(get_global_config()?.clone()))
    }

    pub fn config(&self) -> &RootConfig {
        &self.config
    }

    /// The saturation guard shared by every thread pool this framework starts.
    pub fn guard(&self) -> &Arc<ThreadPoolGuard> {
        &self.guard
    }

    pub fn protocols(&self) -> &ProtocolDirectory {
        &self.protocols
    }

    pub fn clusters(&self) -> &ClusterDirectory {
        &self.clusters
    }

    /// Exports `service` as described by `service_config` and returns the provider url.
    pub async fn export<S>(
        &self,
        service: Arc<S>,
        descriptor: ServiceDescriptor<S>,
        service_config: &ServiceConfig,
    ) -> Result<Url, FrameworkError>
    where
        S: Send + Sync + 'static,
    {
        let url = service_url(&self.config, service_config)?;
        let invoker = self.proxy_factory.get_invoker(service, descriptor, url);
        let exporter = self.protocols.export(invoker).await?;
        let url = exporter.invoker().get_url().as_ref().clone();
        self.exporters.lock().push(exporter);
        Ok(url)
    }

    /// Exports `service` with the service config registered under `id`.
    pub async fn export_configured<S>(
        &self,
        id: &str,
        service: Arc<S>,
        descriptor: ServiceDescriptor<S>,
    ) -> Result<Url, FrameworkError>
    where
        S: Send + Sync + 'static,
    {
        let service_config = self.config.services.get(id).cloned().ok_or_else(|| {
            FrameworkError::NotConfigured {
                kind: "service",
                id: id.to_string(),
            }
        })?;
        self.export(service, descriptor, &service_config).await
    }

    /// Exported provider urls, in export order.
    pub fn exported(&self) -> Vec<Url> {
        self.exporters
            .lock()
            .iter()
            .filter(|exporter| !exporter.is_unexported())
            .map(|exporter| exporter.invoker().get_url().as_ref().clone())
            .collect()
    }

    /// A typed client of the service `reference` names.
    pub async fn refer<T: ServiceProxy>(&self, reference: &ReferenceConfig) -> Result<T, FrameworkError> {
        let invoker = self.refer_invoker(reference).await?;
        Ok(self.proxy_factory.get_proxy(invoker)?)
    }

    /// A typed client built from the reference config registered under `id`.
    pub async fn refer_configured<T: ServiceProxy>(&self, id: &str) -> Result<T, FrameworkError> {
        let reference = self.config.references.get(id).cloned().ok_or_else(|| {
            FrameworkError::NotConfigured {
                kind: "reference",
                id: id.to_string(),
            }
        })?;
        self.refer(&reference).await
    }

    /// A client calling the service by method name, without its types.
    pub async fn refer_generic(&self, reference: &ReferenceConfig) -> Result<GenericProxy, FrameworkError> {
        let mut reference = reference.clone();
        reference.base.generic = Some(true);
        self.refer(&reference).await
    }

    /// The cluster invoker over every endpoint of `reference`.
    pub async fn refer_invoker(&self, reference: &ReferenceConfig) -> Result<BoxInvoker, FrameworkError> {
        let url = reference_url(&self.config, reference)?;
        let mut invokers = Vec::new();
        for endpoint in endpoints(&url)? {
            invokers.push(self.protocols.refer(&reference.interface, endpoint).await?);
        }
        debug!("{} has {} endpoints", reference.interface, invokers.len());
        let directory = Arc::new(StaticDirectory::new(url.without(BACKUP_KEY), invokers));
        let invoker = self.clusters.join(directory)?;
        self.references.lock().push(invoker.clone());
        Ok(invoker)
    }

    /// Unexports every service, destroys every reference and closes the protocols.
    pub fn destroy(&self) {
        let exporters: Vec<BoxExporter> = self.exporters.lock().drain(..).collect();
        let references: Vec<BoxInvoker> = self.references.lock().drain(..).collect();
        info!(
            "destroying framework: {} exports, {} references",
            exporters.len(),
            references.len()
        );
        for exporter in exporters {
            exporter.unexport();
        }
        for reference in references {
            reference.destroy();
        }
        self.protocols.destroy_all();
        if self.guard.warnings() > 0 {
            warn!("thread pools were saturated {} times", self.guard.warnings());
        }
    }
}

impl std::fmt::Debug for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framework")
            .field("application", &self.config.application.name)
            .field("protocols", &self.protocols)
            .field("clusters", &self.clusters)
            .field("exported", &self.exporters.lock().len())
            .field("references", &self.references.lock().len())
            .finish()
    }
}

/// `url` and one url per backup address it records.
fn endpoints(url: &Url) -> Result<Vec<Url>, RpcError> {
    let primary = url.without(BACKUP_KEY);
    let mut endpoints = vec![primary.clone()];
    let Some(backup) = url.get_param(BACKUP_KEY) else {
        return Ok(endpoints);
    };
    for address in backup.split(COMMA_SEPARATOR).map(str::trim).filter(|a| !a.is_empty()) {
        let parsed = Url::parse(&format!("{}://{}", primary.scheme(), address))?;
        endpoints.push(primary.with_host(parsed.host()).with_port(parsed.port()));
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use dubbo_base::constants::GENERIC_KEY;

    use super::*;

    #[test]
    fn test_endpoints_include_backups() {
        let url = Url::new("jsonrpc", "10.0.0.1", 20880, "demo.Greeter")
            .with(BACKUP_KEY, "10.0.0.2:20881,10.0.0.3:20882");
        let addresses: Vec<String> = endpoints(&url)
            .unwrap()
            .iter()
            .map(|url| url.address())
            .collect();
        assert_eq!(
            addresses,
            vec!["10.0.0.1:20880", "10.0.0.2:20881", "10.0.0.3:20882"]
        );
        assert!(endpoints(&url).unwrap().iter().all(|url| !url.has_param(BACKUP_KEY)));
    }

    #[test]
    fn test_generic_flag_kept_on_reference() {
        let url = reference_url(
            &RootConfig::new(),
            &ReferenceConfig {
                base: dubbo_config::InterfaceConfig {
                    generic: Some(true),
                    ..Default::default()
                },
                ..ReferenceConfig::new("demo.Greeter")
            },
        )
        .unwrap();
        assert_eq!(url.get_param(GENERIC_KEY), Some("true"));
    }
}

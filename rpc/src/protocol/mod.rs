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

use async_trait::async_trait;
use dubbo_base::{constants::INJVM, ExtensionDirectory, ExtensionError, Url};
use dubbo_logger::tracing::info;

use crate::{error::RpcError, exporter::BoxExporter, invoker::BoxInvoker};

pub mod injvm;

pub use injvm::InjvmProtocol;

/// Export/refer lifecycle of one url scheme.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Port used when a url leaves it unset.
    fn default_port(&self) -> u16;

    /// Makes `invoker` reachable at its url. Exporting the same url again shares the
    /// existing binding; each call still returns its own handle.
    async fn export(&self, invoker: BoxInvoker) -> Result<BoxExporter, RpcError>;

    /// An invoker that forwards calls of `interface` to the endpoint `url` describes.
    ///
    /// With `check=false` an unreachable endpoint is not an error; the invoker connects on
    /// use instead.
    async fn refer(&self, interface: &str, url: Url) -> Result<BoxInvoker, RpcError>;

    /// Cancels every export and reference made through this protocol. Safe to repeat, and
    /// the protocol stays usable afterwards.
    fn destroy(&self);
}

pub type BoxProtocol = Arc<dyn Protocol>;

/// Protocols by scheme name, one shared instance per scheme.
pub struct ProtocolDirectory {
    extensions: ExtensionDirectory<dyn Protocol>,
}

impl Default for ProtocolDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDirectory {
    /// A directory knowing only the in-process `injvm` protocol.
    pub fn new() -> Self {
        let directory = ProtocolDirectory {
            extensions: ExtensionDirectory::new("protocol"),
        };
        directory.register(INJVM, || Arc::new(InjvmProtocol::new()) as BoxProtocol);
        directory
    }

    pub fn register<F>(&self, scheme: &str, factory: F)
    where
        F: Fn() -> BoxProtocol + Send + Sync + 'static,
    {
        self.extensions.register(scheme, factory);
    }

    pub fn register_instance(&self, scheme: &str, protocol: BoxProtocol) {
        self.extensions.register_instance(scheme, protocol);
    }

    pub fn schemes(&self) -> Vec<String> {
        self.extensions.names()
    }

    pub fn load(&self, scheme: &str) -> Result<BoxProtocol, RpcError> {
        self.extensions.load(scheme).map_err(|err| match err {
            ExtensionError::NotFound { name, .. } => RpcError::UnsupportedProtocol(name),
        })
    }

    pub async fn export(&self, invoker: BoxInvoker) -> Result<BoxExporter, RpcError> {
        let url = invoker.get_url();
        let protocol = self.load(url.scheme())?;
        info!("export {} on {}", invoker.interface(), url.short_url());
        protocol.export(invoker).await
    }

    pub async fn refer(&self, interface: &str, url: Url) -> Result<BoxInvoker, RpcError> {
        let protocol = self.load(url.scheme())?;
        info!("refer {} from {}", interface, url.short_url());
        protocol.refer(interface, url).await
    }

    /// Destroys every protocol instantiated so far.
    pub fn destroy_all(&self) {
        for protocol in self.extensions.loaded() {
            protocol.destroy();
        }
    }
}

impl std::fmt::Debug for ProtocolDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolDirectory")
            .field("schemes", &self.schemes())
            .finish()
    }
}

/// `url` with the protocol's default port filled in when unset.
pub fn with_default_port(url: &Url, protocol: &dyn Protocol) -> Url {
    if url.port() == 0 && protocol.default_port() != 0 {
        url.with_port(protocol.default_port())
    } else {
        url.clone()
    }
}

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
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use dubbo_base::{
    constants::{ANYHOST_VALUE, BIND_IP_KEY, INTERFACE_KEY, JSONRPC},
    params::Check,
    url::UrlParam,
    Node, Url,
};
use dubbo_logger::tracing::{info, warn};
use dubbo_rpc::{
    protocol::with_default_port, BaseInvoker, BoxExporter, BoxInvoker, Exporter, Invoker, Protocol,
    RpcError, RpcInvocation, RpcResult, TimeoutInvoker,
};
use dubbo_threadpool::ThreadPoolGuard;
use parking_lot::Mutex;

use crate::{
    client::{Client, CONNECT_TIMEOUT_KEY, DEFAULT_CONNECT_TIMEOUT},
    codec::{WireRequest, DEFAULT_PAYLOAD, PAYLOAD_KEY},
    server::Server,
};

pub const DEFAULT_PORT: u16 = 20880;

type Servers = Arc<DashMap<String, Arc<Server>>>;
type Retired = Arc<Mutex<Vec<Arc<Server>>>>;

/// JSON over TCP. One listener per `host:port`, shared by every service exported on it.
pub struct JsonRpcProtocol {
    guard: Arc<ThreadPoolGuard>,
    servers: Servers,
    retired: Retired,
    clients: DashMap<String, Arc<Client>>,
    references: Mutex<Vec<BoxInvoker>>,
    export_lock: tokio::sync::Mutex<()>,
}

impl JsonRpcProtocol {
    pub fn new(guard: Arc<ThreadPoolGuard>) -> Self {
        JsonRpcProtocol {
            guard,
            servers: Arc::new(DashMap::new()),
            retired: Arc::new(Mutex::new(Vec::new())),
            clients: DashMap::new(),
            references: Mutex::new(Vec::new()),
            export_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The server listening on `address`, if any.
    pub fn server(&self, address: &str) -> Option<Arc<Server>> {
        self.servers.get(address).map(|server| server.clone())
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Waits for closed servers to release their ports.
    async fn reap(&self) {
        let retired = std::mem::take(&mut *self.retired.lock());
        for server in retired {
            server.terminated().await;
        }
    }

    fn client(&self, url: &Url) -> Arc<Client> {
        let address = url.address();
        self.clients
            .entry(address.clone())
            .or_insert_with(|| {
                Arc::new(Client::new(
                    &address,
                    Duration::from_millis(url.parameter_as(CONNECT_TIMEOUT_KEY, DEFAULT_CONNECT_TIMEOUT)),
                    url.parameter_as(PAYLOAD_KEY, DEFAULT_PAYLOAD),
                ))
            })
            .clone()
    }
}

/// `host:port` the server of `url` listens on: `bind.ip` when set, else the url host.
pub fn bind_address(url: &Url) -> String {
    let host = url
        .get_param(BIND_IP_KEY)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(url.host());
    let host = if host.is_empty() { ANYHOST_VALUE } else { host };
    if host.contains(':') {
        format!("[{}]:{}", host, url.port())
    } else {
        format!("{}:{}", host, url.port())
    }
}

#[async_trait]
impl Protocol for JsonRpcProtocol {
    fn default_port(&self) -> u16 {
        DEFAULT_PORT
    }

    async fn export(&self, invoker: BoxInvoker) -> Result<BoxExporter, RpcError> {
        let url = with_default_port(&invoker.get_url(), self);
        let address = bind_address(&url);
        let key = url.service_key();
        let _lock = self.export_lock.lock().await;
        loop {
            self.reap().await;
            let server = match self.server(&address) {
                Some(server) => server,
                None => {
                    let server = Arc::new(Server::bind(&url, &address, &self.guard).await?);
                    self.servers.insert(address.clone(), server.clone());
                    server
                }
            };
            match server.attach(&url, invoker.clone()) {
                Some((id, invoker)) => {
                    info!("jsonrpc export {} on {}", key, server.local_address());
                    return Ok(Box::new(JsonRpcExporter {
                        address,
                        key,
                        id,
                        invoker,
                        server,
                        servers: self.servers.clone(),
                        retired: self.retired.clone(),
                        unexported: AtomicBool::new(false),
                    }));
                }
                None => {
                    self.servers
                        .remove_if(&address, |_, current| Arc::ptr_eq(current, &server));
                    server.close();
                    self.retired.lock().push(server);
                }
            }
        }
    }

    async fn refer(&self, interface: &str, url: Url) -> Result<BoxInvoker, RpcError> {
        let url = with_default_port(&url, self).with_if_absent(INTERFACE_KEY, interface);
        let client = self.client(&url);
        if url.query::<Check>().unwrap_or_default().value() {
            client.connect().await.map_err(|failure| RpcError::Refer {
                url: url.to_string(),
                reason: failure.message,
            })?;
        } else if let Err(failure) = client.connect().await {
            warn!(
                "jsonrpc refer {} without a connection, retrying on use: {}",
                url.short_url(),
                failure.message
            );
        }
        let invoker: BoxInvoker = Arc::new(TimeoutInvoker::new(Arc::new(JsonRpcInvoker {
            base: BaseInvoker::new(url),
            client,
        })));
        let mut references = self.references.lock();
        references.retain(|reference| !reference.is_destroyed());
        references.push(invoker.clone());
        Ok(invoker)
    }

    fn destroy(&self) {
        let references = std::mem::take(&mut *self.references.lock());
        for invoker in references {
            invoker.destroy();
        }
        for client in self.clients.iter() {
            client.close();
        }
        self.clients.clear();
        let addresses: Vec<String> = self.servers.iter().map(|entry| entry.key().clone()).collect();
        for address in addresses {
            if let Some((_, server)) = self.servers.remove(&address) {
                server.close();
                self.retired.lock().push(server);
            }
        }
    }
}

impl Debug for JsonRpcProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let servers: Vec<String> = self.servers.iter().map(|entry| entry.key().clone()).collect();
        f.debug_struct("JsonRpcProtocol")
            .field("protocol", &JSONRPC)
            .field("servers", &servers)
            .field("clients", &self.clients.len())
            .finish()
    }
}

pub struct JsonRpcExporter {
    address: String,
    key: String,
    id: u64,
    invoker: BoxInvoker,
    server: Arc<Server>,
    servers: Servers,
    retired: Retired,
    unexported: AtomicBool,
}

impl Exporter for JsonRpcExporter {
    fn invoker(&self) -> BoxInvoker {
        self.invoker.clone()
    }

    fn unexport(&self) {
        if self.unexported.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.server.detach(&self.key, self.id) {
            self.servers
                .remove_if(&self.address, |_, current| Arc::ptr_eq(current, &self.server));
            self.server.close();
            self.retired.lock().push(self.server.clone());
        }
    }

    fn is_unexported(&self) -> bool {
        self.unexported.load(Ordering::SeqCst) || !self.server.is_bound(&self.key, self.id)
    }
}

impl Debug for JsonRpcExporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcExporter")
            .field("address", &self.address)
            .field("key", &self.key)
            .field("unexported", &self.is_unexported())
            .finish()
    }
}

struct JsonRpcInvoker {
    base: BaseInvoker,
    client: Arc<Client>,
}

impl Node for JsonRpcInvoker {
    fn get_url(&self) -> Arc<Url> {
        self.base.get_url()
    }

    fn is_available(&self) -> bool {
        self.base.is_available()
    }

    fn destroy(&self) {
        self.base.destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }
}

#[async_trait]
impl Invoker for JsonRpcInvoker {
    async fn invoke(&self, invocation: Arc<RpcInvocation>) -> RpcResult {
        if let Some(destroyed) = self.base.destroyed_failure() {
            return destroyed;
        }
        let request = WireRequest {
            id: 0,
            service_key: self.base.url().service_key(),
            service: invocation.service_name().to_string(),
            method: invocation.method_name().to_string(),
            parameter_types: invocation.parameter_types().to_vec(),
            arguments: invocation.arguments().to_vec(),
            attachments: invocation.attachments().clone(),
        };
        match self.client.request(request).await {
            Ok(response) => response.into_result(),
            Err(failure) => RpcResult::err(failure.with_endpoints(vec![self.base.url().address()])),
        }
    }
}

impl Debug for JsonRpcInvoker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcInvoker")
            .field("base", &self.base)
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use dubbo_utils::host_util::scan_free_port;

    use super::*;

    #[tokio::test]
    async fn test_refer_forgets_destroyed_references() {
        let protocol = JsonRpcProtocol::new(Arc::new(ThreadPoolGuard::new()));
        let url = Url::new(JSONRPC, "127.0.0.1", scan_free_port(28900), "demo.Echo").with("check", "false");
        for _ in 0..5 {
            let invoker = protocol.refer("demo.Echo", url.clone()).await.unwrap();
            invoker.destroy();
        }
        let kept = protocol.refer("demo.Echo", url).await.unwrap();
        assert_eq!(protocol.references.lock().len(), 1);

        protocol.destroy();
        assert!(kept.is_destroyed());
    }
}

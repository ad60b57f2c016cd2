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
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use dubbo_base::{
    constants::{INTERFACE_KEY, TIMESTAMP_KEY},
    params::Check,
    url::UrlParam,
    Node, Url,
};
use dubbo_logger::tracing::{debug, info};
use parking_lot::Mutex;

use crate::{
    context::RpcContext,
    error::{FailureKind, InvocationFailure, RpcError},
    exporter::{BoxExporter, Exporter},
    invocation::RpcInvocation,
    invoker::{BaseInvoker, BoxInvoker, Invoker},
    protocol::Protocol,
    result::RpcResult,
    timeout::TimeoutInvoker,
};

struct Binding {
    id: u64,
    url: Url,
    invoker: BoxInvoker,
    handles: usize,
}

type ExportMap = Arc<DashMap<String, Binding>>;

/// Urls naming the same binding differ at most in their export timestamp.
fn same_binding(left: &Url, right: &Url) -> bool {
    left.without(TIMESTAMP_KEY) == right.without(TIMESTAMP_KEY)
}

/// In-process protocol: consumers call the exported invoker directly.
pub struct InjvmProtocol {
    exports: ExportMap,
    references: Mutex<Vec<BoxInvoker>>,
    next_id: AtomicU64,
}

impl Default for InjvmProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl InjvmProtocol {
    pub fn new() -> Self {
        InjvmProtocol {
            exports: Arc::new(DashMap::new()),
            references: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn is_exported(&self, service_key: &str) -> bool {
        self.exports.contains_key(service_key)
    }

    /// Number of live export handles sharing the binding of `service_key`.
    pub fn export_handles(&self, service_key: &str) -> usize {
        self.exports
            .get(service_key)
            .map(|binding| binding.handles)
            .unwrap_or(0)
    }
}

#[async_trait]
impl Protocol for InjvmProtocol {
    fn default_port(&self) -> u16 {
        0
    }

    async fn export(&self, invoker: BoxInvoker) -> Result<BoxExporter, RpcError> {
        let url = invoker.get_url();
        let key = url.service_key();
        let (id, invoker) = match self.exports.entry(key.clone()) {
            Entry::Occupied(mut entry) if same_binding(&entry.get().url, &url) => {
                let binding = entry.get_mut();
                binding.handles += 1;
                debug!("injvm {} exported again, {} handles", key, binding.handles);
                (binding.id, binding.invoker.clone())
            }
            Entry::Occupied(mut entry) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                info!("injvm {} re-exported with a new url {}", key, url);
                entry.insert(Binding {
                    id,
                    url: url.as_ref().clone(),
                    invoker: invoker.clone(),
                    handles: 1,
                });
                (id, invoker)
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                entry.insert(Binding {
                    id,
                    url: url.as_ref().clone(),
                    invoker: invoker.clone(),
                    handles: 1,
                });
                (id, invoker)
            }
        };
        Ok(Box::new(InjvmExporter {
            key,
            id,
            invoker,
            exports: self.exports.clone(),
            unexported: AtomicBool::new(false),
        }))
    }

    async fn refer(&self, interface: &str, url: Url) -> Result<BoxInvoker, RpcError> {
        let url = if url.has_param(INTERFACE_KEY) {
            url
        } else {
            url.with(INTERFACE_KEY, interface)
        };
        let key = url.service_key();
        let check = url.query::<Check>().unwrap_or_default().value();
        if check && !self.exports.contains_key(&key) {
            return Err(RpcError::Refer {
                url: url.to_string(),
                reason: format!("no injvm provider exports {}", key),
            });
        }
        let invoker: BoxInvoker = Arc::new(TimeoutInvoker::new(Arc::new(InjvmInvoker {
            base: BaseInvoker::new(url),
            key,
            exports: self.exports.clone(),
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
        if !self.exports.is_empty() {
            info!("injvm unexport {} services on destroy", self.exports.len());
        }
        self.exports.clear();
    }
}

impl Debug for InjvmProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjvmProtocol")
            .field("exports", &self.exports.len())
            .field("references", &self.references.lock().len())
            .finish()
    }
}

pub struct InjvmExporter {
    key: String,
    id: u64,
    invoker: BoxInvoker,
    exports: ExportMap,
    unexported: AtomicBool,
}

impl Exporter for InjvmExporter {
    fn invoker(&self) -> BoxInvoker {
        self.invoker.clone()
    }

    fn unexport(&self) {
        if self.unexported.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Entry::Occupied(mut entry) = self.exports.entry(self.key.clone()) {
            if entry.get().id != self.id {
                return;
            }
            entry.get_mut().handles -= 1;
            if entry.get().handles == 0 {
                entry.remove();
                info!("injvm {} unexported", self.key);
            }
        }
    }

    fn is_unexported(&self) -> bool {
        self.unexported.load(Ordering::SeqCst)
            || self
                .exports
                .get(&self.key)
                .map(|binding| binding.id != self.id)
                .unwrap_or(true)
    }
}

impl Debug for InjvmExporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjvmExporter")
            .field("key", &self.key)
            .field("binding", &self.id)
            .field("unexported", &self.is_unexported())
            .finish()
    }
}

/// Looks the exported invoker up on every call, so providers exported after the refer
/// are found.
struct InjvmInvoker {
    base: BaseInvoker,
    key: String,
    exports: ExportMap,
}

impl Node for InjvmInvoker {
    fn get_url(&self) -> Arc<Url> {
        self.base.get_url()
    }

    fn is_available(&self) -> bool {
        self.base.is_available() && self.exports.contains_key(&self.key)
    }

    fn destroy(&self) {
        self.base.destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }
}

#[async_trait]
impl Invoker for InjvmInvoker {
    async fn invoke(&self, invocation: Arc<RpcInvocation>) -> RpcResult {
        if let Some(destroyed) = self.base.destroyed_failure() {
            return destroyed;
        }
        let target = self.exports.get(&self.key).map(|binding| binding.invoker.clone());
        let Some(target) = target else {
            return RpcResult::err(InvocationFailure::new(
                FailureKind::NoProvider,
                format!("no injvm provider exports {}", self.key),
            ));
        };
        RpcContext::new()
            .with_attachments(invocation.attachments().clone())
            .scope(target.invoke(invocation))
            .await
    }
}

impl Debug for InjvmInvoker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjvmInvoker")
            .field("key", &self.key)
            .field("base", &self.base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    struct Echo {
        base: BaseInvoker,
    }

    impl Node for Echo {
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
    impl Invoker for Echo {
        async fn invoke(&self, invocation: Arc<RpcInvocation>) -> RpcResult {
            RpcResult::ok(json!(invocation.arguments()))
        }
    }

    fn echo(url: &Url) -> BoxInvoker {
        Arc::new(Echo {
            base: BaseInvoker::new(url.clone()),
        })
    }

    #[tokio::test]
    async fn test_export_shares_binding() {
        let protocol = InjvmProtocol::new();
        let url = Url::new("injvm", "127.0.0.1", 0, "demo.Echo");
        let first = protocol.export(echo(&url)).await.unwrap();
        let second = protocol.export(echo(&url)).await.unwrap();
        assert_eq!(protocol.export_handles("demo.Echo"), 2);
        assert!(Arc::ptr_eq(&first.invoker(), &second.invoker()));

        first.unexport();
        first.unexport();
        assert!(first.is_unexported());
        assert!(!second.is_unexported());
        assert!(protocol.is_exported("demo.Echo"));

        second.unexport();
        assert!(!protocol.is_exported("demo.Echo"));
    }

    #[tokio::test]
    async fn test_new_url_replaces_binding() {
        let protocol = InjvmProtocol::new();
        let url = Url::new("injvm", "127.0.0.1", 0, "demo.Echo");
        let old = protocol.export(echo(&url)).await.unwrap();
        let new = protocol.export(echo(&url.with("weight", "50"))).await.unwrap();
        assert!(old.is_unexported());
        old.unexport();
        assert!(protocol.is_exported("demo.Echo"));
        assert!(!new.is_unexported());
    }

    #[tokio::test]
    async fn test_lazy_refer_finds_late_provider() {
        let protocol = InjvmProtocol::new();
        let refer_url = Url::new("injvm", "127.0.0.1", 0, "demo.Echo").with("check", "false");
        let invoker = protocol.refer("demo.Echo", refer_url).await.unwrap();
        let invocation = Arc::new(RpcInvocation::new("demo.Echo", "echo").with_arguments(vec![json!(1)]));

        let result = invoker.invoke(invocation.clone()).await;
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::NoProvider));

        let url = Url::new("injvm", "127.0.0.1", 0, "demo.Echo");
        let _exporter = protocol.export(echo(&url)).await.unwrap();
        let result = invoker.invoke(invocation).await;
        assert_eq!(result.value(), Some(&json!([1])));
    }

    #[tokio::test]
    async fn test_refer_forgets_destroyed_references() {
        let protocol = InjvmProtocol::new();
        let url = Url::new("injvm", "127.0.0.1", 0, "demo.Echo").with("check", "false");
        for _ in 0..10 {
            let invoker = protocol.refer("demo.Echo", url.clone()).await.unwrap();
            invoker.destroy();
        }
        let kept = protocol.refer("demo.Echo", url).await.unwrap();
        assert_eq!(protocol.references.lock().len(), 1);

        protocol.destroy();
        assert!(kept.is_destroyed());
    }

    #[tokio::test]
    async fn test_destroy_then_reuse() {
        let protocol = InjvmProtocol::new();
        let url = Url::new("injvm", "127.0.0.1", 0, "demo.Echo");
        let exporter = protocol.export(echo(&url)).await.unwrap();
        let invoker = protocol.refer("demo.Echo", url.clone()).await.unwrap();

        protocol.destroy();
        protocol.destroy();
        assert!(exporter.is_unexported());
        assert!(invoker.is_destroyed());
        let result = invoker
            .invoke(Arc::new(RpcInvocation::new("demo.Echo", "echo")))
            .await;
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Destroyed));

        let _exporter = protocol.export(echo(&url)).await.unwrap();
        exporter.unexport();
        assert!(protocol.is_exported("demo.Echo"));
        let invoker = protocol.refer("demo.Echo", url).await.unwrap();
        assert!(invoker.is_available());
    }
}

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
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dubbo_base::{constants::TIMESTAMP_KEY, Url};
use dubbo_logger::tracing::{debug, info, warn};
use dubbo_rpc::{
    BoxInvoker, FailureKind, InvocationFailure, RpcContext, RpcError, RpcInvocation, RpcResult,
};
use dubbo_threadpool::{new_thread_pool, ThreadPoolExecutor, ThreadPoolGuard};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::codec::{decode, encode_frame, read_frame, WireRequest, WireResponse, PAYLOAD_KEY, DEFAULT_PAYLOAD};

static NEXT_BINDING: AtomicU64 = AtomicU64::new(1);

struct Binding {
    id: u64,
    url: Url,
    invoker: BoxInvoker,
    handles: usize,
}

#[derive(Default)]
struct Exports {
    closed: bool,
    bindings: HashMap<String, Binding>,
}

/// What every connection of one server shares.
struct Dispatcher {
    exports: Mutex<Exports>,
    pool: ThreadPoolExecutor,
    payload: usize,
    runtime: Handle,
}

/// A listener on one `host:port`, shared by every service exported there.
pub struct Server {
    address: String,
    local_address: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    shutdown: watch::Sender<bool>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Binds `address` and starts accepting; inbound calls run on the pool `url` describes.
    pub async fn bind(url: &Url, address: &str, guard: &Arc<ThreadPoolGuard>) -> Result<Server, RpcError> {
        let pool = new_thread_pool(url, guard).map_err(|err| RpcError::UnsupportedExtension {
            kind: "threadpool".to_string(),
            name: err.to_string(),
        })?;
        let listener = TcpListener::bind(address).await.map_err(|err| RpcError::Bind {
            address: address.to_string(),
            reason: err.to_string(),
        })?;
        let local_address = listener.local_addr().map_err(|err| RpcError::Bind {
            address: address.to_string(),
            reason: err.to_string(),
        })?;
        let dispatcher = Arc::new(Dispatcher {
            exports: Mutex::new(Exports::default()),
            pool,
            payload: url.parameter_as(PAYLOAD_KEY, DEFAULT_PAYLOAD),
            runtime: Handle::current(),
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let acceptor = tokio::spawn(accept(listener, dispatcher.clone(), shutdown_rx));
        info!("jsonrpc server listening on {}", local_address);
        Ok(Server {
            address: address.to_string(),
            local_address,
            dispatcher,
            shutdown,
            acceptor: Mutex::new(Some(acceptor)),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    pub fn is_closed(&self) -> bool {
        self.dispatcher.exports.lock().closed
    }

    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.dispatcher.exports.lock().bindings.keys().cloned().collect();
        services.sort();
        services
    }

    /// Serves `invoker` under its service key. A url equal to the bound one, timestamp aside,
    /// shares that binding; another url replaces it. `None` once the server is closed.
    pub fn attach(&self, url: &Url, invoker: BoxInvoker) -> Option<(u64, BoxInvoker)> {
        let mut exports = self.dispatcher.exports.lock();
        if exports.closed {
            return None;
        }
        let key = url.service_key();
        if let Some(binding) = exports.bindings.get_mut(&key) {
            if binding.url.without(TIMESTAMP_KEY) == url.without(TIMESTAMP_KEY) {
                binding.handles += 1;
                debug!("{} exported again on {}, {} handles", key, self.address, binding.handles);
                return Some((binding.id, binding.invoker.clone()));
            }
        }
        let id = NEXT_BINDING.fetch_add(1, Ordering::SeqCst);
        exports.bindings.insert(
            key,
            Binding {
                id,
                url: url.clone(),
                invoker: invoker.clone(),
                handles: 1,
            },
        );
        Some((id, invoker))
    }

    /// Drops one handle of binding `id`. Returns true when that left the server without
    /// services, in which case it no longer accepts exports and should be closed.
    pub fn detach(&self, key: &str, id: u64) -> bool {
        let mut exports = self.dispatcher.exports.lock();
        let Some(binding) = exports.bindings.get_mut(key) else {
            return false;
        };
        if binding.id != id {
            return false;
        }
        binding.handles -= 1;
        if binding.handles == 0 {
            exports.bindings.remove(key);
            info!("{} unexported from {}", key, self.address);
        }
        if exports.bindings.is_empty() && !exports.closed {
            exports.closed = true;
            return true;
        }
        false
    }

    pub fn is_bound(&self, key: &str, id: u64) -> bool {
        self.dispatcher
            .exports
            .lock()
            .bindings
            .get(key)
            .map(|binding| binding.id == id)
            .unwrap_or(false)
    }

    /// Stops accepting, disconnects every client and shuts the pool down.
    pub fn close(&self) {
        {
            let mut exports = self.dispatcher.exports.lock();
            exports.closed = true;
            exports.bindings.clear();
        }
        let _ = self.shutdown.send(true);
        if let Some(acceptor) = self.acceptor.lock().as_ref() {
            acceptor.abort();
        }
        self.dispatcher.pool.shutdown();
        info!("jsonrpc server on {} closed", self.address);
    }

    /// Waits until the listener is released after [`Server::close`].
    pub async fn terminated(&self) {
        let acceptor = self.acceptor.lock().take();
        if let Some(acceptor) = acceptor {
            let _ = acceptor.await;
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("local_address", &self.local_address)
            .field("services", &self.services())
            .finish()
    }
}

async fn accept(listener: TcpListener, dispatcher: Arc<Dispatcher>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("jsonrpc connection from {}", peer);
                    tokio::spawn(serve(stream, peer, dispatcher.clone(), shutdown.clone()));
                }
                Err(err) => warn!("jsonrpc accept failed: {}", err),
            },
        }
    }
}

async fn serve(stream: TcpStream, peer: SocketAddr, dispatcher: Arc<Dispatcher>, mut shutdown: watch::Receiver<bool>) {
    let local = stream.local_addr().ok();
    let _ = stream.set_nodelay(true);
    let (mut reader, mut writer) = stream.into_split();
    let (responses, mut outbound) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(err) = writer.write_all(&frame).await {
                debug!("jsonrpc write to {} failed: {}", peer, err);
                break;
            }
        }
    });
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = read_frame(&mut reader, dispatcher.payload) => match frame {
                Ok(Some(frame)) => dispatch(&dispatcher, frame, peer, local, &responses),
                Ok(None) => break,
                Err(err) => {
                    warn!("jsonrpc connection from {} dropped: {}", peer, err);
                    break;
                }
            },
        }
    }
    writer_task.abort();
    debug!("jsonrpc connection from {} closed", peer);
}

fn reply(responses: &mpsc::UnboundedSender<Vec<u8>>, response: WireResponse, payload: usize) {
    let id = response.id;
    let frame = encode_frame(&response, payload).or_else(|err| {
        encode_frame(
            &WireResponse::failure(id, InvocationFailure::serialization(err.to_string())),
            payload,
        )
    });
    match frame {
        Ok(frame) => {
            let _ = responses.send(frame);
        }
        Err(err) => warn!("jsonrpc response {} dropped: {}", id, err),
    }
}

fn dispatch(
    dispatcher: &Arc<Dispatcher>,
    frame: Vec<u8>,
    peer: SocketAddr,
    local: Option<SocketAddr>,
    responses: &mpsc::UnboundedSender<Vec<u8>>,
) {
    let request: WireRequest = match decode(&frame) {
        Ok(request) => request,
        Err(err) => {
            let id = decode::<Value>(&frame)
                .ok()
                .and_then(|value| value.get("id").and_then(Value::as_u64))
                .unwrap_or(0);
            reply(
                responses,
                WireResponse::failure(id, InvocationFailure::serialization(err.to_string())),
                dispatcher.payload,
            );
            return;
        }
    };
    let id = request.id;
    let label = format!("{}.{} from {}", request.service, request.method, peer);
    let task_dispatcher = dispatcher.clone();
    let task_responses = responses.clone();
    let submitted = dispatcher.pool.execute_named(&label, move || {
        let result = task_dispatcher
            .runtime
            .block_on(task_dispatcher.invoke(request, peer, local));
        reply(
            &task_responses,
            WireResponse::from_result(id, result),
            task_dispatcher.payload,
        );
    });
    if let Err(rejected) = submitted {
        reply(
            responses,
            WireResponse::failure(id, InvocationFailure::new(FailureKind::Overloaded, rejected.message)),
            dispatcher.payload,
        );
    }
}

impl Dispatcher {
    async fn invoke(&self, request: WireRequest, peer: SocketAddr, local: Option<SocketAddr>) -> RpcResult {
        let invoker = self
            .exports
            .lock()
            .bindings
            .get(&request.service_key)
            .map(|binding| binding.invoker.clone());
        let Some(invoker) = invoker else {
            return RpcResult::err(InvocationFailure::new(
                FailureKind::NoProvider,
                format!("{} is not exported on this server", request.service_key),
            ));
        };
        let context = RpcContext::new()
            .with_remote_address(Some(peer))
            .with_local_address(local)
            .with_attachments(request.attachments.clone());
        let invocation = RpcInvocation::new(&request.service, &request.method)
            .with_parameter_types(request.parameter_types)
            .with_arguments(request.arguments)
            .with_attachments(request.attachments);
        context.scope(invoker.invoke(Arc::new(invocation))).await
    }
}

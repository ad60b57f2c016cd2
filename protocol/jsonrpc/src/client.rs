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
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use dashmap::DashMap;
use dubbo_logger::tracing::{debug, info, warn};
use dubbo_rpc::InvocationFailure;
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};

use crate::codec::{decode, encode_frame, read_frame, WireRequest, WireResponse};

pub const CONNECT_TIMEOUT_KEY: &str = "connect.timeout";

pub const DEFAULT_CONNECT_TIMEOUT: u64 = 3000;

type Pending = Arc<DashMap<u64, oneshot::Sender<WireResponse>>>;

/// One multiplexed connection; responses are matched to requests by id.
struct Connection {
    local_address: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: Pending,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    async fn open(address: &str, connect_timeout: Duration, payload: usize) -> Result<Connection, InvocationFailure> {
        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(InvocationFailure::network(format!(
                    "failed to connect to {}: {}",
                    address, err
                )))
            }
            Err(_) => {
                return Err(InvocationFailure::network(format!(
                    "connect to {} timed out after {}ms",
                    address,
                    connect_timeout.as_millis()
                )))
            }
        };
        let _ = stream.set_nodelay(true);
        let local_address = stream.local_addr().ok();
        let (mut reader, mut writer) = stream.into_split();
        let pending: Pending = Arc::new(DashMap::new());
        let alive = Arc::new(AtomicBool::new(true));

        let (outbound, mut frames) = mpsc::unbounded_channel::<Vec<u8>>();
        let writer_alive = alive.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if let Err(err) = writer.write_all(&frame).await {
                    debug!("jsonrpc write failed: {}", err);
                    break;
                }
            }
            writer_alive.store(false, Ordering::SeqCst);
        });

        let reader_pending = pending.clone();
        let reader_alive = alive.clone();
        let peer = address.to_string();
        let reader = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader, payload).await {
                    Ok(Some(frame)) => match decode::<WireResponse>(&frame) {
                        Ok(response) => {
                            if let Some((_, waiter)) = reader_pending.remove(&response.id) {
                                let _ = waiter.send(response);
                            }
                        }
                        Err(err) => warn!("undecodable response from {}: {}", peer, err),
                    },
                    Ok(None) => {
                        debug!("jsonrpc server {} closed the connection", peer);
                        break;
                    }
                    Err(err) => {
                        warn!("jsonrpc connection to {} broken: {}", peer, err);
                        break;
                    }
                }
            }
            reader_alive.store(false, Ordering::SeqCst);
            reader_pending.clear();
        });

        Ok(Connection {
            local_address,
            outbound,
            pending,
            alive,
            reader,
            writer,
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Removes the waiter of a call that finished or was dropped.
struct PendingGuard {
    id: u64,
    pending: Pending,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

/// Client side of one `host:port`, reconnecting on use after the connection broke.
pub struct Client {
    address: String,
    connect_timeout: Duration,
    payload: usize,
    next_id: AtomicU64,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl Client {
    pub fn new(address: &str, connect_timeout: Duration, payload: usize) -> Self {
        Client {
            address: address.to_string(),
            connect_timeout,
            payload,
            next_id: AtomicU64::new(1),
            connection: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        match self.connection.try_lock() {
            Ok(connection) => connection.as_ref().map(|c| c.is_alive()).unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn local_address(&self) -> Option<SocketAddr> {
        self.connection
            .lock()
            .await
            .as_ref()
            .and_then(|connection| connection.local_address)
    }

    /// Connects now unless a live connection exists.
    pub async fn connect(&self) -> Result<(), InvocationFailure> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&self) -> Result<Arc<Connection>, InvocationFailure> {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.as_ref().filter(|connection| connection.is_alive()) {
            return Ok(connection.clone());
        }
        let reconnect = slot.is_some();
        let connection = Arc::new(Connection::open(&self.address, self.connect_timeout, self.payload).await?);
        if reconnect {
            info!("jsonrpc reconnected to {}", self.address);
        } else {
            debug!("jsonrpc connected to {}", self.address);
        }
        *slot = Some(connection.clone());
        Ok(connection)
    }

    /// Sends `request` under a fresh id and waits for its response. Dropping the returned
    /// future abandons the call.
    pub async fn request(&self, mut request: WireRequest) -> Result<WireResponse, InvocationFailure> {
        let connection = self.connection().await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        request.id = id;
        let frame = encode_frame(&request, self.payload)
            .map_err(|err| InvocationFailure::serialization(err.to_string()))?;

        let (waiter, response) = oneshot::channel();
        connection.pending.insert(id, waiter);
        let _guard = PendingGuard {
            id,
            pending: connection.pending.clone(),
        };
        if connection.outbound.send(frame).is_err() {
            connection.alive.store(false, Ordering::SeqCst);
            return Err(InvocationFailure::network(format!(
                "connection to {} is closed",
                self.address
            )));
        }
        response.await.map_err(|_| {
            InvocationFailure::network(format!(
                "connection to {} closed before the response of {}.{}",
                self.address, request.service, request.method
            ))
        })
    }

    /// Drops the connection; the next request reconnects.
    pub fn close(&self) {
        if let Ok(mut connection) = self.connection.try_lock() {
            if connection.take().is_some() {
                debug!("jsonrpc client of {} closed", self.address);
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.address)
            .field("connected", &self.is_connected())
            .finish()
    }
}

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
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use dubbo_base::Url;
use dubbo_logger::tracing::debug;
use dubbo_rpc::{BoxInvoker, RpcInvocation};
use parking_lot::RwLock;

/// Candidate invokers of one referred service, refreshed from outside.
pub trait Directory: Debug + Send + Sync {
    /// The consumer url, carrying the cluster parameters.
    fn url(&self) -> Arc<Url>;

    fn list(&self, invocation: &RpcInvocation) -> Vec<BoxInvoker>;

    fn is_available(&self) -> bool;

    fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

pub type BoxDirectory = Arc<dyn Directory>;

/// A directory over a fixed list that can be replaced as a whole.
#[derive(Debug)]
pub struct StaticDirectory {
    url: Arc<Url>,
    invokers: RwLock<Vec<BoxInvoker>>,
    destroyed: AtomicBool,
}

impl StaticDirectory {
    pub fn new(url: Url, invokers: Vec<BoxInvoker>) -> Self {
        StaticDirectory {
            url: Arc::new(url),
            invokers: RwLock::new(invokers),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Replaces the candidates; calls already running keep the list they started with.
    pub fn set_invokers(&self, invokers: Vec<BoxInvoker>) {
        if self.is_destroyed() {
            return;
        }
        debug!("{} now has {} invokers", self.url.service_key(), invokers.len());
        *self.invokers.write() = invokers;
    }

    pub fn invokers(&self) -> Vec<BoxInvoker> {
        self.invokers.read().clone()
    }
}

impl Directory for StaticDirectory {
    fn url(&self) -> Arc<Url> {
        self.url.clone()
    }

    fn list(&self, _invocation: &RpcInvocation) -> Vec<BoxInvoker> {
        if self.is_destroyed() {
            return Vec::new();
        }
        self.invokers.read().clone()
    }

    fn is_available(&self) -> bool {
        !self.is_destroyed() && self.invokers.read().iter().any(|invoker| invoker.is_available())
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        for invoker in self.invokers.write().drain(..) {
            invoker.destroy();
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

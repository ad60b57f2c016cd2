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

pub mod broadcast;
pub mod directory;
pub mod failback;
pub mod failfast;
pub mod failover;
pub mod failsafe;
pub mod forking;
pub mod loadbalance;
pub mod support;

use std::{fmt, marker::PhantomData, sync::Arc};

use dubbo_base::{
    constants::{CLUSTER_KEY, DEFAULT_CLUSTER},
    ExtensionDirectory,
};
use dubbo_logger::tracing::debug;
use dubbo_rpc::{BoxInvoker, RpcError};

pub use broadcast::Broadcast;
pub use directory::{BoxDirectory, Directory, StaticDirectory};
pub use failback::Failback;
pub use failfast::Failfast;
pub use failover::Failover;
pub use failsafe::Failsafe;
pub use forking::Forking;
pub use loadbalance::{BoxLoadBalance, LoadBalance, LOAD_BALANCE_EXTENSIONS};
pub use support::{ClusterInvoker, ClusterStrategy, ClusterSupport};

/// Joins the invokers of a directory into a single invoker.
pub trait Cluster: Send + Sync {
    fn join(&self, directory: BoxDirectory) -> BoxInvoker;
}

pub type BoxCluster = Arc<dyn Cluster>;

/// A cluster giving every joined directory its own `S`.
pub struct StrategyCluster<S> {
    _strategy: PhantomData<fn() -> S>,
}

impl<S> Default for StrategyCluster<S> {
    fn default() -> Self {
        StrategyCluster {
            _strategy: PhantomData,
        }
    }
}

impl<S: ClusterStrategy + Default> Cluster for StrategyCluster<S> {
    fn join(&self, directory: BoxDirectory) -> BoxInvoker {
        Arc::new(ClusterInvoker::new(directory, S::default()))
    }
}

fn strategy<S: ClusterStrategy + Default>() -> BoxCluster {
    Arc::new(StrategyCluster::<S>::default())
}

/// Clusters by name.
pub struct ClusterDirectory {
    extensions: ExtensionDirectory<dyn Cluster>,
}

impl Default for ClusterDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterDirectory {
    pub fn new() -> Self {
        let extensions = ExtensionDirectory::new("cluster");
        extensions.register(failover::NAME, strategy::<Failover>);
        extensions.register(failfast::NAME, strategy::<Failfast>);
        extensions.register(failsafe::NAME, strategy::<Failsafe>);
        extensions.register(failback::NAME, strategy::<Failback>);
        extensions.register(forking::NAME, strategy::<Forking>);
        extensions.register(broadcast::NAME, strategy::<Broadcast>);
        ClusterDirectory { extensions }
    }

    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> BoxCluster + Send + Sync + 'static,
    {
        self.extensions.register(name, factory);
    }

    pub fn names(&self) -> Vec<String> {
        self.extensions.names()
    }

    pub fn load(&self, name: &str) -> Result<BoxCluster, RpcError> {
        Ok(self.extensions.load(name)?)
    }

    /// Joins `directory` with the cluster its url names, `failover` by default.
    pub fn join(&self, directory: BoxDirectory) -> Result<BoxInvoker, RpcError> {
        let name = directory.url().parameter(CLUSTER_KEY, DEFAULT_CLUSTER);
        let cluster = self.load(&name)?;
        debug!("joining {} with the {} cluster", directory.url().service_key(), name);
        Ok(cluster.join(directory))
    }
}

impl fmt::Debug for ClusterDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterDirectory")
            .field("clusters", &self.extensions.names())
            .finish()
    }
}

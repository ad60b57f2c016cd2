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
};

use async_trait::async_trait;
use dubbo_base::{
    constants::{
        CLUSTER_AVAILABLE_CHECK_KEY, CLUSTER_STICKY_KEY, DEFAULT_CLUSTER_AVAILABLE_CHECK,
        DEFAULT_CLUSTER_STICKY,
    },
    Node, Url,
};
use dubbo_logger::tracing::debug;
use dubbo_rpc::{
    BoxInvoker, FailureKind, InvocationFailure, Invoker, RpcInvocation, RpcResult,
};
use parking_lot::Mutex;

use crate::{
    directory::BoxDirectory,
    loadbalance::{load_balance, BoxLoadBalance},
};

/// Whether two handles point at the same invoker.
pub fn same_invoker(left: &BoxInvoker, right: &BoxInvoker) -> bool {
    std::ptr::eq(
        Arc::as_ptr(left) as *const (),
        Arc::as_ptr(right) as *const (),
    )
}

fn contains(invokers: &[BoxInvoker], invoker: &BoxInvoker) -> bool {
    invokers.iter().any(|candidate| same_invoker(candidate, invoker))
}

/// Selection shared by every fault tolerance strategy: load balance, stickiness,
/// exclusion of invokers already tried and the availability check.
#[derive(Clone)]
pub struct ClusterSupport {
    directory: BoxDirectory,
    sticky: Arc<Mutex<Option<BoxInvoker>>>,
    availablecheck: bool,
    destroyed: Arc<AtomicBool>,
}

impl ClusterSupport {
    pub fn new(directory: BoxDirectory) -> Self {
        let availablecheck = directory
            .url()
            .parameter_as(CLUSTER_AVAILABLE_CHECK_KEY, DEFAULT_CLUSTER_AVAILABLE_CHECK);
        ClusterSupport {
            directory,
            sticky: Arc::new(Mutex::new(None)),
            availablecheck,
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn url(&self) -> Arc<Url> {
        self.directory.url()
    }

    pub fn directory(&self) -> &BoxDirectory {
        &self.directory
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn list(&self, invocation: &RpcInvocation) -> Vec<BoxInvoker> {
        self.directory.list(invocation)
    }

    pub fn load_balance(&self, invocation: &RpcInvocation) -> Result<BoxLoadBalance, RpcResult> {
        load_balance(&self.url(), invocation).map_err(RpcResult::err)
    }

    pub fn no_provider(&self, invocation: &RpcInvocation) -> RpcResult {
        RpcResult::err(InvocationFailure::new(
            FailureKind::NoProvider,
            format!(
                "no provider available for {}.{}",
                self.url().service_key(),
                invocation.method_name()
            ),
        ))
    }

    pub fn destroyed_failure(&self) -> RpcResult {
        RpcResult::err(InvocationFailure::new(
            FailureKind::Destroyed,
            format!("cluster invoker of {} is destroyed", self.url().service_key()),
        ))
    }

    /// One invoker for `invocation`, avoiding `selected` while anything else is left.
    pub fn select(
        &self,
        load_balance: &BoxLoadBalance,
        invocation: &RpcInvocation,
        invokers: &[BoxInvoker],
        selected: &[BoxInvoker],
    ) -> Option<BoxInvoker> {
        if invokers.is_empty() {
            return None;
        }
        let sticky = self.url().method_parameter_as(
            invocation.method_name(),
            CLUSTER_STICKY_KEY,
            DEFAULT_CLUSTER_STICKY,
        );
        {
            let mut sticky_invoker = self.sticky.lock();
            if let Some(current) = sticky_invoker.as_ref() {
                if !contains(invokers, current) {
                    *sticky_invoker = None;
                }
            }
            if sticky {
                if let Some(current) = sticky_invoker.as_ref() {
                    if !contains(selected, current) && (!self.availablecheck || current.is_available()) {
                        return Some(current.clone());
                    }
                }
            }
        }
        let invoker = self.do_select(load_balance, invocation, invokers, selected)?;
        if sticky {
            *self.sticky.lock() = Some(invoker.clone());
        }
        Some(invoker)
    }

    fn do_select(
        &self,
        load_balance: &BoxLoadBalance,
        invocation: &RpcInvocation,
        invokers: &[BoxInvoker],
        selected: &[BoxInvoker],
    ) -> Option<BoxInvoker> {
        if invokers.len() == 1 {
            return invokers.first().cloned();
        }
        let picked = load_balance.select(invokers, &self.url(), invocation)?;
        let rejected = contains(selected, &picked) || (self.availablecheck && !picked.is_available());
        if !rejected {
            return Some(picked);
        }
        if let Some(reselected) = self.reselect(load_balance, invocation, invokers, selected) {
            return Some(reselected);
        }
        // nothing better: the neighbour of the rejected pick
        let index = invokers
            .iter()
            .position(|invoker| same_invoker(invoker, &picked))
            .unwrap_or(0);
        invokers.get((index + 1) % invokers.len()).cloned()
    }

    fn reselect(
        &self,
        load_balance: &BoxLoadBalance,
        invocation: &RpcInvocation,
        invokers: &[BoxInvoker],
        selected: &[BoxInvoker],
    ) -> Option<BoxInvoker> {
        let fresh: Vec<BoxInvoker> = invokers
            .iter()
            .filter(|invoker| !contains(selected, invoker))
            .filter(|invoker| !self.availablecheck || invoker.is_available())
            .cloned()
            .collect();
        if !fresh.is_empty() {
            return load_balance.select(&fresh, &self.url(), invocation);
        }
        let tried: Vec<BoxInvoker> = selected
            .iter()
            .filter(|invoker| invoker.is_available())
            .cloned()
            .collect();
        if tried.is_empty() {
            return None;
        }
        debug!("all invokers of {} were tried, selecting again among them", self.url().service_key());
        load_balance.select(&tried, &self.url(), invocation)
    }
}

impl Debug for ClusterSupport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSupport")
            .field("directory", &self.directory)
            .field("availablecheck", &self.availablecheck)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// How one cluster dispatches an invocation over the listed invokers.
#[async_trait]
pub trait ClusterStrategy: Debug + Send + Sync + 'static {
    async fn do_invoke(
        &self,
        support: &ClusterSupport,
        invocation: Arc<RpcInvocation>,
        invokers: Vec<BoxInvoker>,
        load_balance: BoxLoadBalance,
    ) -> RpcResult;

    /// Stops background work when the cluster invoker is destroyed.
    fn destroy(&self) {}
}

/// The invoker a cluster joins a directory into.
pub struct ClusterInvoker<S> {
    support: ClusterSupport,
    strategy: S,
}

impl<S: ClusterStrategy> ClusterInvoker<S> {
    pub fn new(directory: BoxDirectory, strategy: S) -> Self {
        ClusterInvoker {
            support: ClusterSupport::new(directory),
            strategy,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

impl<S: ClusterStrategy> Node for ClusterInvoker<S> {
    fn get_url(&self) -> Arc<Url> {
        self.support.url()
    }

    fn is_available(&self) -> bool {
        !self.support.is_destroyed() && self.support.directory.is_available()
    }

    fn destroy(&self) {
        if self.support.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.strategy.destroy();
        self.support.directory.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.support.is_destroyed()
    }
}

#[async_trait]
impl<S: ClusterStrategy> Invoker for ClusterInvoker<S> {
    async fn invoke(&self, invocation: Arc<RpcInvocation>) -> RpcResult {
        if self.support.is_destroyed() {
            return self.support.destroyed_failure();
        }
        let invokers = self.support.list(&invocation);
        let load_balance = match self.support.load_balance(&invocation) {
            Ok(load_balance) => load_balance,
            Err(result) => return result,
        };
        self.strategy
            .do_invoke(&self.support, invocation, invokers, load_balance)
            .await
    }
}

impl<S: ClusterStrategy> Debug for ClusterInvoker<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterInvoker")
            .field("strategy", &self.strategy)
            .field("support", &self.support)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use dubbo_rpc::RpcInvocation;

    use super::*;
    use crate::{directory::StaticDirectory, loadbalance::tests::invokers};

    fn support(url: Url, invokers: Vec<BoxInvoker>) -> ClusterSupport {
        ClusterSupport::new(Arc::new(StaticDirectory::new(url, invokers)))
    }

    fn consumer_url() -> Url {
        Url::new("consumer", "127.0.0.1", 0, "demo.Greeter")
    }

    #[test]
    fn test_select_avoids_selected() {
        let invokers = invokers(&[100, 100, 100]);
        let support = support(consumer_url(), invokers.clone());
        let invocation = RpcInvocation::new("demo.Greeter", "greet");
        let balance = support.load_balance(&invocation).unwrap();

        let mut selected = Vec::new();
        for _ in 0..3 {
            let picked = support.select(&balance, &invocation, &invokers, &selected).unwrap();
            assert!(!contains(&selected, &picked));
            selected.push(picked);
        }
        assert!(support.select(&balance, &invocation, &invokers, &selected).is_some());
    }

    #[test]
    fn test_select_skips_unavailable() {
        let invokers = invokers(&[100, 100]);
        invokers[0].destroy();
        let support = support(consumer_url(), invokers.clone());
        let invocation = RpcInvocation::new("demo.Greeter", "greet");
        let balance = support.load_balance(&invocation).unwrap();
        for _ in 0..20 {
            let picked = support.select(&balance, &invocation, &invokers, &[]).unwrap();
            assert!(same_invoker(&picked, &invokers[1]));
        }
    }

    #[test]
    fn test_sticky_keeps_first_pick() {
        let invokers = invokers(&[100, 100, 100]);
        let support = support(consumer_url().with("sticky", "true"), invokers.clone());
        let invocation = RpcInvocation::new("demo.Greeter", "greet");
        let balance = support.load_balance(&invocation).unwrap();
        let first = support.select(&balance, &invocation, &invokers, &[]).unwrap();
        for _ in 0..20 {
            let picked = support.select(&balance, &invocation, &invokers, &[]).unwrap();
            assert!(same_invoker(&picked, &first));
        }
        let other = support
            .select(&balance, &invocation, &invokers, &[first.clone()])
            .unwrap();
        assert!(!same_invoker(&other, &first));
    }
}

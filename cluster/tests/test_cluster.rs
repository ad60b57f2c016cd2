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
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dubbo_base::{Node, Url};
use dubbo_cluster::{
    BoxDirectory, ClusterDirectory, ClusterInvoker, Failback, StaticDirectory,
};
use dubbo_rpc::{
    BaseInvoker, BoxInvoker, FailureKind, InvocationFailure, Invoker, RpcError, RpcInvocation,
    RpcResult,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Calls made so far, across every provider of a test.
#[derive(Debug, Default)]
struct Journal {
    calls: AtomicUsize,
    order: Mutex<Vec<String>>,
}

#[derive(Debug)]
struct Provider {
    base: BaseInvoker,
    journal: Arc<Journal>,
    delay: Duration,
    /// Calls of this provider that fail before it starts answering.
    failures: AtomicUsize,
    kind: FailureKind,
}

impl Node for Provider {
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
impl Invoker for Provider {
    async fn invoke(&self, _invocation: Arc<RpcInvocation>) -> RpcResult {
        if let Some(destroyed) = self.base.destroyed_failure() {
            return destroyed;
        }
        self.journal.calls.fetch_add(1, Ordering::SeqCst);
        self.journal.order.lock().push(self.base.url().address());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return RpcResult::err(InvocationFailure::new(
                self.kind,
                format!("{} refused", self.base.url().address()),
            ));
        }
        RpcResult::ok(json!(self.base.url().port()))
    }
}

struct Setup {
    journal: Arc<Journal>,
    next_port: u16,
    providers: Vec<BoxInvoker>,
}

impl Setup {
    fn new() -> Self {
        Setup {
            journal: Arc::default(),
            next_port: 20880,
            providers: Vec::new(),
        }
    }

    fn provider(mut self, failures: usize, delay_ms: u64, kind: FailureKind) -> Self {
        let url = Url::new("mock", "127.0.0.1", self.next_port, "demo.Greeter");
        self.next_port += 1;
        self.providers.push(Arc::new(Provider {
            base: BaseInvoker::new(url),
            journal: self.journal.clone(),
            delay: Duration::from_millis(delay_ms),
            failures: AtomicUsize::new(failures),
            kind,
        }));
        self
    }

    fn healthy(self) -> Self {
        self.provider(0, 0, FailureKind::Network)
    }

    fn broken(self) -> Self {
        self.provider(usize::MAX, 0, FailureKind::Network)
    }

    fn directory(&self, params: &[(&str, &str)]) -> BoxDirectory {
        let mut url = Url::new("consumer", "127.0.0.1", 0, "demo.Greeter");
        for (key, value) in params {
            url = url.with(key, value);
        }
        Arc::new(StaticDirectory::new(url, self.providers.clone()))
    }

    fn join(&self, params: &[(&str, &str)]) -> BoxInvoker {
        ClusterDirectory::new()
            .join(self.directory(params))
            .expect("known cluster")
    }

    fn calls(&self) -> usize {
        self.journal.calls.load(Ordering::SeqCst)
    }

    fn order(&self) -> Vec<String> {
        self.journal.order.lock().clone()
    }
}

fn greet() -> Arc<RpcInvocation> {
    Arc::new(RpcInvocation::new("demo.Greeter", "greet"))
}

fn failure(result: &RpcResult) -> &InvocationFailure {
    result.failure().expect("an invocation failure")
}

#[tokio::test]
async fn test_failover_moves_on_until_a_provider_answers() {
    let setup = Setup::new();
    // whichever provider is tried third answers
    let journal = setup.journal.clone();
    let setup = (0..3).fold(setup, |setup, _| setup.healthy());
    let cluster = {
        let providers: Vec<BoxInvoker> = setup
            .providers
            .iter()
            .map(|provider| {
                Arc::new(ThirdCallWins {
                    inner: provider.clone(),
                    journal: journal.clone(),
                }) as BoxInvoker
            })
            .collect();
        let url = Url::new("consumer", "127.0.0.1", 0, "demo.Greeter").with("retries", "2");
        ClusterDirectory::new()
            .join(Arc::new(StaticDirectory::new(url, providers)))
            .unwrap()
    };

    let result = cluster.invoke(greet()).await;
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(setup.calls(), 3);
    let mut order = setup.order();
    order.sort();
    order.dedup();
    assert_eq!(order.len(), 3, "every attempt used a different provider");
}

/// Fails unless two calls were already made.
#[derive(Debug)]
struct ThirdCallWins {
    inner: BoxInvoker,
    journal: Arc<Journal>,
}

impl Node for ThirdCallWins {
    fn get_url(&self) -> Arc<Url> {
        self.inner.get_url()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn destroy(&self) {
        self.inner.destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}

#[async_trait]
impl Invoker for ThirdCallWins {
    async fn invoke(&self, invocation: Arc<RpcInvocation>) -> RpcResult {
        let earlier = self.journal.calls.load(Ordering::SeqCst);
        let result = self.inner.invoke(invocation).await;
        if earlier < 2 {
            return RpcResult::err(InvocationFailure::network("not yet"));
        }
        result
    }
}

#[tokio::test]
async fn test_failover_reports_every_attempted_endpoint() {
    let setup = Setup::new().broken().broken().broken();
    let cluster = setup.join(&[("retries", "2")]);

    let result = cluster.invoke(greet()).await;
    let failure = failure(&result);
    assert_eq!(failure.kind, FailureKind::Network);
    assert_eq!(setup.calls(), 3);
    assert_eq!(failure.endpoints, setup.order());
    // the message comes from the last provider tried
    let last = setup.order().pop().unwrap();
    assert!(failure.message.contains(&last), "{}", failure.message);
}

#[tokio::test]
async fn test_failover_does_not_retry_business_failures() {
    let setup = Setup::new()
        .provider(usize::MAX, 0, FailureKind::Business)
        .provider(usize::MAX, 0, FailureKind::Business);
    let cluster = setup.join(&[]);

    let result = cluster.invoke(greet()).await;
    assert_eq!(failure(&result).kind, FailureKind::Business);
    assert_eq!(setup.calls(), 1);
}

#[tokio::test]
async fn test_failover_with_huge_retries() {
    let setup = Setup::new().healthy();
    let result = setup
        .join(&[("retries", &i64::MAX.to_string())])
        .invoke(greet())
        .await;
    assert_eq!(result.value(), Some(&json!(20880)));
    assert_eq!(setup.calls(), 1);

    let setup = Setup::new().provider(2, 0, FailureKind::Network);
    let result = setup.join(&[("retries", "1000000000")]).invoke(greet()).await;
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(setup.calls(), 3);
}

#[tokio::test]
async fn test_failover_without_providers() {
    let setup = Setup::new();
    let result = setup.join(&[]).invoke(greet()).await;
    assert_eq!(failure(&result).kind, FailureKind::NoProvider);
}

#[tokio::test]
async fn test_failfast_tries_once() {
    let setup = Setup::new().broken().broken();
    let result = setup.join(&[("cluster", "failfast")]).invoke(greet()).await;
    assert_eq!(failure(&result).kind, FailureKind::Network);
    assert!(failure(&result).endpoints.is_empty());
    assert_eq!(setup.calls(), 1);
}

#[tokio::test]
async fn test_failsafe_swallows_failures() {
    let setup = Setup::new().broken();
    let result = setup.join(&[("cluster", "failsafe")]).invoke(greet()).await;
    assert_eq!(result.value(), Some(&Value::Null));

    let setup = Setup::new().healthy();
    let result = setup.join(&[("cluster", "failsafe")]).invoke(greet()).await;
    assert_eq!(result.value(), Some(&json!(20880)));
}

#[tokio::test]
async fn test_failback_retries_in_the_background() {
    let setup = Setup::new().provider(1, 0, FailureKind::Network);
    let directory = setup.directory(&[("failback.interval", "20")]);
    let cluster = ClusterInvoker::new(directory, Failback::default());

    let result = cluster.invoke(greet()).await;
    assert_eq!(failure(&result).kind, FailureKind::Network);
    assert_eq!(cluster.strategy().pending(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(setup.calls(), 2);
    assert_eq!(cluster.strategy().pending(), 0);
}

#[tokio::test]
async fn test_failback_abandons_after_retries() {
    let setup = Setup::new().broken();
    let directory = setup.directory(&[("failback.interval", "20"), ("retries", "2")]);
    let cluster = ClusterInvoker::new(directory, Failback::default());

    assert!(cluster.invoke(greet()).await.is_err());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(setup.calls(), 3);
    assert_eq!(cluster.strategy().pending(), 0);
}

#[tokio::test]
async fn test_failback_drops_oldest_when_full() {
    let setup = Setup::new().broken();
    let directory = setup.directory(&[("failback.interval", "60000"), ("failbacktasks", "2")]);
    let cluster = ClusterInvoker::new(directory, Failback::default());

    for _ in 0..5 {
        assert!(cluster.invoke(greet()).await.is_err());
    }
    assert_eq!(cluster.strategy().pending(), 2);
    cluster.destroy();
    assert_eq!(cluster.strategy().pending(), 0);
}

#[tokio::test]
async fn test_failback_requeue_respects_capacity() {
    let setup = Setup::new().provider(usize::MAX, 50, FailureKind::Network);
    let directory = setup.directory(&[
        ("failback.interval", "300"),
        ("failbacktasks", "2"),
        ("retries", "100"),
    ]);
    let cluster = ClusterInvoker::new(directory, Failback::default());

    for _ in 0..2 {
        assert!(cluster.invoke(greet()).await.is_err());
    }
    // new failures land while the first retry pass re-queues its tasks
    tokio::time::sleep(Duration::from_millis(260)).await;
    for _ in 0..2 {
        assert!(cluster.invoke(greet()).await.is_err());
    }
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(cluster.strategy().pending() <= 2, "{}", cluster.strategy().pending());
    cluster.destroy();
}

#[tokio::test]
async fn test_failback_stops_when_destroyed() {
    let setup = Setup::new().broken();
    let directory = setup.directory(&[("failback.interval", "20"), ("retries", "100")]);
    let cluster = ClusterInvoker::new(directory, Failback::default());

    assert!(cluster.invoke(greet()).await.is_err());
    cluster.destroy();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(setup.calls(), 1);
    assert_eq!(failure(&cluster.invoke(greet()).await).kind, FailureKind::Destroyed);
}

#[tokio::test]
async fn test_forking_returns_the_fastest_answer() {
    let setup = Setup::new()
        .provider(0, 50, FailureKind::Network)
        .provider(0, 10, FailureKind::Network);
    let result = setup.join(&[("cluster", "forking"), ("forks", "2")]).invoke(greet()).await;
    assert_eq!(result.value(), Some(&json!(20881)));
}

#[tokio::test]
async fn test_forking_latency_follows_the_fastest() {
    let setup = Setup::new()
        .provider(0, 600, FailureKind::Network)
        .provider(0, 10, FailureKind::Network);
    let cluster = setup.join(&[("cluster", "forking"), ("forks", "2"), ("timeout", "5000")]);

    let started = Instant::now();
    let result = cluster.invoke(greet()).await;
    assert!(result.is_ok());
    assert!(started.elapsed() < Duration::from_millis(400), "{:?}", started.elapsed());
}

#[tokio::test]
async fn test_forking_skips_failed_forks_and_times_out() {
    let setup = Setup::new()
        .provider(usize::MAX, 0, FailureKind::Network)
        .provider(0, 20, FailureKind::Network);
    let result = setup.join(&[("cluster", "forking"), ("forks", "0")]).invoke(greet()).await;
    assert_eq!(result.value(), Some(&json!(20881)));

    let setup = Setup::new()
        .provider(0, 1000, FailureKind::Network)
        .provider(0, 1000, FailureKind::Network);
    let started = Instant::now();
    let result = setup
        .join(&[("cluster", "forking"), ("timeout", "50")])
        .invoke(greet())
        .await;
    assert_eq!(failure(&result).kind, FailureKind::Timeout);
    assert!(started.elapsed() < Duration::from_millis(800));
}

#[tokio::test]
async fn test_broadcast_succeeds_when_any_provider_does() {
    let setup = Setup::new().healthy().broken().healthy();
    let result = setup.join(&[("cluster", "broadcast")]).invoke(greet()).await;
    assert!(result.is_ok());
    assert_eq!(setup.calls(), 3);
    assert_eq!(
        setup.order(),
        vec!["127.0.0.1:20880", "127.0.0.1:20881", "127.0.0.1:20882"]
    );
}

#[tokio::test]
async fn test_broadcast_fails_when_every_provider_does() {
    let setup = Setup::new().broken().broken().broken();
    let result = setup.join(&[("cluster", "broadcast")]).invoke(greet()).await;
    let failure = failure(&result);
    assert!(failure.message.contains("127.0.0.1:20882"));
    assert_eq!(setup.calls(), 3);
}

#[tokio::test]
async fn test_cluster_by_name() {
    let clusters = ClusterDirectory::new();
    let mut names = clusters.names();
    names.sort();
    assert_eq!(
        names,
        vec!["broadcast", "failback", "failfast", "failover", "failsafe", "forking"]
    );

    let setup = Setup::new().healthy();
    let err = clusters
        .join(setup.directory(&[("cluster", "mergeable")]))
        .unwrap_err();
    assert!(matches!(err, RpcError::UnsupportedExtension { .. }));

    let result = setup
        .join(&[("loadbalance", "leastactive")])
        .invoke(greet())
        .await;
    assert!(matches!(result.error(), Some(RpcError::UnsupportedExtension { .. })));
}

#[tokio::test]
async fn test_destroy_reaches_providers() {
    let setup = Setup::new().healthy().healthy();
    let cluster = setup.join(&[]);
    assert!(cluster.is_available());

    cluster.destroy();
    assert!(cluster.is_destroyed());
    assert!(setup.providers.iter().all(|provider| provider.is_destroyed()));
    assert_eq!(failure(&cluster.invoke(greet()).await).kind, FailureKind::Destroyed);
}

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

use std::{sync::Arc, time::Duration};

use dubbo_base::Url;
use dubbo_protocol_jsonrpc::JsonRpcProtocol;
use dubbo_rpc::{
    FailureKind, GenericProxy, Protocol, ProxyFactory, RpcContext, RpcError, ServiceDescriptor,
};
use dubbo_threadpool::ThreadPoolGuard;
use dubbo_utils::host_util::scan_free_port;
use serde_json::json;

struct Echo;

fn descriptor() -> ServiceDescriptor<Echo> {
    ServiceDescriptor::new("demo.Echo")
        .method("echo", &["string"], |_, (message,): (String,)| async move {
            Ok::<_, String>(message)
        })
        .method("whoami", &[], |_, (): ()| async move {
            Ok::<_, String>(RpcContext::remote_address().map(|address| address.ip().to_string()))
        })
        .method("sleep", &["long"], |_, (millis,): (u64,)| async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok::<_, String>(millis)
        })
}

fn protocol() -> JsonRpcProtocol {
    JsonRpcProtocol::new(Arc::new(ThreadPoolGuard::new()))
}

fn provider_url(port: u16) -> Url {
    Url::new("jsonrpc", "127.0.0.1", port, "demo.Echo").with("threads", "8")
}

async fn export(protocol: &JsonRpcProtocol, url: &Url) -> Result<dubbo_rpc::BoxExporter, RpcError> {
    let invoker = ProxyFactory::new().get_invoker(Arc::new(Echo), descriptor(), url.clone());
    protocol.export(invoker).await
}

async fn generic(protocol: &JsonRpcProtocol, url: Url) -> Result<GenericProxy, RpcError> {
    let invoker = protocol.refer("demo.Echo", url).await?;
    ProxyFactory::new().get_proxy(invoker)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_round_trip_exposes_remote_address() {
    let protocol = protocol();
    let url = provider_url(scan_free_port(28100));
    let _exporter = export(&protocol, &url).await.unwrap();

    let proxy = generic(&protocol, url).await.unwrap();
    let value = proxy.invoke("echo", &["string"], vec![json!("hello")]).await.unwrap();
    assert_eq!(value, json!("hello"));
    let value = proxy.invoke("whoami", &[], vec![]).await.unwrap();
    assert_eq!(value, json!("127.0.0.1"));

    let err = proxy.invoke("missing", &[], vec![]).await.unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::Dispatch));
    protocol.destroy();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_export_twice_shares_listener() {
    let protocol = protocol();
    let port = scan_free_port(28200);
    let url = provider_url(port);
    let first = export(&protocol, &url).await.unwrap();
    let second = export(&protocol, &url).await.unwrap();
    assert_eq!(protocol.server_count(), 1);

    let proxy = generic(&protocol, url.clone()).await.unwrap();
    first.unexport();
    assert!(first.is_unexported());
    assert!(!second.is_unexported());
    let value = proxy.invoke("echo", &["string"], vec![json!("still")]).await.unwrap();
    assert_eq!(value, json!("still"));

    second.unexport();
    assert_eq!(protocol.server_count(), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let err = proxy.invoke("echo", &["string"], vec![json!("gone")]).await.unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::Network));

    let _again = export(&protocol, &url).await.unwrap();
    let value = proxy.invoke("echo", &["string"], vec![json!("back")]).await.unwrap();
    assert_eq!(value, json!("back"));
    protocol.destroy();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_check_false_connects_on_use() {
    let protocol = protocol();
    let url = provider_url(scan_free_port(28300));

    let err = generic(&protocol, url.clone()).await.unwrap_err();
    assert!(matches!(err, RpcError::Refer { .. }));

    let proxy = generic(&protocol, url.with("check", "false")).await.unwrap();
    let err = proxy.invoke("echo", &["string"], vec![json!("early")]).await.unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::Network));

    let _exporter = export(&protocol, &url).await.unwrap();
    let value = proxy.invoke("echo", &["string"], vec![json!("late")]).await.unwrap();
    assert_eq!(value, json!("late"));
    protocol.destroy();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_port_in_use_is_bind_error() {
    let port = scan_free_port(28400);
    let _occupied = std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    let err = export(&protocol(), &provider_url(port)).await.unwrap_err();
    assert!(matches!(err, RpcError::Bind { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_leaves_connection_usable() {
    let protocol = protocol();
    let url = provider_url(scan_free_port(28500));
    let _exporter = export(&protocol, &url).await.unwrap();

    let proxy = generic(&protocol, url.with("timeout", "100")).await.unwrap();
    let err = proxy.invoke("sleep", &["long"], vec![json!(1000)]).await.unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::Timeout));
    let value = proxy.invoke("sleep", &["long"], vec![json!(1)]).await.unwrap();
    assert_eq!(value, json!(1));
    protocol.destroy();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_saturated_pool_answers_overloaded() {
    let dump = tempfile::tempdir().unwrap();
    let guard = Arc::new(ThreadPoolGuard::new());
    let protocol = JsonRpcProtocol::new(guard.clone());
    let url = Url::new("jsonrpc", "127.0.0.1", scan_free_port(28600), "demo.Echo")
        .with("threads", "1")
        .with("dump.directory", &dump.path().to_string_lossy());
    let _exporter = export(&protocol, &url).await.unwrap();

    let proxy = generic(&protocol, url.with("timeout", "3000")).await.unwrap();
    let busy = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.invoke("sleep", &["long"], vec![json!(500)]).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;

    let err = proxy.invoke("echo", &["string"], vec![json!("x")]).await.unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::Overloaded));
    assert!(busy.await.unwrap().is_ok());
    assert_eq!(guard.warnings(), 1);
    protocol.destroy();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_destroy_is_repeatable_and_reusable() {
    let protocol = protocol();
    let url = provider_url(scan_free_port(28700));
    let exporter = export(&protocol, &url).await.unwrap();
    let proxy = generic(&protocol, url.clone()).await.unwrap();

    protocol.destroy();
    protocol.destroy();
    assert!(exporter.is_unexported());
    let err = proxy.invoke("echo", &["string"], vec![json!("x")]).await.unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::Destroyed));

    let _exporter = export(&protocol, &url).await.unwrap();
    let proxy = generic(&protocol, url).await.unwrap();
    let value = proxy.invoke("echo", &["string"], vec![json!("again")]).await.unwrap();
    assert_eq!(value, json!("again"));
    protocol.destroy();
}

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

use dubbo_base::Url;
use dubbo_rpc::{
    lift_error, FailureKind, GenericProxy, Proxy, ProxyFactory, ProtocolDirectory, RpcContext,
    RpcError, ServiceDescriptor, ServiceProxy,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    owner: String,
    balance: i64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
enum BankError {
    Insufficient { missing: i64 },
    Rpc(String),
}

impl std::fmt::Display for BankError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<RpcError> for BankError {
    fn from(err: RpcError) -> Self {
        BankError::Rpc(err.to_string())
    }
}

#[derive(Default)]
struct Bank {
    calls: AtomicUsize,
}

impl Bank {
    async fn withdraw(&self, account: Account, amount: i64) -> Result<Account, BankError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if account.balance < amount {
            return Err(BankError::Insufficient {
                missing: amount - account.balance,
            });
        }
        Ok(Account {
            balance: account.balance - amount,
            ..account
        })
    }

    async fn whoami(&self) -> Result<Option<String>, BankError> {
        Ok(RpcContext::attachment("user"))
    }

    async fn slow(&self, millis: u64) -> Result<u64, BankError> {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(millis)
    }
}

fn descriptor() -> ServiceDescriptor<Bank> {
    ServiceDescriptor::new("demo.Bank")
        .method(
            "withdraw",
            &["demo.Account", "long"],
            |bank: Arc<Bank>, (account, amount): (Account, i64)| async move {
                bank.withdraw(account, amount).await
            },
        )
        .method("whoami", &[], |bank: Arc<Bank>, (): ()| async move {
            bank.whoami().await
        })
        .method("slow", &["long"], |bank: Arc<Bank>, (millis,): (u64,)| async move {
            bank.slow(millis).await
        })
}

struct BankProxy {
    proxy: Proxy,
}

impl ServiceProxy for BankProxy {
    fn from_proxy(proxy: Proxy) -> Self {
        BankProxy { proxy }
    }
}

impl BankProxy {
    async fn withdraw(&self, account: Account, amount: i64) -> Result<Account, BankError> {
        self.proxy
            .call("withdraw", &["demo.Account", "long"], (account, amount))
            .await
            .map_err(lift_error)
    }
}

fn provider_url() -> Url {
    Url::new("injvm", "127.0.0.1", 0, "demo.Bank")
}

#[tokio::test]
async fn test_proxy_invoker_round_trip() {
    let bank = Arc::new(Bank::default());
    let factory = ProxyFactory::new();
    let invoker = factory.get_invoker(bank.clone(), descriptor(), provider_url());
    let proxy: BankProxy = factory.get_proxy(invoker).unwrap();

    let account = Account {
        owner: "alice".to_string(),
        balance: 100,
    };
    let after = proxy.withdraw(account.clone(), 30).await.unwrap();
    assert_eq!(after, Account { balance: 70, ..account.clone() });

    let err = proxy.withdraw(account, 130).await.unwrap_err();
    assert_eq!(err, BankError::Insufficient { missing: 30 });
    assert_eq!(bank.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_injvm_export_refer_through_directory() {
    let protocols = ProtocolDirectory::new();
    let factory = ProxyFactory::new();
    let bank = Arc::new(Bank::default());

    let first = protocols
        .export(factory.get_invoker(bank.clone(), descriptor(), provider_url()))
        .await
        .unwrap();
    let second = protocols
        .export(factory.get_invoker(bank.clone(), descriptor(), provider_url()))
        .await
        .unwrap();

    let invoker = protocols.refer("demo.Bank", provider_url()).await.unwrap();
    let proxy: BankProxy = factory.get_proxy(invoker).unwrap();
    let account = Account {
        owner: "bob".to_string(),
        balance: 10,
    };

    first.unexport();
    assert_eq!(proxy.withdraw(account.clone(), 5).await.unwrap().balance, 5);

    second.unexport();
    let err = proxy.withdraw(account, 5).await.unwrap_err();
    assert!(matches!(err, BankError::Rpc(message) if message.contains("no injvm provider")));
}

#[tokio::test]
async fn test_check_controls_refer_failure() {
    let protocols = ProtocolDirectory::new();
    let err = protocols.refer("demo.Bank", provider_url()).await.unwrap_err();
    assert!(matches!(err, RpcError::Refer { .. }));

    let lazy = protocols
        .refer("demo.Bank", provider_url().with("check", "false"))
        .await
        .unwrap();
    let _exporter = protocols
        .export(ProxyFactory::new().get_invoker(Arc::new(Bank::default()), descriptor(), provider_url()))
        .await
        .unwrap();
    let generic: GenericProxy = ProxyFactory::new().get_proxy(lazy).unwrap();
    let value = generic.invoke("slow", &["long"], vec![json!(1)]).await.unwrap();
    assert_eq!(value, json!(1));
}

#[tokio::test]
async fn test_unknown_scheme_is_unsupported() {
    let protocols = ProtocolDirectory::new();
    let url = Url::new("carrier-pigeon", "127.0.0.1", 0, "demo.Bank");
    let err = protocols.refer("demo.Bank", url).await.unwrap_err();
    assert_eq!(err, RpcError::UnsupportedProtocol("carrier-pigeon".to_string()));
}

#[tokio::test]
async fn test_attachments_reach_provider_context() {
    let protocols = ProtocolDirectory::new();
    let _exporter = protocols
        .export(ProxyFactory::new().get_invoker(Arc::new(Bank::default()), descriptor(), provider_url()))
        .await
        .unwrap();
    let invoker = protocols.refer("demo.Bank", provider_url()).await.unwrap();
    let invocation = dubbo_rpc::RpcInvocation::new("demo.Bank", "whoami").with_attachment("user", "carol");
    let result = invoker.invoke(Arc::new(invocation)).await;
    assert_eq!(result.value(), Some(&json!("carol")));
}

#[tokio::test]
async fn test_refer_bounds_call_by_timeout() {
    let protocols = ProtocolDirectory::new();
    let _exporter = protocols
        .export(ProxyFactory::new().get_invoker(Arc::new(Bank::default()), descriptor(), provider_url()))
        .await
        .unwrap();
    let invoker = protocols
        .refer("demo.Bank", provider_url().with("timeout", "50"))
        .await
        .unwrap();
    let generic: GenericProxy = ProxyFactory::new().get_proxy(invoker).unwrap();

    let start = Instant::now();
    let err = generic.invoke("slow", &["long"], vec![json!(2000)]).await.unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::Timeout));
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn test_generic_reference_backs_only_generic_proxy() {
    let protocols = ProtocolDirectory::new();
    let factory = ProxyFactory::new();
    let _exporter = protocols
        .export(factory.get_invoker(Arc::new(Bank::default()), descriptor(), provider_url()))
        .await
        .unwrap();
    let generic_url = provider_url().with("generic", "true");

    let invoker = protocols.refer("demo.Bank", generic_url.clone()).await.unwrap();
    let Err(err) = factory.get_proxy::<BankProxy>(invoker) else {
        panic!("a typed proxy over a generic reference");
    };
    assert!(matches!(err, RpcError::Refer { .. }), "{:?}", err);

    let invoker = protocols.refer("demo.Bank", generic_url).await.unwrap();
    let generic: GenericProxy = factory.get_proxy(invoker).unwrap();
    let value = generic.invoke("slow", &["long"], vec![json!(1)]).await.unwrap();
    assert_eq!(value, json!(1));
}

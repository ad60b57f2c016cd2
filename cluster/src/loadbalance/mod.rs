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

use std::{fmt::Debug, sync::Arc};

use dubbo_base::{
    constants::{DEFAULT_LOADBALANCE, DEFAULT_WEIGHT, LOADBALANCE_KEY, WEIGHT_KEY},
    ExtensionDirectory, Url,
};
use dubbo_rpc::{BoxInvoker, RpcError, RpcInvocation};
use once_cell::sync::Lazy;

pub mod random;
pub mod round_robin;

pub use random::RandomLoadBalance;
pub use round_robin::RoundRobinLoadBalance;

/// Picks one invoker among candidates.
pub trait LoadBalance: Debug + Send + Sync {
    /// `url` is the consumer url; weights come from each invoker's own url.
    fn select(&self, invokers: &[BoxInvoker], url: &Url, invocation: &RpcInvocation) -> Option<BoxInvoker>;
}

pub type BoxLoadBalance = Arc<dyn LoadBalance>;

pub static LOAD_BALANCE_EXTENSIONS: Lazy<ExtensionDirectory<dyn LoadBalance>> = Lazy::new(|| {
    let extensions = ExtensionDirectory::new("loadbalance");
    extensions.register(random::NAME, || Arc::new(RandomLoadBalance) as BoxLoadBalance);
    extensions.register(round_robin::NAME, || {
        Arc::new(RoundRobinLoadBalance::default()) as BoxLoadBalance
    });
    extensions
});

/// The load balance `url` names for the invoked method, `random` by default.
pub fn load_balance(url: &Url, invocation: &RpcInvocation) -> Result<BoxLoadBalance, RpcError> {
    let name = url.method_parameter(invocation.method_name(), LOADBALANCE_KEY, DEFAULT_LOADBALANCE);
    Ok(LOAD_BALANCE_EXTENSIONS.load(&name)?)
}

/// Largest weight honoured, keeps weight sums of any invoker list within `i64`.
pub const MAX_WEIGHT: i64 = i32::MAX as i64;

/// Weight of `invoker` for `method`, clamped to `0..=MAX_WEIGHT`.
pub(crate) fn weight(invoker: &BoxInvoker, method: &str) -> u64 {
    invoker
        .get_url()
        .method_parameter_as(method, WEIGHT_KEY, DEFAULT_WEIGHT as i64)
        .clamp(0, MAX_WEIGHT) as u64
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use dubbo_base::{Node, Url};
    use dubbo_rpc::{BaseInvoker, BoxInvoker, Invoker, RpcInvocation, RpcResult};
    use serde_json::json;

    #[derive(Debug)]
    pub(crate) struct Fixed {
        base: BaseInvoker,
    }

    impl Node for Fixed {
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
    impl Invoker for Fixed {
        async fn invoke(&self, _invocation: Arc<RpcInvocation>) -> RpcResult {
            RpcResult::ok(json!(self.base.url().port()))
        }
    }

    pub(crate) fn invokers(weights: &[u64]) -> Vec<BoxInvoker> {
        weights
            .iter()
            .enumerate()
            .map(|(i, weight)| {
                let url = Url::new("mock", "127.0.0.1", 20000 + i as u16, "demo.Greeter")
                    .with("weight", &weight.to_string());
                Arc::new(Fixed {
                    base: BaseInvoker::new(url),
                }) as BoxInvoker
            })
            .collect()
    }

    #[test]
    fn test_oversized_weights_are_clamped() {
        let invokers = invokers(&[i64::MAX as u64, i64::MAX as u64, i64::MAX as u64 - 1]);
        let method = "greet";
        for invoker in &invokers {
            assert_eq!(super::weight(invoker, method), super::MAX_WEIGHT as u64);
        }
        let url = Url::new("consumer", "127.0.0.1", 0, "demo.Greeter");
        let invocation = RpcInvocation::new("demo.Greeter", method);
        for name in ["random", "roundrobin"] {
            let balance = super::load_balance(&url.with("loadbalance", name), &invocation).unwrap();
            for _ in 0..10 {
                assert!(balance.select(&invokers, &url, &invocation).is_some());
            }
        }
    }

    #[test]
    fn test_load_balance_by_name() {
        let url = Url::new("consumer", "127.0.0.1", 0, "demo.Greeter");
        let invocation = RpcInvocation::new("demo.Greeter", "greet");
        assert!(super::load_balance(&url, &invocation).is_ok());
        assert!(super::load_balance(&url.with("greet.loadbalance", "roundrobin"), &invocation).is_ok());
        assert!(super::load_balance(&url.with("loadbalance", "leastactive"), &invocation).is_err());
    }
}

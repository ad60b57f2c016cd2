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

use async_trait::async_trait;
use dubbo_base::{
    constants::{DEFAULT_TIMEOUT, TIMEOUT_KEY},
    Node, Url,
};

use crate::{
    error::InvocationFailure,
    invocation::RpcInvocation,
    invoker::{BoxInvoker, Invoker},
    result::RpcResult,
};

/// Timeout of one call: the `timeout` attachment, else `<method>.timeout`, else `timeout`
/// on the url, in milliseconds.
pub fn call_timeout(url: &Url, invocation: &RpcInvocation) -> Duration {
    let millis = invocation
        .get_attachment(TIMEOUT_KEY)
        .and_then(|timeout| timeout.trim().parse::<u64>().ok())
        .filter(|timeout| *timeout > 0)
        .unwrap_or_else(|| {
            url.method_parameter_as(invocation.method_name(), TIMEOUT_KEY, DEFAULT_TIMEOUT)
        });
    Duration::from_millis(millis)
}

/// Bounds every call of the wrapped invoker by [`call_timeout`]; a late call is dropped.
#[derive(Debug)]
pub struct TimeoutInvoker {
    inner: BoxInvoker,
}

impl TimeoutInvoker {
    pub fn new(inner: BoxInvoker) -> Self {
        TimeoutInvoker { inner }
    }
}

impl Node for TimeoutInvoker {
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
impl Invoker for TimeoutInvoker {
    fn interface(&self) -> String {
        self.inner.interface()
    }

    async fn invoke(&self, invocation: Arc<RpcInvocation>) -> RpcResult {
        let url = self.inner.get_url();
        let timeout = call_timeout(&url, &invocation);
        match tokio::time::timeout(timeout, self.inner.invoke(invocation.clone())).await {
            Ok(result) => result,
            Err(_) => RpcResult::err(InvocationFailure::timeout(format!(
                "invoke {}.{} on {} timed out after {}ms",
                invocation.service_name(),
                invocation.method_name(),
                url.address(),
                timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_timeout_precedence() {
        let url = Url::new("injvm", "127.0.0.1", 0, "demo.Greeter")
            .with("timeout", "300")
            .with("slow.timeout", "5000");
        let fast = RpcInvocation::new("demo.Greeter", "fast");
        let slow = RpcInvocation::new("demo.Greeter", "slow");
        assert_eq!(call_timeout(&url, &fast), Duration::from_millis(300));
        assert_eq!(call_timeout(&url, &slow), Duration::from_millis(5000));
        assert_eq!(
            call_timeout(&url, &slow.with_attachment("timeout", "20")),
            Duration::from_millis(20)
        );
        let bare = Url::new("injvm", "127.0.0.1", 0, "demo.Greeter");
        assert_eq!(call_timeout(&bare, &fast), Duration::from_millis(DEFAULT_TIMEOUT));
    }
}

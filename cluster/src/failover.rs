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

use std::sync::Arc;

use async_trait::async_trait;
use dubbo_base::{
    constants::{DEFAULT_RETRIES, RETRIES_KEY},
    Url,
};
use dubbo_base::Node;
use dubbo_logger::tracing::{debug, warn};
use dubbo_rpc::{BoxInvoker, RpcInvocation, RpcResult};

use crate::{
    loadbalance::BoxLoadBalance,
    support::{ClusterStrategy, ClusterSupport},
};

pub const NAME: &str = "failover";

/// Retries a failed call on other invokers, `retries` more times.
#[derive(Debug, Default)]
pub struct Failover;

/// Attempts for one call: the configured retries plus the first try.
fn attempts(url: &Url, invocation: &RpcInvocation) -> usize {
    let retries: i64 = url.method_parameter_as(
        invocation.method_name(),
        RETRIES_KEY,
        DEFAULT_RETRIES as i64,
    );
    usize::try_from(retries.max(0)).unwrap_or(usize::MAX).saturating_add(1)
}

#[async_trait]
impl ClusterStrategy for Failover {
    async fn do_invoke(
        &self,
        support: &ClusterSupport,
        invocation: Arc<RpcInvocation>,
        mut invokers: Vec<BoxInvoker>,
        load_balance: BoxLoadBalance,
    ) -> RpcResult {
        let attempts = attempts(&support.url(), &invocation);
        // grown per try, `attempts` may be arbitrarily large
        let mut selected: Vec<BoxInvoker> = Vec::new();
        let mut endpoints = Vec::new();
        let mut last = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                if support.is_destroyed() {
                    return support.destroyed_failure();
                }
                invokers = support.list(&invocation);
            }
            let Some(invoker) = support.select(&load_balance, &invocation, &invokers, &selected) else {
                break;
            };
            let address = invoker.get_url().address();
            debug!(
                "failover attempt {} of {} for {} on {}",
                attempt + 1,
                attempts,
                invocation.method_name(),
                address
            );
            selected.push(invoker.clone());
            endpoints.push(address.clone());

            let result = invoker.invoke(invocation.clone()).await;
            match result.error() {
                None => {
                    if attempt > 0 {
                        warn!(
                            "{}.{} succeeded on {} after {} failed attempts",
                            support.url().service_key(),
                            invocation.method_name(),
                            address,
                            attempt
                        );
                    }
                    return result;
                }
                Some(err) if !err.is_retryable() => return result,
                Some(err) => {
                    warn!("{}.{} failed on {}: {}", support.url().service_key(), invocation.method_name(), address, err);
                    last = Some(result);
                }
            }
        }

        match last {
            Some(result) => match result.into_outcome() {
                Err(err) => RpcResult::err(err.into_failure().with_endpoints(endpoints)),
                Ok(value) => RpcResult::ok(value),
            },
            None => support.no_provider(&invocation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts() {
        let url = Url::new("consumer", "127.0.0.1", 0, "demo.Greeter");
        let invocation = RpcInvocation::new("demo.Greeter", "greet");
        assert_eq!(attempts(&url, &invocation), 3);
        assert_eq!(attempts(&url.with("retries", "0"), &invocation), 1);
        assert_eq!(attempts(&url.with("retries", "-4"), &invocation), 1);
        assert_eq!(attempts(&url.with("greet.retries", "5"), &invocation), 6);
        assert!(attempts(&url.with("retries", &i64::MAX.to_string()), &invocation) >= u32::MAX as usize);
    }
}

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
use dubbo_base::constants::{DEFAULT_FORKS, FORKS_KEY};
use dubbo_logger::tracing::{debug, warn};
use dubbo_rpc::{call_timeout, BoxInvoker, InvocationFailure, RpcInvocation, RpcResult};
use tokio::task::JoinSet;

use crate::{
    loadbalance::BoxLoadBalance,
    support::{same_invoker, ClusterStrategy, ClusterSupport},
};

pub const NAME: &str = "forking";

/// Calls `forks` distinct invokers at once and returns the first answer.
///
/// Calls still running when the winner arrives, or when the call times out, are aborted.
#[derive(Debug, Default)]
pub struct Forking;

impl Forking {
    fn fork_targets(
        support: &ClusterSupport,
        invocation: &RpcInvocation,
        invokers: &[BoxInvoker],
        load_balance: &BoxLoadBalance,
    ) -> Vec<BoxInvoker> {
        let forks: i64 = support.url().method_parameter_as(
            invocation.method_name(),
            FORKS_KEY,
            DEFAULT_FORKS as i64,
        );
        if forks <= 0 || forks as usize >= invokers.len() {
            return invokers.to_vec();
        }
        let mut selected: Vec<BoxInvoker> = Vec::with_capacity(forks as usize);
        while selected.len() < forks as usize {
            match support.select(load_balance, invocation, invokers, &selected) {
                Some(invoker) if !selected.iter().any(|picked| same_invoker(picked, &invoker)) => {
                    selected.push(invoker)
                }
                _ => break,
            }
        }
        selected
    }
}

#[async_trait]
impl ClusterStrategy for Forking {
    async fn do_invoke(
        &self,
        support: &ClusterSupport,
        invocation: Arc<RpcInvocation>,
        invokers: Vec<BoxInvoker>,
        load_balance: BoxLoadBalance,
    ) -> RpcResult {
        let targets = Self::fork_targets(support, &invocation, &invokers, &load_balance);
        if targets.is_empty() {
            return support.no_provider(&invocation);
        }
        debug!("forking {} to {} invokers", invocation.method_name(), targets.len());

        let mut calls = JoinSet::new();
        for invoker in targets {
            let invocation = invocation.clone();
            calls.spawn(async move { invoker.invoke(invocation).await });
        }
        let first_answer = async {
            let mut last = None;
            while let Some(joined) = calls.join_next().await {
                match joined {
                    Ok(result) => {
                        let settled = result.error().map_or(true, |err| !err.is_retryable());
                        if settled {
                            return result;
                        }
                        last = Some(result);
                    }
                    Err(err) => warn!("forked call of {} did not finish: {}", invocation.method_name(), err),
                }
            }
            last.unwrap_or_else(|| support.no_provider(&invocation))
        };

        let timeout = call_timeout(&support.url(), &invocation);
        match tokio::time::timeout(timeout, first_answer).await {
            Ok(result) => result,
            Err(_) => RpcResult::err(InvocationFailure::timeout(format!(
                "forked calls of {}.{} did not answer within {}ms",
                support.url().service_key(),
                invocation.method_name(),
                timeout.as_millis()
            ))),
        }
    }
}

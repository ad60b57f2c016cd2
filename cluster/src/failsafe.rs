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
use dubbo_logger::tracing::error;
use dubbo_rpc::{BoxInvoker, RpcInvocation, RpcResult};
use serde_json::Value;

use crate::{
    loadbalance::BoxLoadBalance,
    support::{ClusterStrategy, ClusterSupport},
};

pub const NAME: &str = "failsafe";

/// One attempt; a failure is logged and the caller gets an empty success.
#[derive(Debug, Default)]
pub struct Failsafe;

#[async_trait]
impl ClusterStrategy for Failsafe {
    async fn do_invoke(
        &self,
        support: &ClusterSupport,
        invocation: Arc<RpcInvocation>,
        invokers: Vec<BoxInvoker>,
        load_balance: BoxLoadBalance,
    ) -> RpcResult {
        let result = match support.select(&load_balance, &invocation, &invokers, &[]) {
            Some(invoker) => invoker.invoke(invocation.clone()).await,
            None => support.no_provider(&invocation),
        };
        match result.error() {
            None => result,
            Some(err) => {
                error!(
                    "failsafe ignored failure of {}.{}: {}",
                    support.url().service_key(),
                    invocation.method_name(),
                    err
                );
                RpcResult::ok(Value::Null)
            }
        }
    }
}

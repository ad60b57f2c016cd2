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
use dubbo_rpc::{BoxInvoker, RpcInvocation, RpcResult};

use crate::{
    loadbalance::BoxLoadBalance,
    support::{ClusterStrategy, ClusterSupport},
};

pub const NAME: &str = "failfast";

/// One attempt; a failure goes straight back to the caller.
#[derive(Debug, Default)]
pub struct Failfast;

#[async_trait]
impl ClusterStrategy for Failfast {
    async fn do_invoke(
        &self,
        support: &ClusterSupport,
        invocation: Arc<RpcInvocation>,
        invokers: Vec<BoxInvoker>,
        load_balance: BoxLoadBalance,
    ) -> RpcResult {
        match support.select(&load_balance, &invocation, &invokers, &[]) {
            Some(invoker) => invoker.invoke(invocation).await,
            None => support.no_provider(&invocation),
        }
    }
}

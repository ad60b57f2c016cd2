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
use dubbo_base::Node;
use dubbo_logger::tracing::warn;
use dubbo_rpc::{BoxInvoker, RpcInvocation, RpcResult};

use crate::{
    loadbalance::BoxLoadBalance,
    support::{ClusterStrategy, ClusterSupport},
};

pub const NAME: &str = "broadcast";

/// Calls every invoker in list order. The call succeeds when any of them did,
/// with the last success; otherwise the last failure is returned.
#[derive(Debug, Default)]
pub struct Broadcast;

#[async_trait]
impl ClusterStrategy for Broadcast {
    async fn do_invoke(
        &self,
        support: &ClusterSupport,
        invocation: Arc<RpcInvocation>,
        invokers: Vec<BoxInvoker>,
        _load_balance: BoxLoadBalance,
    ) -> RpcResult {
        if invokers.is_empty() {
            return support.no_provider(&invocation);
        }
        let mut succeeded = None;
        let mut failed = None;
        for invoker in invokers {
            let result = invoker.invoke(invocation.clone()).await;
            match result.error() {
                None => succeeded = Some(result),
                Some(err) => {
                    warn!(
                        "broadcast of {} to {} failed: {}",
                        invocation.method_name(),
                        invoker.get_url().address(),
                        err
                    );
                    failed = Some(result);
                }
            }
        }
        succeeded
            .or(failed)
            .unwrap_or_else(|| support.no_provider(&invocation))
    }
}

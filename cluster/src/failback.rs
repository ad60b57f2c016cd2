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

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use dubbo_base::{
    constants::{
        DEFAULT_FAILBACK_INTERVAL, DEFAULT_FAILBACK_RETRIES, DEFAULT_FAILBACK_TASKS,
        FAIL_BACK_INTERVAL_KEY, FAIL_BACK_TASKS_KEY, RETRIES_KEY,
    },
    Url,
};
use dubbo_logger::tracing::{debug, error, info, warn};
use dubbo_rpc::{BoxInvoker, RpcInvocation, RpcResult};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::{
    loadbalance::BoxLoadBalance,
    support::{ClusterStrategy, ClusterSupport},
};

pub const NAME: &str = "failback";

#[derive(Debug)]
struct RetryTask {
    invocation: Arc<RpcInvocation>,
    /// Background retries left.
    remaining: usize,
}

#[derive(Debug, Default)]
struct FailbackState {
    queue: VecDeque<RetryTask>,
    worker: Option<JoinHandle<()>>,
}

/// One attempt; a failed call is queued and retried in the background every
/// `failback.interval` milliseconds, at most `retries` times, while the caller
/// gets the failure right away.
#[derive(Debug, Default)]
pub struct Failback {
    state: Arc<Mutex<FailbackState>>,
}

impl FailbackState {
    /// Queues `task`, dropping the oldest one when `capacity` is reached.
    fn push(&mut self, task: RetryTask, capacity: usize, service_key: &str) {
        while self.queue.len() >= capacity {
            let Some(dropped) = self.queue.pop_front() else {
                break;
            };
            warn!(
                "failback queue of {} is full, dropping retry of {}",
                service_key,
                dropped.invocation.method_name()
            );
        }
        self.queue.push_back(task);
    }
}

fn capacity(url: &Url) -> usize {
    url.parameter_as(FAIL_BACK_TASKS_KEY, DEFAULT_FAILBACK_TASKS).max(1)
}

impl Failback {
    /// Calls waiting for a background retry.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn enqueue(&self, support: &ClusterSupport, invocation: Arc<RpcInvocation>) {
        let url = support.url();
        let capacity = capacity(&url);
        let remaining: usize =
            url.method_parameter_as(invocation.method_name(), RETRIES_KEY, DEFAULT_FAILBACK_RETRIES);
        if remaining == 0 {
            return;
        }
        let interval = Duration::from_millis(
            url.parameter_as(FAIL_BACK_INTERVAL_KEY, DEFAULT_FAILBACK_INTERVAL).max(1),
        );

        let mut state = self.state.lock();
        state.push(RetryTask { invocation, remaining }, capacity, &url.service_key());
        if state.worker.is_none() {
            let worker = tokio::spawn(retry_loop(support.clone(), self.state.clone(), interval));
            state.worker = Some(worker);
        }
    }
}

async fn retry_loop(support: ClusterSupport, state: Arc<Mutex<FailbackState>>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let due: Vec<RetryTask> = {
            let mut state = state.lock();
            if state.queue.is_empty() {
                state.worker = None;
                return;
            }
            state.queue.drain(..).collect()
        };
        for mut task in due {
            if support.is_destroyed() {
                return;
            }
            let result = retry(&support, task.invocation.clone()).await;
            match result.error() {
                None => info!(
                    "failback retry of {}.{} succeeded",
                    support.url().service_key(),
                    task.invocation.method_name()
                ),
                Some(err) => {
                    task.remaining -= 1;
                    if task.remaining == 0 {
                        error!(
                            "giving up failback retry of {}.{}: {}",
                            support.url().service_key(),
                            task.invocation.method_name(),
                            err
                        );
                    } else {
                        debug!("failback retry of {} failed: {}", task.invocation.method_name(), err);
                        let url = support.url();
                        state.lock().push(task, capacity(&url), &url.service_key());
                    }
                }
            }
        }
    }
}

async fn retry(support: &ClusterSupport, invocation: Arc<RpcInvocation>) -> RpcResult {
    let load_balance = match support.load_balance(&invocation) {
        Ok(load_balance) => load_balance,
        Err(result) => return result,
    };
    let invokers = support.list(&invocation);
    match support.select(&load_balance, &invocation, &invokers, &[]) {
        Some(invoker) => invoker.invoke(invocation).await,
        None => support.no_provider(&invocation),
    }
}

#[async_trait]
impl ClusterStrategy for Failback {
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
        if let Some(err) = result.error() {
            if err.is_retryable() {
                warn!(
                    "{}.{} failed, retrying in the background: {}",
                    support.url().service_key(),
                    invocation.method_name(),
                    err
                );
                self.enqueue(support, invocation);
            }
        }
        result
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        state.queue.clear();
        if let Some(worker) = state.worker.take() {
            worker.abort();
        }
    }
}

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

use dubbo_base::Url;

use crate::{
    executor::{RejectedExecutionHandler, ThreadPoolExecutor},
    guard::ThreadPoolGuard,
    RejectedExecution,
};

/// Rejects like [`crate::AbortPolicy`] after reporting the saturation through the guard.
#[derive(Debug, Clone)]
pub struct AbortPolicyWithReport {
    thread_name: String,
    url: Url,
    guard: Arc<ThreadPoolGuard>,
}

impl AbortPolicyWithReport {
    pub fn new(thread_name: &str, url: Url, guard: Arc<ThreadPoolGuard>) -> Self {
        AbortPolicyWithReport {
            thread_name: thread_name.to_string(),
            url,
            guard,
        }
    }
}

impl RejectedExecutionHandler for AbortPolicyWithReport {
    fn rejected(&self, _task_label: &str, executor: &ThreadPoolExecutor) -> RejectedExecution {
        self.guard
            .report(&self.thread_name, &executor.stats(), &self.url)
    }
}

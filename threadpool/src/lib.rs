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

//! Server side execution: bounded thread pools and the process wide saturation guard.

pub mod executor;
pub mod guard;
pub mod policy;
pub mod pool;
pub mod registry;

pub use executor::{
    AbortPolicy, PoolStats, RejectedExecution, RejectedExecutionHandler, Task, ThreadPoolConfig,
    ThreadPoolExecutor,
};
pub use guard::{ThreadPoolGuard, DEFAULT_DUMP_WINDOW, DUMP_FILE_PREFIX};
pub use policy::AbortPolicyWithReport;
pub use pool::{new_thread_pool, pool_config, ThreadPoolError, ThreadPoolKind};
pub use registry::{ExecutionRegistry, WorkerSnapshot};

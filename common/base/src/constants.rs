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

pub const DUBBO: &str = "dubbo";

pub const INJVM: &str = "injvm";

pub const JSONRPC: &str = "jsonrpc";

pub const REGISTRY_PROTOCOL: &str = "registry";

pub const PROVIDER: &str = "provider";

pub const CONSUMER: &str = "consumer";

pub const SIDE_KEY: &str = "side";

pub const APPLICATION_KEY: &str = "application";

pub const INTERFACE_KEY: &str = "interface";

pub const GROUP_KEY: &str = "group";

pub const VERSION_KEY: &str = "version";

pub const METHODS_KEY: &str = "methods";

pub const PROTOCOL_KEY: &str = "protocol";

pub const USERNAME_KEY: &str = "username";

pub const PASSWORD_KEY: &str = "password";

pub const HOST_KEY: &str = "host";

pub const PORT_KEY: &str = "port";

pub const PATH_KEY: &str = "path";

pub const BACKUP_KEY: &str = "backup";

pub const ANYHOST_KEY: &str = "anyhost";

pub const ANYHOST_VALUE: &str = "0.0.0.0";

/// Host a provider binds when it differs from the host it advertises.
pub const BIND_IP_KEY: &str = "bind.ip";

pub const LOCALHOST_VALUE: &str = "127.0.0.1";

pub const NO_AVAILABLE: &str = "N/A";

pub const DEFAULT_PROTOCOL: &str = "dubbo";

pub const PID_KEY: &str = "pid";

pub const TIMESTAMP_KEY: &str = "timestamp";

pub const REGISTRY_KEY: &str = "registry";

pub const REGISTER_KEY: &str = "register";

pub const SUBSCRIBE_KEY: &str = "subscribe";

pub const CHECK_KEY: &str = "check";

pub const GENERIC_KEY: &str = "generic";

pub const TIMEOUT_KEY: &str = "timeout";

pub const DEFAULT_TIMEOUT: u64 = 1000;

pub const DUMP_DIRECTORY: &str = "dump.directory";

pub const REGISTRY_SEPARATOR: &str = "|";

pub const SEMICOLON_SEPARATOR: &str = ";";

pub const COMMA_SEPARATOR: &str = ",";

// thread pool

pub const THREADPOOL_KEY: &str = "threadpool";

pub const THREAD_NAME_KEY: &str = "threadname";

pub const THREADS_KEY: &str = "threads";

pub const CORE_THREADS_KEY: &str = "corethreads";

pub const QUEUES_KEY: &str = "queues";

pub const ALIVE_KEY: &str = "alive";

pub const DEFAULT_THREADPOOL: &str = "fixed";

pub const DEFAULT_THREAD_NAME: &str = "Dubbo";

pub const DEFAULT_THREADS: usize = 200;

pub const DEFAULT_CORE_THREADS: usize = 0;

pub const DEFAULT_QUEUES: usize = 0;

pub const DEFAULT_ALIVE: u64 = 60_000;

// cluster

pub const CLUSTER_KEY: &str = "cluster";

pub const DEFAULT_CLUSTER: &str = "failover";

pub const LOADBALANCE_KEY: &str = "loadbalance";

pub const DEFAULT_LOADBALANCE: &str = "random";

pub const RETRIES_KEY: &str = "retries";

pub const DEFAULT_RETRIES: usize = 2;

pub const FORKS_KEY: &str = "forks";

pub const DEFAULT_FORKS: usize = 2;

pub const FAIL_BACK_TASKS_KEY: &str = "failbacktasks";

pub const DEFAULT_FAILBACK_TASKS: usize = 100;

pub const FAIL_BACK_INTERVAL_KEY: &str = "failback.interval";

pub const DEFAULT_FAILBACK_INTERVAL: u64 = 5000;

pub const DEFAULT_FAILBACK_RETRIES: usize = 3;

pub const WEIGHT_KEY: &str = "weight";

pub const DEFAULT_WEIGHT: usize = 100;

/// To decide whether to exclude unavailable invoker from the cluster
pub const CLUSTER_AVAILABLE_CHECK_KEY: &str = "cluster.availablecheck";

pub const DEFAULT_CLUSTER_AVAILABLE_CHECK: bool = true;

/// To decide whether to enable sticky strategy for cluster
pub const CLUSTER_STICKY_KEY: &str = "sticky";

pub const DEFAULT_CLUSTER_STICKY: bool = false;

// generic invocation

pub const GENERIC_METHOD: &str = "$invoke";

pub const GENERIC_ASYNC_METHOD: &str = "$invokeAsync";

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

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use dubbo_base::{
    constants::{
        ALIVE_KEY, CORE_THREADS_KEY, DEFAULT_ALIVE, DEFAULT_CORE_THREADS, DEFAULT_QUEUES,
        DEFAULT_THREADPOOL, DEFAULT_THREADS, DEFAULT_THREAD_NAME, QUEUES_KEY, THREADPOOL_KEY,
        THREADS_KEY, THREAD_NAME_KEY,
    },
    Url,
};
use thiserror::Error;

use crate::{
    executor::{ThreadPoolConfig, ThreadPoolExecutor},
    guard::ThreadPoolGuard,
    policy::AbortPolicyWithReport,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadPoolError {
    #[error("unsupported thread pool: {0}")]
    UnsupportedKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPoolKind {
    /// `threads` workers, started on demand and kept forever.
    Fixed,
    /// Grows from `corethreads` to `threads`; idle workers above core exit after `alive` ms.
    Cached,
    /// Grows from `corethreads` to `threads` and never shrinks.
    Limited,
}

impl ThreadPoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadPoolKind::Fixed => "fixed",
            ThreadPoolKind::Cached => "cached",
            ThreadPoolKind::Limited => "limited",
        }
    }
}

impl fmt::Display for ThreadPoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadPoolKind {
    type Err = ThreadPoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(ThreadPoolKind::Fixed),
            "cached" => Ok(ThreadPoolKind::Cached),
            "limited" => Ok(ThreadPoolKind::Limited),
            other => Err(ThreadPoolError::UnsupportedKind(other.to_string())),
        }
    }
}

/// Sizing of the pool `url` asks for.
pub fn pool_config(url: &Url) -> Result<(ThreadPoolKind, ThreadPoolConfig), ThreadPoolError> {
    let kind: ThreadPoolKind = url
        .parameter(THREADPOOL_KEY, DEFAULT_THREADPOOL)
        .parse()?;
    let name = url.parameter(THREAD_NAME_KEY, DEFAULT_THREAD_NAME);
    let threads = url.parameter_as(THREADS_KEY, DEFAULT_THREADS);
    let cores = url.parameter_as(CORE_THREADS_KEY, DEFAULT_CORE_THREADS);
    let queues = url.parameter_as(QUEUES_KEY, DEFAULT_QUEUES);
    let alive = url.parameter_as(ALIVE_KEY, DEFAULT_ALIVE);

    let config = match kind {
        ThreadPoolKind::Fixed => ThreadPoolConfig {
            name,
            core_size: threads,
            max_size: threads,
            queue_capacity: queues,
            keep_alive: None,
        },
        ThreadPoolKind::Cached => ThreadPoolConfig {
            name,
            core_size: cores,
            max_size: threads,
            queue_capacity: queues,
            keep_alive: Some(Duration::from_millis(alive)),
        },
        ThreadPoolKind::Limited => ThreadPoolConfig {
            name,
            core_size: cores,
            max_size: threads,
            queue_capacity: queues,
            keep_alive: None,
        },
    };
    Ok((kind, config))
}

/// Builds the executor `url` describes, rejecting through [`AbortPolicyWithReport`].
pub fn new_thread_pool(
    url: &Url,
    guard: &Arc<ThreadPoolGuard>,
) -> Result<ThreadPoolExecutor, ThreadPoolError> {
    let (_, config) = pool_config(url)?;
    let handler = AbortPolicyWithReport::new(&config.name, url.clone(), guard.clone());
    Ok(ThreadPoolExecutor::new(
        config,
        Arc::new(handler),
        Some(guard.registry()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_kinds_from_url() {
        let url = Url::new("jsonrpc", "127.0.0.1", 20880, "demo.Greeter");
        let (kind, fixed) = pool_config(&url).unwrap();
        assert_eq!(kind, ThreadPoolKind::Fixed);
        assert_eq!(fixed.core_size, 200);
        assert_eq!(fixed.max_size, 200);
        assert_eq!(fixed.queue_capacity, 0);
        assert_eq!(fixed.name, "Dubbo");

        let cached = url
            .with("threadpool", "cached")
            .with("corethreads", "4")
            .with("threads", "16")
            .with("alive", "500");
        let (kind, cached) = pool_config(&cached).unwrap();
        assert_eq!(kind, ThreadPoolKind::Cached);
        assert_eq!(cached.core_size, 4);
        assert_eq!(cached.max_size, 16);
        assert_eq!(cached.keep_alive, Some(Duration::from_millis(500)));

        let (_, limited) = pool_config(&url.with("threadpool", "LIMITED")).unwrap();
        assert_eq!(limited.keep_alive, None);

        assert_eq!(
            pool_config(&url.with("threadpool", "eager")).err(),
            Some(ThreadPoolError::UnsupportedKind("eager".to_string()))
        );
    }
}

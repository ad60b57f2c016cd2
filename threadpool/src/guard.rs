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

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use chrono::Local;
use dubbo_base::{constants::DUMP_DIRECTORY, Url};
use dubbo_logger::tracing::{error, info, warn};
use dubbo_utils::path_util::home_dir;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{executor::PoolStats, registry::ExecutionRegistry, RejectedExecution};

pub const DEFAULT_DUMP_WINDOW: Duration = Duration::from_secs(10 * 60);

pub const DUMP_FILE_PREFIX: &str = "Dubbo_JStack.log";

// yyyy-MM-dd_HH-mm-ss.SSS, no ':' so the name is valid everywhere
const DUMP_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S%.3f";

/// Saturation reporting shared by every pool of a process.
///
/// Each rejection is warned about on its own. An execution snapshot is written at most
/// once per window, by a detached thread holding the single dump permit; a rejection that
/// finds the permit taken skips its snapshot.
#[derive(Debug)]
pub struct ThreadPoolGuard {
    window: Duration,
    last_dump: Mutex<Option<Instant>>,
    permit: Arc<Semaphore>,
    registry: Arc<ExecutionRegistry>,
    warnings: AtomicU64,
    snapshots: Arc<AtomicU64>,
}

impl Default for ThreadPoolGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPoolGuard {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_DUMP_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        ThreadPoolGuard {
            window,
            last_dump: Mutex::new(None),
            permit: Arc::new(Semaphore::new(1)),
            registry: Arc::new(ExecutionRegistry::new()),
            warnings: AtomicU64::new(0),
            snapshots: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn registry(&self) -> Arc<ExecutionRegistry> {
        self.registry.clone()
    }

    /// Rejections reported so far.
    pub fn warnings(&self) -> u64 {
        self.warnings.load(Ordering::SeqCst)
    }

    /// Snapshot files written so far.
    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::SeqCst)
    }

    /// Logs the saturation of `thread_name`'s pool, schedules a snapshot when allowed, and
    /// returns the rejection for the submitter.
    pub fn report(&self, thread_name: &str, stats: &PoolStats, url: &Url) -> RejectedExecution {
        let message = format!(
            "Thread pool is EXHAUSTED! Thread Name: {}, Pool Size: {} (active: {}, core: {}, max: {}, largest: {}), \
             Task: {} (completed: {}), Executor status:(isShutdown:{}, isTerminated:{}, isTerminating:{}), in {}://{}:{}!",
            thread_name,
            stats.pool_size,
            stats.active,
            stats.core_size,
            stats.max_size,
            stats.largest,
            stats.task_count,
            stats.completed,
            stats.is_shutdown,
            stats.is_terminated,
            stats.is_terminating,
            url.scheme(),
            url.host(),
            url.port()
        );
        warn!(
            thread_name,
            pool_size = stats.pool_size,
            active = stats.active,
            core = stats.core_size,
            max = stats.max_size,
            largest = stats.largest,
            task_count = stats.task_count,
            completed = stats.completed,
            shutdown = stats.is_shutdown,
            terminated = stats.is_terminated,
            terminating = stats.is_terminating,
            address = %url.short_url(),
            "{}",
            message
        );
        self.warnings.fetch_add(1, Ordering::SeqCst);
        self.dump(url);
        RejectedExecution::new(message)
    }

    fn dump(&self, url: &Url) {
        let Ok(permit) = self.permit.clone().try_acquire_owned() else {
            return;
        };
        {
            let mut last_dump = self.last_dump.lock();
            if let Some(at) = *last_dump {
                if at.elapsed() < self.window {
                    return;
                }
            }
            *last_dump = Some(Instant::now());
        }

        let directory = match url.get_param(DUMP_DIRECTORY) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            _ => home_dir(),
        };
        let registry = self.registry.clone();
        let snapshots = self.snapshots.clone();
        let spawned = thread::Builder::new()
            .name("Dubbo-dump".to_string())
            .spawn(move || write_snapshot(permit, &directory, &registry, &snapshots));
        if let Err(err) = spawned {
            error!("failed to start execution snapshot: {}", err);
        }
    }
}

fn write_snapshot(
    permit: OwnedSemaphorePermit,
    directory: &Path,
    registry: &ExecutionRegistry,
    snapshots: &AtomicU64,
) {
    let now = Local::now();
    let path = directory.join(format!(
        "{}.{}",
        DUMP_FILE_PREFIX,
        now.format(DUMP_TIME_FORMAT)
    ));
    let content = registry.render(&format!(
        "Dubbo execution snapshot at {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f")
    ));
    let written = fs::create_dir_all(directory).and_then(|_| fs::write(&path, content));
    match written {
        Ok(()) => {
            snapshots.fetch_add(1, Ordering::SeqCst);
            info!("execution snapshot written to {}", path.display());
        }
        Err(err) => error!("failed to write execution snapshot {}: {}", path.display(), err),
    }
    drop(permit);
}

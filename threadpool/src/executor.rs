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
    collections::VecDeque,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use dubbo_logger::tracing::{debug, error};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::registry::ExecutionRegistry;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A submission the executor refused. Never retried by the pool itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RejectedExecution {
    pub message: String,
}

impl RejectedExecution {
    pub fn new(message: impl Into<String>) -> Self {
        RejectedExecution {
            message: message.into(),
        }
    }
}

/// Decides what a refused submission turns into.
pub trait RejectedExecutionHandler: Send + Sync {
    fn rejected(&self, task_label: &str, executor: &ThreadPoolExecutor) -> RejectedExecution;
}

/// Plain refusal without any reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortPolicy;

impl RejectedExecutionHandler for AbortPolicy {
    fn rejected(&self, task_label: &str, executor: &ThreadPoolExecutor) -> RejectedExecution {
        RejectedExecution::new(format!(
            "Task {} rejected from {}",
            task_label,
            executor.name()
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPoolConfig {
    pub name: String,
    pub core_size: usize,
    pub max_size: usize,
    /// 0 hands every task directly to an idle worker.
    pub queue_capacity: usize,
    /// Idle time after which workers above `core_size` exit; `None` keeps them forever.
    pub keep_alive: Option<Duration>,
}

/// Point-in-time counters of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub pool_size: usize,
    pub active: usize,
    pub core_size: usize,
    pub max_size: usize,
    pub largest: usize,
    pub queued: usize,
    pub task_count: u64,
    pub completed: u64,
    pub is_shutdown: bool,
    pub is_terminated: bool,
    pub is_terminating: bool,
}

struct Job {
    label: String,
    task: Task,
}

struct State {
    queue: VecDeque<Job>,
    workers: usize,
    idle: usize,
    largest: usize,
    shutdown: bool,
    next_worker: usize,
}

struct Shared {
    config: ThreadPoolConfig,
    state: Mutex<State>,
    available: Condvar,
    terminated: Condvar,
    active: AtomicUsize,
    task_count: AtomicU64,
    completed: AtomicU64,
    registry: Option<Arc<ExecutionRegistry>>,
}

/// Bounded pool of named OS threads.
///
/// Submission grows the pool up to `core_size`, then queues (or hands off to an idle
/// worker), then grows up to `max_size`, and finally rejects through the handler.
pub struct ThreadPoolExecutor {
    shared: Arc<Shared>,
    handler: Arc<dyn RejectedExecutionHandler>,
}

enum Admission {
    Spawn(Job, usize),
    Queued,
    Rejected(Job),
}

impl ThreadPoolExecutor {
    pub fn new(
        config: ThreadPoolConfig,
        handler: Arc<dyn RejectedExecutionHandler>,
        registry: Option<Arc<ExecutionRegistry>>,
    ) -> Self {
        let mut config = config;
        config.max_size = config.max_size.max(1);
        config.core_size = config.core_size.min(config.max_size);
        ThreadPoolExecutor {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    workers: 0,
                    idle: 0,
                    largest: 0,
                    shutdown: false,
                    next_worker: 0,
                }),
                available: Condvar::new(),
                terminated: Condvar::new(),
                active: AtomicUsize::new(0),
                task_count: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                registry,
            }),
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &ThreadPoolConfig {
        &self.shared.config
    }

    pub fn execute<F>(&self, task: F) -> Result<(), RejectedExecution>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_named("task", task)
    }

    /// Submits `task`; `label` shows up in execution snapshots while it runs.
    pub fn execute_named<F>(&self, label: &str, task: F) -> Result<(), RejectedExecution>
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Job {
            label: label.to_string(),
            task: Box::new(task),
        };
        let admission = {
            let mut state = self.shared.state.lock();
            self.admit(&mut state, job)
        };
        match admission {
            Admission::Queued => {
                self.shared.task_count.fetch_add(1, Ordering::SeqCst);
                self.shared.available.notify_one();
                Ok(())
            }
            Admission::Spawn(job, id) => {
                self.shared.task_count.fetch_add(1, Ordering::SeqCst);
                self.spawn_worker(id, job)
            }
            Admission::Rejected(job) => Err(self.handler.rejected(&job.label, self)),
        }
    }

    fn admit(&self, state: &mut State, job: Job) -> Admission {
        let config = &self.shared.config;
        if state.shutdown {
            return Admission::Rejected(job);
        }
        if state.workers < config.core_size {
            return Admission::Spawn(job, reserve_worker(state));
        }
        if state.idle > state.queue.len() || state.queue.len() < config.queue_capacity {
            state.queue.push_back(job);
            return Admission::Queued;
        }
        if state.workers < config.max_size {
            return Admission::Spawn(job, reserve_worker(state));
        }
        Admission::Rejected(job)
    }

    fn spawn_worker(&self, id: usize, first: Job) -> Result<(), RejectedExecution> {
        let thread_name = format!("{}-thread-{}", self.shared.config.name, id);
        let shared = self.shared.clone();
        let worker_name = thread_name.clone();
        let spawned = thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_worker(shared, worker_name, first));
        match spawned {
            Ok(_) => Ok(()),
            Err(err) => {
                error!("failed to start worker of {}: {}", self.name(), err);
                let mut state = self.shared.state.lock();
                state.workers -= 1;
                drop(state);
                self.shared.task_count.fetch_sub(1, Ordering::SeqCst);
                Err(self.handler.rejected("worker start", self))
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            pool_size: state.workers,
            active: self.shared.active.load(Ordering::SeqCst),
            core_size: self.shared.config.core_size,
            max_size: self.shared.config.max_size,
            largest: state.largest,
            queued: state.queue.len(),
            task_count: self.shared.task_count.load(Ordering::SeqCst),
            completed: self.shared.completed.load(Ordering::SeqCst),
            is_shutdown: state.shutdown,
            is_terminated: state.shutdown && state.workers == 0,
            is_terminating: state.shutdown && state.workers > 0,
        }
    }

    /// Stops accepting tasks; queued ones still run.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if !state.shutdown {
            debug!("shutdown thread pool {}", self.shared.config.name);
            state.shutdown = true;
        }
        drop(state);
        self.shared.available.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    pub fn is_terminated(&self) -> bool {
        let state = self.shared.state.lock();
        state.shutdown && state.workers == 0
    }

    /// Waits until every worker exited after `shutdown`; false on timeout.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let mut state = self.shared.state.lock();
        if !state.shutdown {
            return false;
        }
        while state.workers > 0 {
            if self
                .shared
                .terminated
                .wait_for(&mut state, timeout)
                .timed_out()
            {
                return state.workers == 0;
            }
        }
        true
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

fn reserve_worker(state: &mut State) -> usize {
    state.workers += 1;
    state.largest = state.largest.max(state.workers);
    state.next_worker += 1;
    state.next_worker
}

fn run_worker(shared: Arc<Shared>, thread_name: String, first: Job) {
    let slot = shared
        .registry
        .as_ref()
        .map(|registry| registry.register(&shared.config.name, &thread_name));
    let mut next = Some(first);
    while let Some(job) = next.take() {
        if let (Some(registry), Some(slot)) = (&shared.registry, slot) {
            registry.begin(slot, &job.label);
        }
        shared.active.fetch_add(1, Ordering::SeqCst);
        if catch_unwind(AssertUnwindSafe(job.task)).is_err() {
            error!("task {} panicked on {}", job.label, thread_name);
        }
        shared.active.fetch_sub(1, Ordering::SeqCst);
        shared.completed.fetch_add(1, Ordering::SeqCst);
        if let (Some(registry), Some(slot)) = (&shared.registry, slot) {
            registry.end(slot);
        }
        next = next_job(&shared);
    }
    if let (Some(registry), Some(slot)) = (&shared.registry, slot) {
        registry.unregister(slot);
    }
}

// None means the worker has been retired and must exit.
fn next_job(shared: &Shared) -> Option<Job> {
    let config = &shared.config;
    let mut state = shared.state.lock();
    loop {
        if let Some(job) = state.queue.pop_front() {
            return Some(job);
        }
        if state.shutdown {
            return retire(shared, &mut state);
        }
        state.idle += 1;
        let timed_out = match config.keep_alive {
            Some(keep_alive) if state.workers > config.core_size => shared
                .available
                .wait_for(&mut state, keep_alive)
                .timed_out(),
            _ => {
                shared.available.wait(&mut state);
                false
            }
        };
        state.idle -= 1;
        if timed_out && state.queue.is_empty() && state.workers > config.core_size {
            return retire(shared, &mut state);
        }
    }
}

fn retire(shared: &Shared, state: &mut State) -> Option<Job> {
    state.workers -= 1;
    if state.workers == 0 {
        shared.terminated.notify_all();
    }
    None
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{mpsc, Arc, Barrier},
        time::Duration,
    };

    use super::*;

    fn pool(core: usize, max: usize, queue: usize, keep_alive: Option<Duration>) -> ThreadPoolExecutor {
        ThreadPoolExecutor::new(
            ThreadPoolConfig {
                name: "test".to_string(),
                core_size: core,
                max_size: max,
                queue_capacity: queue,
                keep_alive,
            },
            Arc::new(AbortPolicy),
            None,
        )
    }

    #[test]
    fn test_runs_tasks_and_counts() {
        let executor = pool(2, 2, 10, None);
        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            executor.execute(move || tx.send(i).unwrap()).unwrap();
        }
        let mut got: Vec<i32> = (0..5).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
        got.sort();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);

        executor.shutdown();
        assert!(executor.await_termination(Duration::from_secs(5)));
        let stats = executor.stats();
        assert_eq!(stats.task_count, 5);
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.largest, 2);
        assert!(stats.is_terminated);
        assert!(executor.execute(|| {}).is_err());
    }

    #[test]
    fn test_rejects_when_saturated() {
        let executor = pool(1, 1, 0, None);
        let gate = Arc::new(Barrier::new(2));
        let held = gate.clone();
        executor.execute(move || {
            held.wait();
        })
        .unwrap();

        let err = executor.execute(|| {}).unwrap_err();
        assert!(err.message.contains("rejected from test"));
        assert_eq!(executor.stats().pool_size, 1);
        gate.wait();
    }

    #[test]
    fn test_idle_worker_takes_hand_off() {
        let executor = pool(0, 1, 0, Some(Duration::from_secs(5)));
        let (tx, rx) = mpsc::channel();
        let first = tx.clone();
        executor.execute(move || first.send(1).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
        // wait for the worker to park
        for _ in 0..100 {
            if executor.stats().active == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(50));
        executor.execute(move || tx.send(2).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
        assert_eq!(executor.stats().largest, 1);
    }

    #[test]
    fn test_idle_workers_above_core_expire() {
        let executor = pool(0, 3, 0, Some(Duration::from_millis(50)));
        let gate = Arc::new(Barrier::new(4));
        for _ in 0..3 {
            let gate = gate.clone();
            executor.execute(move || {
                gate.wait();
            })
            .unwrap();
        }
        gate.wait();
        for _ in 0..100 {
            if executor.stats().pool_size == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(executor.stats().pool_size, 0);
        assert_eq!(executor.stats().largest, 3);
    }

    #[test]
    fn test_panicking_task_keeps_worker() {
        let executor = pool(1, 1, 4, None);
        executor.execute(|| panic!("boom")).unwrap();
        let (tx, rx) = mpsc::channel();
        executor.execute(move || tx.send("alive").unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "alive");
        assert_eq!(executor.stats().pool_size, 1);
    }
}

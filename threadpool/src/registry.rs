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
    collections::BTreeMap,
    fmt::Write,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use parking_lot::RwLock;

/// Live worker threads of every pool sharing one guard, for execution snapshots.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    next_slot: AtomicU64,
    workers: RwLock<BTreeMap<u64, WorkerEntry>>,
}

#[derive(Debug, Clone)]
struct WorkerEntry {
    pool: String,
    thread: String,
    started: Instant,
    running: Option<(String, Instant)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub pool: String,
    pub thread: String,
    pub alive: Duration,
    /// Label and elapsed time of the task being executed, if any.
    pub running: Option<(String, Duration)>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pool: &str, thread: &str) -> u64 {
        let slot = self.next_slot.fetch_add(1, Ordering::SeqCst);
        self.workers.write().insert(
            slot,
            WorkerEntry {
                pool: pool.to_string(),
                thread: thread.to_string(),
                started: Instant::now(),
                running: None,
            },
        );
        slot
    }

    pub fn begin(&self, slot: u64, label: &str) {
        if let Some(entry) = self.workers.write().get_mut(&slot) {
            entry.running = Some((label.to_string(), Instant::now()));
        }
    }

    pub fn end(&self, slot: u64) {
        if let Some(entry) = self.workers.write().get_mut(&slot) {
            entry.running = None;
        }
    }

    pub fn unregister(&self, slot: u64) {
        self.workers.write().remove(&slot);
    }

    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.workers
            .read()
            .values()
            .map(|entry| WorkerSnapshot {
                pool: entry.pool.clone(),
                thread: entry.thread.clone(),
                alive: entry.started.elapsed(),
                running: entry
                    .running
                    .as_ref()
                    .map(|(label, since)| (label.clone(), since.elapsed())),
            })
            .collect()
    }

    pub fn render(&self, header: &str) -> String {
        let workers = self.snapshot();
        let running = workers.iter().filter(|w| w.running.is_some()).count();
        let mut out = String::new();
        let _ = writeln!(out, "{}", header);
        let _ = writeln!(
            out,
            "workers: {} (running: {}, idle: {})\n",
            workers.len(),
            running,
            workers.len() - running
        );
        for worker in workers {
            match worker.running {
                Some((label, busy)) => {
                    let _ = writeln!(
                        out,
                        "\"{}\" pool={} state=RUNNING task={} busy={}ms alive={}ms",
                        worker.thread,
                        worker.pool,
                        label,
                        busy.as_millis(),
                        worker.alive.as_millis()
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "\"{}\" pool={} state=IDLE alive={}ms",
                        worker.thread,
                        worker.pool,
                        worker.alive.as_millis()
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionRegistry;

    #[test]
    fn test_render_running_and_idle() {
        let registry = ExecutionRegistry::new();
        let a = registry.register("DubboServerHandler", "DubboServerHandler-thread-1");
        let b = registry.register("DubboServerHandler", "DubboServerHandler-thread-2");
        registry.begin(a, "demo.Greeter.sayHello");

        let dump = registry.render("snapshot");
        assert!(dump.starts_with("snapshot\n"));
        assert!(dump.contains("workers: 2 (running: 1, idle: 1)"));
        assert!(dump.contains("state=RUNNING task=demo.Greeter.sayHello"));
        assert!(dump.contains("\"DubboServerHandler-thread-2\" pool=DubboServerHandler state=IDLE"));

        registry.end(a);
        registry.unregister(b);
        assert_eq!(registry.len(), 1);
        assert!(registry.snapshot()[0].running.is_none());
    }
}

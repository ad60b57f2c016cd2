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

use std::sync::atomic::{AtomicBool, Ordering};

pub use tracing::{self, Level};

// flag for the sake of avoiding multiple initialization
static TRACING_CONFIGURED: AtomicBool = AtomicBool::new(false);

/// Environment variable naming the default log level.
pub const LOG_LEVEL_ENV: &str = "DUBBO_LOG_LEVEL";

/// Config file key read when `DUBBO_LOG_LEVEL` is unset.
pub const LOG_LEVEL_KEY: &str = "dubbo.logger.level";

const CONFIG_PATH_ENV: &str = "DUBBO_CONFIG_PATH";

mod level;
mod tracing_configurer;

// put on main method
pub fn init() {
    if let Err(err) = try_init() {
        eprintln!("dubbo-logger: {}", err);
    }
}

/// Installs the global subscriber once; later calls are no-ops.
///
/// `RUST_LOG` directives win when set, otherwise everything at or above
/// `DUBBO_LOG_LEVEL`, else `dubbo.logger.level` of the config file (default `info`),
/// is printed.
pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if TRACING_CONFIGURED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }
    tracing_configurer::default()
}

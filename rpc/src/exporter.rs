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

use std::fmt::Debug;

use crate::invoker::BoxInvoker;

/// Makes an invoker reachable; dropping the handle does not unexport.
pub trait Exporter: Debug + Send + Sync {
    fn invoker(&self) -> BoxInvoker;

    /// Stops serving through this handle. Safe to call any number of times.
    fn unexport(&self);

    fn is_unexported(&self) -> bool;
}

pub type BoxExporter = Box<dyn Exporter + Send + Sync>;

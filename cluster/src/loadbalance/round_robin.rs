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

use std::collections::HashMap;

use dubbo_base::Url;
use dubbo_rpc::{BoxInvoker, RpcInvocation};
use parking_lot::Mutex;

use super::{weight, LoadBalance};

pub const NAME: &str = "roundrobin";

/// Smooth weighted round robin, one rotation per `service key.method`.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalance {
    // method key -> invoker identity -> current weight
    rotations: Mutex<HashMap<String, HashMap<String, i64>>>,
}

impl LoadBalance for RoundRobinLoadBalance {
    fn select(&self, invokers: &[BoxInvoker], url: &Url, invocation: &RpcInvocation) -> Option<BoxInvoker> {
        match invokers.len() {
            0 => return None,
            1 => return invokers.first().cloned(),
            _ => {}
        }
        let key = format!("{}.{}", url.service_key(), invocation.method_name());
        let mut rotations = self.rotations.lock();
        let rotation = rotations.entry(key).or_default();

        let identities: Vec<String> = invokers.iter().map(|invoker| invoker.get_url().to_string()).collect();
        rotation.retain(|identity, _| identities.contains(identity));

        let mut total = 0i64;
        let mut picked: Option<(usize, i64)> = None;
        for (index, (invoker, identity)) in invokers.iter().zip(&identities).enumerate() {
            let weight = weight(invoker, invocation.method_name()) as i64;
            total += weight;
            let current = rotation.entry(identity.clone()).or_insert(0);
            *current += weight;
            if picked.map(|(_, best)| *current > best).unwrap_or(true) {
                picked = Some((index, *current));
            }
        }
        let (index, _) = picked?;
        if let Some(current) = rotation.get_mut(&identities[index]) {
            *current -= total;
        }
        invokers.get(index).cloned()
    }
}

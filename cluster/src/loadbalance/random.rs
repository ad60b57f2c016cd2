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

use dubbo_base::Url;
use dubbo_rpc::{BoxInvoker, RpcInvocation};
use rand::Rng;

use super::{weight, LoadBalance};

pub const NAME: &str = "random";

/// Random pick proportional to the invokers' `weight`, uniform when all weights match.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomLoadBalance;

impl LoadBalance for RandomLoadBalance {
    fn select(&self, invokers: &[BoxInvoker], _url: &Url, invocation: &RpcInvocation) -> Option<BoxInvoker> {
        match invokers.len() {
            0 => return None,
            1 => return invokers.first().cloned(),
            _ => {}
        }
        let weights: Vec<u64> = invokers
            .iter()
            .map(|invoker| weight(invoker, invocation.method_name()))
            .collect();
        let total: u64 = weights.iter().sum();
        let same_weight = weights.windows(2).all(|pair| pair[0] == pair[1]);
        let mut rng = rand::thread_rng();
        if total > 0 && !same_weight {
            let mut offset = rng.gen_range(0..total);
            for (invoker, weight) in invokers.iter().zip(weights) {
                if offset < weight {
                    return Some(invoker.clone());
                }
                offset -= weight;
            }
        }
        invokers.get(rng.gen_range(0..invokers.len())).cloned()
    }
}

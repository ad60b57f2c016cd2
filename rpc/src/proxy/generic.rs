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

use dubbo_base::constants::GENERIC_METHOD;
use serde_json::Value;

use super::{Proxy, ServiceProxy};
use crate::error::RpcError;

/// Parameter types of `$invoke`: method name, parameter type names, arguments.
pub const GENERIC_PARAMETER_TYPES: [&str; 3] = ["string", "string[]", "object[]"];

/// Calls any method by name with loosely typed arguments, no local interface needed.
#[derive(Debug, Clone)]
pub struct GenericProxy {
    proxy: Proxy,
}

impl ServiceProxy for GenericProxy {
    const GENERIC: bool = true;

    fn from_proxy(proxy: Proxy) -> Self {
        GenericProxy { proxy }
    }
}

impl GenericProxy {
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub async fn invoke(
        &self,
        method: &str,
        parameter_types: &[&str],
        arguments: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let parameter_types: Vec<String> = parameter_types.iter().map(|t| t.to_string()).collect();
        self.proxy
            .call(
                GENERIC_METHOD,
                &GENERIC_PARAMETER_TYPES,
                (method.to_string(), parameter_types, arguments),
            )
            .await
    }
}

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

use std::{collections::HashMap, future::Future, net::SocketAddr};

tokio::task_local! {
    static RPC_CONTEXT: RpcContext;
}

///
/// Information about the inbound call being served.
///
/// A protocol scopes a context around the service call, so the implementation can ask
/// who called it and read the invocation attachments. Outside such a scope every accessor
/// returns `None`.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcContext {
    remote_address: Option<SocketAddr>,
    local_address: Option<SocketAddr>,
    attachments: HashMap<String, String>,
}

impl RpcContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote_address(self, remote_address: Option<SocketAddr>) -> Self {
        Self {
            remote_address,
            ..self
        }
    }

    pub fn with_local_address(self, local_address: Option<SocketAddr>) -> Self {
        Self {
            local_address,
            ..self
        }
    }

    pub fn with_attachments(self, attachments: HashMap<String, String>) -> Self {
        Self {
            attachments,
            ..self
        }
    }

    /// Runs `future` with this context as the current one.
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        RPC_CONTEXT.scope(self, future).await
    }

    pub fn current() -> Option<RpcContext> {
        RPC_CONTEXT.try_with(|context| context.clone()).ok()
    }

    pub fn remote_address() -> Option<SocketAddr> {
        RPC_CONTEXT
            .try_with(|context| context.remote_address)
            .ok()
            .flatten()
    }

    pub fn local_address() -> Option<SocketAddr> {
        RPC_CONTEXT
            .try_with(|context| context.local_address)
            .ok()
            .flatten()
    }

    pub fn attachment(key: &str) -> Option<String> {
        RPC_CONTEXT
            .try_with(|context| context.attachments.get(key).cloned())
            .ok()
            .flatten()
    }

    pub fn attachments(&self) -> &HashMap<String, String> {
        &self.attachments
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use tokio::time;

    use super::*;

    #[tokio::test]
    async fn test_context_is_scoped_per_task() {
        assert!(RpcContext::remote_address().is_none());

        let mut handles = Vec::with_capacity(10);
        for i in 0..10u16 {
            handles.push(tokio::spawn(async move {
                let address: SocketAddr = format!("10.0.0.{}:{}", i + 1, 30000 + i).parse().unwrap();
                let mut attachments = HashMap::new();
                attachments.insert("key1".to_string(), format!("data-{i}"));
                let context = RpcContext::new()
                    .with_remote_address(Some(address))
                    .with_attachments(attachments);
                context
                    .scope(async move {
                        time::sleep(Duration::from_millis(20)).await;
                        assert_eq!(RpcContext::remote_address(), Some(address));
                        assert_eq!(RpcContext::attachment("key1"), Some(format!("data-{i}")));
                    })
                    .await;
                assert!(RpcContext::current().is_none());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}

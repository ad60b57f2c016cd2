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
    fmt::{self, Debug, Display, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use dubbo_base::{Node, Url};

use crate::{
    error::{FailureKind, InvocationFailure},
    invocation::RpcInvocation,
    result::RpcResult,
};

/// One route to a service implementation, local or remote.
///
/// Once destroyed an invoker answers every call with a `Destroyed` failure.
#[async_trait]
pub trait Invoker: Node + Debug + Send + Sync {
    /// Fully qualified interface this invoker serves.
    fn interface(&self) -> String {
        self.get_url().service_interface()
    }

    async fn invoke(&self, invocation: Arc<RpcInvocation>) -> RpcResult;
}

pub type BoxInvoker = Arc<dyn Invoker>;

/// Url plus availability state, the part every invoker shares.
pub struct BaseInvoker {
    url: Arc<Url>,
    available: AtomicBool,
    destroyed: AtomicBool,
}

impl BaseInvoker {
    pub fn new(url: Url) -> Self {
        Self {
            url: Arc::new(url),
            available: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_available(&self, available: bool) {
        if !self.is_destroyed() {
            self.available.store(available, Ordering::SeqCst);
        }
    }

    /// The failure to answer with after `destroy`.
    pub fn destroyed_failure(&self) -> Option<RpcResult> {
        if self.is_destroyed() {
            return Some(RpcResult::err(InvocationFailure::new(
                FailureKind::Destroyed,
                format!("invoker {} is destroyed", self.url.short_url()),
            )));
        }
        None
    }
}

impl Node for BaseInvoker {
    fn get_url(&self) -> Arc<Url> {
        self.url.clone()
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.available.store(false, Ordering::SeqCst)
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Display for BaseInvoker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("protocol", &self.url.scheme())
            .field("host", &self.url.host())
            .field("path", &self.url.path())
            .finish()
    }
}

impl Debug for BaseInvoker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseInvoker")
            .field("url", &self.url.to_string())
            .field("available", &self.is_available())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use dubbo_base::{Node, Url};

    use super::BaseInvoker;
    use crate::error::FailureKind;

    #[test]
    fn test_destroy_is_final() {
        let base = BaseInvoker::new(Url::new("injvm", "127.0.0.1", 0, "demo.Greeter"));
        assert!(base.is_available());
        assert!(base.destroyed_failure().is_none());

        base.destroy();
        base.set_available(true);
        assert!(!base.is_available());
        let result = base.destroyed_failure().unwrap();
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Destroyed));
    }
}

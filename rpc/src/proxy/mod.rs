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
    fmt::{self, Debug, Formatter},
    panic::AssertUnwindSafe,
    sync::Arc,
};

use async_trait::async_trait;
use dubbo_base::{
    constants::{GENERIC_ASYNC_METHOD, GENERIC_KEY, GENERIC_METHOD, INTERFACE_KEY, METHODS_KEY},
    Node, Url,
};
use dubbo_logger::tracing::{debug, error};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{FailureKind, InvocationFailure, RpcError},
    invocation::RpcInvocation,
    invoker::{BaseInvoker, BoxInvoker, Invoker},
    result::RpcResult,
};

mod descriptor;
mod generic;

pub use descriptor::{FromArguments, IntoArguments, MethodDescriptor, ServiceDescriptor};
pub use generic::{GenericProxy, GENERIC_PARAMETER_TYPES};

/// A typed client built over a [`Proxy`], usually generated by `#[dubbo_trait]`.
pub trait ServiceProxy: Sized {
    /// Whether this client speaks the generic `$invoke` call.
    const GENERIC: bool = false;

    fn from_proxy(proxy: Proxy) -> Self;
}

/// Bridges service implementations and typed clients to invokers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProxyFactory;

impl ProxyFactory {
    pub fn new() -> Self {
        ProxyFactory
    }

    /// An invoker dispatching invocations onto `service` through `descriptor`.
    pub fn get_invoker<S>(&self, service: Arc<S>, descriptor: ServiceDescriptor<S>, url: Url) -> BoxInvoker
    where
        S: Send + Sync + 'static,
    {
        let url = url
            .with_if_absent(INTERFACE_KEY, descriptor.interface())
            .with_if_absent(METHODS_KEY, &descriptor.method_names().join(","));
        Arc::new(ServiceInvoker {
            base: BaseInvoker::new(url),
            service,
            descriptor: Arc::new(descriptor),
        })
    }

    /// A `T` calling through `invoker`. An invoker whose url is marked `generic=true`
    /// only backs a generic client.
    pub fn get_proxy<T: ServiceProxy>(&self, invoker: BoxInvoker) -> Result<T, RpcError> {
        let url = invoker.get_url();
        if url.parameter_as(GENERIC_KEY, false) && !T::GENERIC {
            return Err(RpcError::Refer {
                url: url.to_string(),
                reason: format!("generic reference exposes only {}", GENERIC_METHOD),
            });
        }
        Ok(T::from_proxy(Proxy::new(invoker)))
    }
}

/// Turns typed calls into invocations on one invoker.
#[derive(Clone)]
pub struct Proxy {
    invoker: BoxInvoker,
}

impl Proxy {
    pub fn new(invoker: BoxInvoker) -> Self {
        Proxy { invoker }
    }

    pub fn invoker(&self) -> &BoxInvoker {
        &self.invoker
    }

    pub fn url(&self) -> Arc<Url> {
        self.invoker.get_url()
    }

    /// Invokes `method` with `arguments` and decodes the returned value as `R`.
    pub async fn call<A, R>(&self, method: &str, parameter_types: &[&str], arguments: A) -> Result<R, RpcError>
    where
        A: IntoArguments + Send,
        R: DeserializeOwned,
    {
        let invocation = RpcInvocation::new(&self.invoker.interface(), method)
            .with_parameter_types(parameter_types.iter().map(|t| t.to_string()).collect())
            .with_arguments(arguments.into_arguments()?);
        let value = self.invoker.invoke(Arc::new(invocation)).await.into_outcome()?;
        serde_json::from_value(value).map_err(|err| {
            RpcError::from(InvocationFailure::serialization(format!(
                "decode result of {}: {}",
                method, err
            )))
        })
    }
}

impl Debug for Proxy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy").field("invoker", &self.invoker).finish()
    }
}

/// The caller-facing error for `err`: the business error the callee returned when it was
/// an `E`, else `err` converted.
pub fn lift_error<E>(err: RpcError) -> E
where
    E: DeserializeOwned + From<RpcError>,
{
    match err.failure().and_then(InvocationFailure::downcast_business::<E>) {
        Some(business) => business,
        None => E::from(err),
    }
}

struct ServiceInvoker<S> {
    base: BaseInvoker,
    service: Arc<S>,
    descriptor: Arc<ServiceDescriptor<S>>,
}

impl<S: Send + Sync + 'static> ServiceInvoker<S> {
    async fn dispatch(&self, invocation: Arc<RpcInvocation>) -> Result<Value, InvocationFailure> {
        let invocation = match invocation.method_name() {
            GENERIC_METHOD | GENERIC_ASYNC_METHOD => Arc::new(unpack_generic(&invocation)?),
            _ => invocation,
        };
        let method = self
            .descriptor
            .find(invocation.method_name(), invocation.parameter_types())?;
        debug!(
            "dispatch {}.{}",
            self.descriptor.interface(),
            invocation.method_name()
        );
        let call = method.call(self.service.clone(), invocation.clone());
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    "{}.{} panicked: {}",
                    self.descriptor.interface(),
                    invocation.method_name(),
                    reason
                );
                Err(InvocationFailure::new(
                    FailureKind::Business,
                    format!(
                        "unexpected failure in {}.{}: {}",
                        self.descriptor.interface(),
                        invocation.method_name(),
                        reason
                    ),
                ))
            }
        }
    }
}

/// The invocation a `$invoke(method, types, arguments)` call stands for.
fn unpack_generic(invocation: &RpcInvocation) -> Result<RpcInvocation, InvocationFailure> {
    let (method, parameter_types, arguments) =
        <(String, Vec<String>, Vec<Value>)>::from_arguments(invocation.arguments()).map_err(|err| {
            InvocationFailure::dispatch(format!("malformed generic call: {}", err.message))
        })?;
    Ok(RpcInvocation::new(invocation.service_name(), &method)
        .with_parameter_types(parameter_types)
        .with_arguments(arguments)
        .with_attachments(invocation.attachments().clone()))
}

impl<S> Node for ServiceInvoker<S> {
    fn get_url(&self) -> Arc<Url> {
        self.base.get_url()
    }

    fn is_available(&self) -> bool {
        self.base.is_available()
    }

    fn destroy(&self) {
        self.base.destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }
}

#[async_trait]
impl<S: Send + Sync + 'static> Invoker for ServiceInvoker<S> {
    fn interface(&self) -> String {
        self.descriptor.interface().to_string()
    }

    async fn invoke(&self, invocation: Arc<RpcInvocation>) -> RpcResult {
        if let Some(destroyed) = self.base.destroyed_failure() {
            return destroyed;
        }
        RpcResult::from_outcome(self.dispatch(invocation).await.map_err(RpcError::from))
    }
}

impl<S> Debug for ServiceInvoker<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInvoker")
            .field("interface", &self.descriptor.interface())
            .field("base", &self.base)
            .finish()
    }
}

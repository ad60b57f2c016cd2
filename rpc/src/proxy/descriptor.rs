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
    future::Future,
    sync::Arc,
};

use futures::{future::BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{error::InvocationFailure, invocation::RpcInvocation};

/// Decodes the positional arguments of an invocation.
pub trait FromArguments: Sized {
    fn from_arguments(arguments: &[Value]) -> Result<Self, InvocationFailure>;
}

/// Encodes a call's arguments into positional JSON values.
pub trait IntoArguments {
    fn into_arguments(self) -> Result<Vec<Value>, InvocationFailure>;
}

macro_rules! impl_arguments {
    ($len:expr; $($arg:ident),*) => {
        impl<$($arg: DeserializeOwned),*> FromArguments for ($($arg,)*) {
            #[allow(unused_mut, unused_variables)]
            fn from_arguments(arguments: &[Value]) -> Result<Self, InvocationFailure> {
                if arguments.len() != $len {
                    return Err(InvocationFailure::dispatch(format!(
                        "expected {} arguments, got {}",
                        $len,
                        arguments.len()
                    )));
                }
                let mut arguments = arguments.iter().enumerate();
                Ok(($(
                    match arguments.next() {
                        Some((index, value)) => serde_json::from_value::<$arg>(value.clone())
                            .map_err(|err| {
                                InvocationFailure::dispatch(format!("argument {}: {}", index, err))
                            })?,
                        None => return Err(InvocationFailure::dispatch("missing argument")),
                    },
                )*))
            }
        }

        impl<$($arg: Serialize),*> IntoArguments for ($($arg,)*) {
            #[allow(non_snake_case)]
            fn into_arguments(self) -> Result<Vec<Value>, InvocationFailure> {
                let ($($arg,)*) = self;
                Ok(vec![$(
                    serde_json::to_value($arg)
                        .map_err(|err| InvocationFailure::serialization(err.to_string()))?
                ),*])
            }
        }
    };
}

impl_arguments!(0;);
impl_arguments!(1; A1);
impl_arguments!(2; A1, A2);
impl_arguments!(3; A1, A2, A3);
impl_arguments!(4; A1, A2, A3, A4);
impl_arguments!(5; A1, A2, A3, A4, A5);
impl_arguments!(6; A1, A2, A3, A4, A5, A6);

type Handler<S> = Arc<
    dyn Fn(Arc<S>, Arc<RpcInvocation>) -> BoxFuture<'static, Result<Value, InvocationFailure>>
        + Send
        + Sync,
>;

pub struct MethodDescriptor<S> {
    name: String,
    parameter_types: Vec<String>,
    handler: Handler<S>,
}

impl<S> MethodDescriptor<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub(crate) fn call(
        &self,
        service: Arc<S>,
        invocation: Arc<RpcInvocation>,
    ) -> BoxFuture<'static, Result<Value, InvocationFailure>> {
        (*self.handler)(service, invocation)
    }
}

impl<S> Debug for MethodDescriptor<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_types.join(", "))
    }
}

///
/// The callable surface of a service implementation `S`.
///
/// Each registered method maps a name and its parameter type names to a typed async
/// handler. Arguments are decoded from the invocation's JSON values, the handler's `Ok`
/// value is encoded back, and an `Err` becomes a business failure carrying the error's
/// type name and serialized form, so the consumer can rebuild it.
///
/// ```ignore
/// let descriptor = ServiceDescriptor::<GreeterImpl>::new("demo.Greeter")
///     .method("greet", &["string"], |service, (name,): (String,)| async move {
///         service.greet(name).await
///     });
/// ```
///
pub struct ServiceDescriptor<S> {
    interface: String,
    methods: Vec<MethodDescriptor<S>>,
}

impl<S: Send + Sync + 'static> ServiceDescriptor<S> {
    pub fn new(interface: &str) -> Self {
        ServiceDescriptor {
            interface: interface.to_string(),
            methods: Vec::new(),
        }
    }

    pub fn method<A, R, E, F, Fut>(mut self, name: &str, parameter_types: &[&str], handler: F) -> Self
    where
        A: FromArguments + Send + 'static,
        R: Serialize + Send + 'static,
        E: Serialize + Display + Send + 'static,
        F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let handler: Handler<S> = Arc::new(
            move |service: Arc<S>,
                  invocation: Arc<RpcInvocation>|
                  -> BoxFuture<'static, Result<Value, InvocationFailure>> {
                let handler = handler.clone();
                async move {
                    let arguments = A::from_arguments(invocation.arguments())?;
                    match (*handler)(service, arguments).await {
                        Ok(value) => serde_json::to_value(value)
                            .map_err(|err| InvocationFailure::serialization(err.to_string())),
                        Err(err) => Err(InvocationFailure::business(
                            std::any::type_name::<E>(),
                            serde_json::to_value(&err).ok(),
                            err.to_string(),
                        )),
                    }
                }
                .boxed()
            },
        );
        self.methods.push(MethodDescriptor {
            name: name.to_string(),
            parameter_types: parameter_types.iter().map(|t| t.to_string()).collect(),
            handler,
        });
        self
    }
}

impl<S> ServiceDescriptor<S> {
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn methods(&self) -> &[MethodDescriptor<S>] {
        &self.methods
    }

    /// Distinct method names in registration order.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            if !names.contains(&method.name()) {
                names.push(method.name());
            }
        }
        names
    }

    /// The method matching `name` and `parameter_types` exactly, else the only method
    /// called `name`.
    pub fn find(&self, name: &str, parameter_types: &[String]) -> Result<&MethodDescriptor<S>, InvocationFailure> {
        if let Some(method) = self
            .methods
            .iter()
            .find(|method| method.name == name && method.parameter_types == parameter_types)
        {
            return Ok(method);
        }
        let mut candidates = self.methods.iter().filter(|method| method.name == name);
        match (candidates.next(), candidates.next()) {
            (Some(method), None) => Ok(method),
            (Some(_), Some(_)) => Err(InvocationFailure::dispatch(format!(
                "{}.{} is overloaded and no overload takes ({})",
                self.interface,
                name,
                parameter_types.join(", ")
            ))),
            (None, _) => Err(InvocationFailure::dispatch(format!(
                "{} has no method {}",
                self.interface, name
            ))),
        }
    }
}

impl<S> Debug for ServiceDescriptor<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("interface", &self.interface)
            .field("methods", &self.methods)
            .finish()
    }
}

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

pub mod context;
pub mod error;
pub mod exporter;
pub mod invocation;
pub mod invoker;
pub mod protocol;
pub mod proxy;
pub mod result;
pub mod timeout;

pub use context::RpcContext;
pub use error::{FailureKind, InvocationFailure, RpcError};
pub use exporter::{BoxExporter, Exporter};
pub use invocation::RpcInvocation;
pub use invoker::{BaseInvoker, BoxInvoker, Invoker};
pub use protocol::{BoxProtocol, InjvmProtocol, Protocol, ProtocolDirectory};
pub use proxy::{
    lift_error, FromArguments, GenericProxy, IntoArguments, Proxy, ProxyFactory, ServiceDescriptor,
    ServiceProxy,
};
pub use result::RpcResult;
pub use timeout::{call_timeout, TimeoutInvoker};

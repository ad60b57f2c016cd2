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

use proc_macro::TokenStream;
use quote::ToTokens;
use syn::parse::Parser;

mod trait_macro;

/// Turns a trait of async methods returning `Result<R, E>` into a dubbo service.
///
/// Next to the trait it generates `<Trait>Proxy`, a client implementing the trait over
/// a `dubbo::rpc::Proxy`, and `<Trait>Server`, whose `descriptor()` exposes any
/// implementation of the trait to `ProxyFactory::get_invoker`.
///
/// ```ignore
/// #[dubbo_trait(package = "org.apache.dubbo.demo", version = "1.0.0")]
/// pub trait Greeter {
///     async fn greet(&self, name: String) -> Result<String, GreetError>;
/// }
/// ```
#[proc_macro_attribute]
pub fn dubbo_trait(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = DubboAttr::from_attr(attr);
    match attr {
        Ok(attr) => trait_macro::dubbo_trait(attr, item),
        Err(err) => err.into_compile_error().into(),
    }
}

#[derive(Default)]
struct DubboAttr {
    package: Option<String>,
    version: Option<String>,
}

impl DubboAttr {
    fn from_attr(args: TokenStream) -> Result<DubboAttr, syn::Error> {
        syn::punctuated::Punctuated::<syn::Meta, syn::Token![,]>::parse_terminated
            .parse2(args.into())
            .and_then(Self::build_attr)
    }

    fn build_attr(
        args: syn::punctuated::Punctuated<syn::Meta, syn::Token![,]>,
    ) -> Result<DubboAttr, syn::Error> {
        let mut attr = DubboAttr::default();
        for arg in args {
            let syn::Meta::NameValue(namevalue) = arg else {
                return Err(syn::Error::new_spanned(
                    arg,
                    "expected `package = \"..\"` or `version = \"..\"`",
                ));
            };
            let ident = namevalue
                .path
                .get_ident()
                .ok_or_else(|| syn::Error::new_spanned(&namevalue, "must have specified ident"))?
                .to_string()
                .to_lowercase();
            let value = match &namevalue.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(lit),
                    ..
                }) => lit.value(),
                expr => expr.to_token_stream().to_string().replace('"', ""),
            };
            match ident.as_str() {
                "package" => attr.package = Some(value),
                "version" => attr.version = Some(value),
                name => {
                    let msg = format!(
                        "unknown attribute {} is specified; expected one of: 'package','version'",
                        name
                    );
                    return Err(syn::Error::new_spanned(namevalue, msg));
                }
            }
        }
        Ok(attr)
    }
}

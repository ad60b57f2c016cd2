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

use crate::DubboAttr;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, ToTokens};
use syn::{
    parse_macro_input, FnArg, GenericArgument, ItemTrait, PathArguments, ReturnType, TraitItem,
    TraitItemFn, Type,
};

struct ServiceMethod {
    sig: syn::Signature,
    name: String,
    arguments: Vec<syn::Ident>,
    types: Vec<Type>,
}

impl ServiceMethod {
    fn parse(item: &TraitItemFn) -> Result<Self, syn::Error> {
        let sig = &item.sig;
        if sig.asyncness.is_none() {
            return Err(syn::Error::new_spanned(sig, "dubbo service methods must be async"));
        }
        match sig.inputs.first() {
            Some(FnArg::Receiver(receiver))
                if receiver.reference.is_some() && receiver.mutability.is_none() => {}
            _ => {
                return Err(syn::Error::new_spanned(
                    sig,
                    "dubbo service methods must take `&self`",
                ))
            }
        }
        result_types(&sig.output)?;
        let types: Vec<Type> = sig
            .inputs
            .iter()
            .filter_map(|input| match input {
                FnArg::Typed(typed) => Some((*typed.ty).clone()),
                FnArg::Receiver(_) => None,
            })
            .collect();
        let arguments = (0..types.len()).map(|i| format_ident!("arg{}", i)).collect();
        Ok(ServiceMethod {
            sig: sig.clone(),
            name: sig.ident.to_string(),
            arguments,
            types,
        })
    }

    /// Parameter type names, as both sides of a call spell them.
    fn parameter_types(&self) -> Vec<String> {
        self.types
            .iter()
            .map(|ty| ty.to_token_stream().to_string().replace(' ', ""))
            .collect()
    }
}

/// `R` and `E` of a `Result<R, E>` return type.
fn result_types(output: &ReturnType) -> Result<(&Type, &Type), syn::Error> {
    let err = || syn::Error::new_spanned(output, "dubbo service methods must return `Result<R, E>`");
    let ReturnType::Type(_, ty) = output else {
        return Err(err());
    };
    let Type::Path(path) = ty.as_ref() else {
        return Err(err());
    };
    let segment = path.path.segments.last().ok_or_else(err)?;
    if segment.ident != "Result" {
        return Err(err());
    }
    let PathArguments::AngleBracketed(generics) = &segment.arguments else {
        return Err(err());
    };
    let mut types = generics.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    });
    match (types.next(), types.next()) {
        (Some(value), Some(error)) => Ok((value, error)),
        _ => Err(err()),
    }
}

pub fn dubbo_trait(attr: DubboAttr, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);
    match expand(attr, input) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

fn expand(attr: DubboAttr, input: ItemTrait) -> Result<TokenStream2, syn::Error> {
    let trait_ident = &input.ident;
    let vis = &input.vis;
    let methods = input
        .items
        .iter()
        .filter_map(|item| match item {
            TraitItem::Fn(item) => Some(ServiceMethod::parse(item)),
            _ => None,
        })
        .collect::<Result<Vec<_>, _>>()?;

    let interface = match &attr.package {
        None => trait_ident.to_string(),
        Some(package) => format!("{}.{}", package, trait_ident),
    };
    let version = match &attr.version {
        Some(version) => quote!(Some(#version)),
        None => quote!(None),
    };

    let proxy_ident = format_ident!("{}Proxy", trait_ident);
    let server_ident = format_ident!("{}Server", trait_ident);

    let item_trait = {
        let attrs = &input.attrs;
        let items = &input.items;
        quote! {
            #(#attrs)*
            #[::dubbo::async_trait]
            #vis trait #trait_ident: Send + Sync + 'static {
                #(#items)*
            }
        }
    };

    let proxy_fns = methods.iter().map(|method| {
        let ident = &method.sig.ident;
        let output = &method.sig.output;
        let name = &method.name;
        let parameter_types = method.parameter_types();
        let arguments = &method.arguments;
        let types = &method.types;
        quote! {
            #[allow(non_snake_case)]
            async fn #ident(&self, #(#arguments: #types),*) #output {
                self.proxy
                    .call(#name, &[#(#parameter_types),*], (#(#arguments,)*))
                    .await
                    .map_err(::dubbo::rpc::lift_error)
            }
        }
    });

    let descriptor_methods = methods.iter().map(|method| {
        let ident = &method.sig.ident;
        let name = &method.name;
        let parameter_types = method.parameter_types();
        let arguments = &method.arguments;
        let types = &method.types;
        quote! {
            .method(
                #name,
                &[#(#parameter_types),*],
                |service: ::std::sync::Arc<S>, (#(#arguments,)*): (#(#types,)*)| async move {
                    service.#ident(#(#arguments),*).await
                },
            )
        }
    });

    Ok(quote! {
        #item_trait

        /// Client of the service, calling through whichever invoker it was built on.
        #[derive(Debug, Clone)]
        #vis struct #proxy_ident {
            proxy: ::dubbo::rpc::Proxy,
        }

        impl #proxy_ident {
            pub fn proxy(&self) -> &::dubbo::rpc::Proxy {
                &self.proxy
            }
        }

        impl ::dubbo::rpc::ServiceProxy for #proxy_ident {
            fn from_proxy(proxy: ::dubbo::rpc::Proxy) -> Self {
                #proxy_ident { proxy }
            }
        }

        #[::dubbo::async_trait]
        impl #trait_ident for #proxy_ident {
            #(#proxy_fns)*
        }

        /// Provider side of the service.
        #vis struct #server_ident;

        impl #server_ident {
            pub const INTERFACE: &'static str = #interface;
            pub const VERSION: Option<&'static str> = #version;

            /// Dispatch table exposing `S` as this service.
            pub fn descriptor<S: #trait_ident>() -> ::dubbo::rpc::ServiceDescriptor<S> {
                ::dubbo::rpc::ServiceDescriptor::new(Self::INTERFACE)
                    #(#descriptor_methods)*
            }
        }
    })
}

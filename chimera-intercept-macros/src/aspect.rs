//! Aspect 宏实现

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Error, Expr, LitStr, Result};

/// `#[aspect(...)]` 属性中解析出的参数
struct AspectArgs {
    name: Option<String>,
    scope: Scope,
    order: Option<Expr>,
}

enum Scope {
    Singleton,
    PerResolution,
}

pub fn impl_aspect_derive(input: &DeriveInput) -> Result<TokenStream> {
    let ident = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "#[derive(Aspect)] does not support generic types",
        ));
    }

    let args = parse_aspect_args(input)?;
    let name = args.name.unwrap_or_else(|| ident.to_string());

    let model = match args.scope {
        Scope::Singleton => quote! { chimera_intercept::InstantiationModel::Singleton },
        Scope::PerResolution => quote! { chimera_intercept::InstantiationModel::PerResolution },
    };
    let order = match args.order {
        Some(order) => quote! { ::core::option::Option::Some(#order) },
        None => quote! { ::core::option::Option::None },
    };

    // 自动注册到 inventory
    let expanded = quote! {
        chimera_intercept::inventory::submit! {
            chimera_intercept::AspectRegistration::new(
                #name,
                #model,
                #order,
                || ::std::any::TypeId::of::<#ident>(),
                || ::std::sync::Arc::new(<#ident as ::core::default::Default>::default())
                    as ::std::sync::Arc<dyn chimera_intercept::Aspect>
            )
        }
    };

    Ok(expanded)
}

fn parse_aspect_args(input: &DeriveInput) -> Result<AspectArgs> {
    let mut args = AspectArgs {
        name: None,
        scope: Scope::Singleton,
        order: None,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("aspect") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                args.name = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("scope") {
                let value: LitStr = meta.value()?.parse()?;
                args.scope = match value.value().as_str() {
                    "singleton" => Scope::Singleton,
                    "per_resolution" | "prototype" => Scope::PerResolution,
                    other => {
                        return Err(Error::new_spanned(
                            &value,
                            format!(
                                "unknown aspect scope '{}', expected \"singleton\" or \"per_resolution\"",
                                other
                            ),
                        ))
                    }
                };
                Ok(())
            } else if meta.path.is_ident("order") {
                args.order = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported aspect attribute, expected `name`, `scope` or `order`"))
            }
        })?;
    }

    Ok(args)
}

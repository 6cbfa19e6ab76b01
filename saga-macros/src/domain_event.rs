use crate::utils::{MacroArgs, apply_derives};
use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashMap;
use syn::spanned::Spanned;
use syn::{Item, LitInt, LitStr, parse_macro_input};

/// #[domain_event] 宏实现
/// - 仅支持枚举；具名、元组、单元变体均可
/// - 合并/追加派生：Debug, Clone, PartialEq, Serialize, Deserialize
/// - 生成 `::saga_domain::event::DomainEvent` 实现（event_type/event_version）
/// - 枚举级：`#[domain_event(version = N)]` 默认载荷版本（缺省 1）
/// - 变体级：`#[event(event_type = "...", event_version = N)]` 覆写类型名与版本
///
/// 事件类型名默认为 `EnumName.Variant`，它是重放时分派到处理逻辑的唯一依据，
/// 因此一经持久化便不应再修改。
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = match MacroArgs::parse(attr.into(), &["version"]) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };
    let default_version: LitInt = match args.int_lit("version") {
        Ok(v) => v.unwrap_or_else(|| syn::parse_quote! { 1 }),
        Err(err) => return err.to_compile_error().into(),
    };

    let mut input = parse_macro_input!(item as Item);
    let enum_item = match &mut input {
        Item::Enum(e) => e,
        other => {
            return syn::Error::new(
                other.span(),
                "#[domain_event] can only be used on enum types",
            )
            .to_compile_error()
            .into();
        }
    };

    if enum_item.variants.is_empty() {
        return syn::Error::new(
            enum_item.span(),
            "#[domain_event] requires at least one variant",
        )
        .to_compile_error()
        .into();
    }

    apply_derives(
        &mut enum_item.attrs,
        vec![
            syn::parse_quote!(Debug),
            syn::parse_quote!(Clone),
            syn::parse_quote!(PartialEq),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
        ],
    );

    let mut variant_types: HashMap<String, LitStr> = HashMap::new();
    let mut variant_versions: HashMap<String, LitInt> = HashMap::new();

    for v in &mut enum_item.variants {
        let mut retained = Vec::new();
        for attr in &v.attrs {
            if !attr.path().is_ident("event") {
                retained.push(attr.clone());
                continue;
            }
            let parsed = MacroArgs::from_attribute(attr, &["event_type", "event_version"])
                .and_then(|a| Ok((a.str_lit("event_type")?, a.int_lit("event_version")?)));
            match parsed {
                Ok((ty, version)) => {
                    let key = v.ident.to_string();
                    if let Some(ty) = ty {
                        if variant_types.insert(key.clone(), ty).is_some() {
                            return syn::Error::new(
                                attr.span(),
                                "duplicate 'event_type' specified for this variant",
                            )
                            .to_compile_error()
                            .into();
                        }
                    }
                    if let Some(version) = version {
                        if variant_versions.insert(key, version).is_some() {
                            return syn::Error::new(
                                attr.span(),
                                "duplicate 'event_version' specified for this variant",
                            )
                            .to_compile_error()
                            .into();
                        }
                    }
                }
                Err(err) => return err.to_compile_error().into(),
            }
        }
        v.attrs = retained;
    }

    let enum_ident = &enum_item.ident;
    let enum_name = enum_ident.to_string();
    let (impl_generics, ty_generics, where_clause) = enum_item.generics.split_for_impl();

    let type_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        let key = v_ident.to_string();
        let lit = variant_types
            .get(&key)
            .cloned()
            .unwrap_or_else(|| LitStr::new(&format!("{enum_name}.{key}"), v_ident.span()));
        quote! { Self::#v_ident { .. } => #lit }
    });

    let version_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        let lit = variant_versions
            .get(&v_ident.to_string())
            .unwrap_or(&default_version);
        quote! { Self::#v_ident { .. } => #lit }
    });

    let out = quote! {
        #enum_item

        impl #impl_generics ::saga_domain::event::DomainEvent for #enum_ident #ty_generics #where_clause {
            fn event_type(&self) -> &'static str {
                match self { #( #type_arms, )* }
            }

            fn event_version(&self) -> usize {
                match self { #( #version_arms, )* }
            }
        }
    };

    TokenStream::from(out)
}

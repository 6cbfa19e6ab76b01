use crate::utils::{MacroArgs, apply_derives};
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, LitStr, parse_macro_input};

/// #[message] 宏实现
/// - 支持结构体与枚举
/// - 合并/追加派生：Debug, Clone, Serialize, Deserialize
/// - 生成 `::saga_domain::message::Message` 实现，`NAME` 缺省为类型名，
///   可通过 `#[message(name = "...")]` 指定稳定名称（用于日志与路由）
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let name = match MacroArgs::parse(attr.into(), &["name"]).and_then(|a| a.str_lit("name")) {
        Ok(name) => name,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut input = parse_macro_input!(item as Item);
    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];

    let (ident, generics) = match &mut input {
        Item::Struct(st) => {
            apply_derives(&mut st.attrs, required);
            (st.ident.clone(), st.generics.clone())
        }
        Item::Enum(en) => {
            apply_derives(&mut en.attrs, required);
            (en.ident.clone(), en.generics.clone())
        }
        other => {
            return syn::Error::new(other.span(), "#[message] only supports struct or enum")
                .to_compile_error()
                .into();
        }
    };

    if !generics.params.is_empty() {
        return syn::Error::new(generics.span(), "#[message] does not support generics")
            .to_compile_error()
            .into();
    }

    let name = name.unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));

    let out = quote! {
        #input

        impl ::saga_domain::message::Message for #ident {
            const NAME: &'static str = #name;
        }
    };

    TokenStream::from(out)
}

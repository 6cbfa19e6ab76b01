use crate::utils::{MacroArgs, apply_derives};
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, parse_macro_input};

/// #[value_object] 宏实现
/// - 支持结构体（具名或 tuple）与枚举
/// - 合并/追加派生：Default, Clone, (Debug 可控), Serialize, Deserialize, PartialEq, Eq
/// - 参数：
///   - `debug = true|false`，默认 true
///   - `copy = true|false`，默认 false，开启后追加 Copy
///   - `ordered = true|false`，默认 false，开启后追加 PartialOrd, Ord, Hash
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = match MacroArgs::parse(attr.into(), &["debug", "copy", "ordered"]) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };
    let mut input = parse_macro_input!(item as Item);

    let flags = (|| -> syn::Result<(bool, bool, bool)> {
        Ok((
            args.bool_flag("debug")?.unwrap_or(true),
            args.bool_flag("copy")?.unwrap_or(false),
            args.bool_flag("ordered")?.unwrap_or(false),
        ))
    })();
    let (debug, copy, ordered) = match flags {
        Ok(flags) => flags,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut required: Vec<syn::Path> = Vec::new();
    if debug {
        required.push(syn::parse_quote!(Debug));
    }
    required.extend([
        syn::parse_quote!(Default),
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
    ]);
    if copy {
        required.push(syn::parse_quote!(Copy));
    }
    if ordered {
        required.extend([
            syn::parse_quote!(PartialOrd),
            syn::parse_quote!(Ord),
            syn::parse_quote!(Hash),
        ]);
    }

    match &mut input {
        Item::Struct(st) => {
            apply_derives(&mut st.attrs, required);
            TokenStream::from(quote! { #st })
        }
        Item::Enum(en) => {
            apply_derives(&mut en.attrs, required);
            TokenStream::from(quote! { #en })
        }
        other => syn::Error::new(other.span(), "#[value_object] only supports struct or enum")
            .to_compile_error()
            .into(),
    }
}

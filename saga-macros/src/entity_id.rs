use crate::utils::{MacroArgs, apply_derives};
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, Type, parse_macro_input};

/// #[entity_id] 宏实现
/// 仅支持形如 `struct OrderId(String);` 的单字段 tuple struct：
/// - 参数 `owner = Type` 必填，将标识绑定到唯一的实体类型
/// - 合并/追加派生：Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash
/// - 生成 new(value)、Display、FromStr（拒绝空值）、AsRef<str>、From<X> for String
/// - 生成 `::saga_domain::identity::EntityId` 实现
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let owner: Type = match MacroArgs::parse(attr.into(), &["owner"]).and_then(|a| a.ty("owner"))
    {
        Ok(Some(ty)) => ty,
        Ok(None) => {
            return syn::Error::new(
                proc_macro2::Span::call_site(),
                "#[entity_id] requires `owner = EntityType`",
            )
            .to_compile_error()
            .into();
        }
        Err(err) => return err.to_compile_error().into(),
    };

    let input = parse_macro_input!(item as Item);
    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[entity_id] only on struct")
                .to_compile_error()
                .into();
        }
    };

    match &st.fields {
        syn::Fields::Unnamed(f) if f.unnamed.len() == 1 => {}
        _ => {
            return syn::Error::new(
                st.span(),
                "#[entity_id] supports only tuple struct with one field, e.g., struct X(String);",
            )
            .to_compile_error()
            .into();
        }
    }

    if !st.generics.params.is_empty() {
        return syn::Error::new(st.generics.span(), "#[entity_id] does not support generics")
            .to_compile_error()
            .into();
    }

    apply_derives(
        &mut st.attrs,
        vec![
            syn::parse_quote!(Clone),
            syn::parse_quote!(Debug),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
            syn::parse_quote!(PartialEq),
            syn::parse_quote!(Eq),
            syn::parse_quote!(Hash),
        ],
    );

    let ident = &st.ident;

    let out = quote! {
        #st

        impl #ident {
            pub fn new(value: impl ::core::convert::Into<::std::string::String>) -> Self {
                Self(value.into())
            }
        }

        impl ::saga_domain::identity::EntityId for #ident {
            type Owner = #owner;

            fn from_value(value: ::std::string::String) -> Self {
                Self(value)
            }

            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::str::FromStr for #ident {
            type Err = ::saga_domain::error::DomainError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                if s.trim().is_empty() {
                    return ::std::result::Result::Err(
                        ::saga_domain::error::DomainError::InvalidIdentity {
                            reason: ::std::format!("{} must not be empty", ::std::stringify!(#ident)),
                        },
                    );
                }
                ::std::result::Result::Ok(Self(s.to_owned()))
            }
        }

        impl ::std::fmt::Display for #ident {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::convert::AsRef<str> for #ident {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl ::core::convert::From<#ident> for ::std::string::String {
            fn from(value: #ident) -> Self {
                value.0
            }
        }
    };

    TokenStream::from(out)
}

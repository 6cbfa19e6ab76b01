use quote::ToTokens;
use std::collections::HashSet;
use syn::parse::Parser;
use syn::spanned::Spanned;
use syn::{
    Attribute, Expr, Lit, LitInt, LitStr, MetaNameValue, Path, Token, Type,
    punctuated::Punctuated,
};

/// 宏参数：形如 `key = value, ...` 的键值列表
///
/// 统一负责重复键与未知键的校验，各宏只关心取值。
pub(crate) struct MacroArgs {
    pairs: Vec<MetaNameValue>,
}

impl MacroArgs {
    /// 解析属性宏参数（`#[xxx(...)]` 括号内的部分）
    pub(crate) fn parse(tokens: proc_macro2::TokenStream, allowed: &[&str]) -> syn::Result<Self> {
        let pairs = Punctuated::<MetaNameValue, Token![,]>::parse_terminated.parse2(tokens)?;
        Self::validate(pairs.into_iter().collect(), allowed)
    }

    /// 解析变体/字段上的辅助属性，例如 `#[event(event_type = "...")]`
    pub(crate) fn from_attribute(attr: &Attribute, allowed: &[&str]) -> syn::Result<Self> {
        let pairs =
            attr.parse_args_with(Punctuated::<MetaNameValue, Token![,]>::parse_terminated)?;
        Self::validate(pairs.into_iter().collect(), allowed)
    }

    fn validate(pairs: Vec<MetaNameValue>, allowed: &[&str]) -> syn::Result<Self> {
        let mut seen = HashSet::new();
        for pair in &pairs {
            let key = key_of(&pair.path)?;
            if !allowed.contains(&key.as_str()) {
                let expected = allowed
                    .iter()
                    .map(|k| format!("'{k}'"))
                    .collect::<Vec<_>>()
                    .join(" | ");
                return Err(syn::Error::new(
                    pair.path.span(),
                    format!("unknown key '{key}'; expected {expected}"),
                ));
            }
            if !seen.insert(key.clone()) {
                return Err(syn::Error::new(
                    pair.path.span(),
                    format!("duplicate key '{key}' in attribute"),
                ));
            }
        }
        Ok(Self { pairs })
    }

    fn get(&self, key: &str) -> Option<&Expr> {
        self.pairs
            .iter()
            .find(|p| p.path.is_ident(key))
            .map(|p| &p.value)
    }

    pub(crate) fn bool_flag(&self, key: &str) -> syn::Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Expr::Lit(syn::ExprLit {
                lit: Lit::Bool(b), ..
            })) => Ok(Some(b.value())),
            Some(other) => Err(syn::Error::new(
                other.span(),
                format!("expected boolean literal for '{key}'"),
            )),
        }
    }

    pub(crate) fn str_lit(&self, key: &str) -> syn::Result<Option<LitStr>> {
        match self.get(key) {
            None => Ok(None),
            Some(Expr::Lit(syn::ExprLit {
                lit: Lit::Str(s), ..
            })) => Ok(Some(s.clone())),
            Some(other) => Err(syn::Error::new(
                other.span(),
                format!("expected string literal for '{key}'"),
            )),
        }
    }

    pub(crate) fn int_lit(&self, key: &str) -> syn::Result<Option<LitInt>> {
        match self.get(key) {
            None => Ok(None),
            Some(Expr::Lit(syn::ExprLit {
                lit: Lit::Int(i), ..
            })) => Ok(Some(i.clone())),
            Some(other) => Err(syn::Error::new(
                other.span(),
                format!("expected integer literal for '{key}'"),
            )),
        }
    }

    pub(crate) fn ty(&self, key: &str) -> syn::Result<Option<Type>> {
        match self.get(key) {
            None => Ok(None),
            Some(expr) => syn::parse2::<Type>(expr.to_token_stream()).map(Some),
        }
    }
}

fn key_of(path: &Path) -> syn::Result<String> {
    path.get_ident()
        .map(|i| i.to_string())
        .ok_or_else(|| syn::Error::new(path.span(), "invalid attribute key"))
}

// 提取非 derive 属性与已有 derive 列表
pub(crate) fn split_derives(attrs: &[Attribute]) -> (Vec<Attribute>, Vec<Path>) {
    let mut retained = Vec::new();
    let mut existing = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("derive") {
            if let Ok(list) = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)
            {
                existing.extend(list);
            }
        } else {
            retained.push(attr.clone());
        }
    }
    (retained, existing)
}

// 归一化 derive 的 key，避免 Serialize/serde::Serialize 重复
fn derive_key(p: &Path) -> String {
    match p.segments.last() {
        Some(last) => last.ident.to_string(),
        None => p.to_token_stream().to_string(),
    }
}

/// 合并默认派生与用户已写的派生（去重，required 在前）
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<Path>) {
    let (retained, existing) = split_derives(attrs);

    let mut seen = HashSet::new();
    let merged: Vec<Path> = required
        .into_iter()
        .chain(existing)
        .filter(|p| seen.insert(derive_key(p)))
        .collect();

    let derive: Attribute = syn::parse_quote!(#[derive(#(#merged),*)]);
    *attrs = std::iter::once(derive).chain(retained).collect();
}

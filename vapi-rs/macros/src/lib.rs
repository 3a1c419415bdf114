//! Attribute macro for vapi. Put `#[service]` on an inherent `impl` block to implement
//! `vapi_core::Receiver` for the type.
//!
//! A method becomes a handler when it is `pub` and has the shape
//! `fn name(&self, ctx: &RequestContext, args: &Args, reply: &mut Reply) -> Result<(), E>`
//! (`args` may also be `&mut Args`; aliases such as `io::Result<()>` work). Its remote name is the PascalCase form of the Rust
//! name (`get_user` → `GetUser`). Every other item is left alone and not exposed.
//! The generated code refers to `::vapi_core`, so the crate must be a direct dependency.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, FnArg, GenericArgument, ImplItem, ImplItemFn, ItemImpl, PathArguments,
    ReturnType, Type, Visibility,
};

#[proc_macro_attribute]
pub fn service(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    if !attr.is_empty() {
        let attr = TokenStream2::from(attr);
        return syn::Error::new_spanned(attr, "#[service] takes no arguments")
            .to_compile_error()
            .into();
    }
    if let Some((_, path, _)) = &input.trait_ {
        return syn::Error::new_spanned(path, "#[service] must be placed on an inherent impl block")
            .to_compile_error()
            .into();
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let specs: Vec<TokenStream2> = input
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(f) => handler_spec(f),
            _ => None,
        })
        .collect();

    let expanded = quote! {
        #input

        impl #impl_generics ::vapi_core::Receiver for #self_ty #where_clause {
            fn methods() -> ::std::vec::Vec<::vapi_core::MethodSpec<Self>> {
                ::std::vec![#(#specs),*]
            }
        }
    };
    TokenStream::from(expanded)
}

/// Spec constructor for a qualifying method; `None` skips it.
fn handler_spec(f: &ImplItemFn) -> Option<TokenStream2> {
    if !matches!(f.vis, Visibility::Public(_)) {
        return None;
    }
    let sig = &f.sig;
    if sig.asyncness.is_some() || sig.unsafety.is_some() || !sig.generics.params.is_empty() {
        return None;
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none() => {}
        _ => return None,
    }
    let typed: Vec<&Type> = inputs
        .map(|arg| match arg {
            FnArg::Typed(pat) => Some(&*pat.ty),
            FnArg::Receiver(_) => None,
        })
        .collect::<Option<_>>()?;
    let [ctx, args, reply] = typed.as_slice() else {
        return None;
    };

    let (ctx_ty, ctx_mut) = reference(ctx)?;
    if ctx_mut || last_ident(ctx_ty)? != "RequestContext" {
        return None;
    }
    let (args_ty, _) = reference(args)?;
    let (reply_ty, reply_mut) = reference(reply)?;
    if !reply_mut || !returns_unit_result(&sig.output) {
        return None;
    }

    let ident = &sig.ident;
    let name = pascal_case(&ident.to_string());
    Some(quote! {
        ::vapi_core::MethodSpec::new(
            #name,
            |receiver: &Self,
             ctx: &::vapi_core::RequestContext,
             args: &mut #args_ty,
             reply: &mut #reply_ty| receiver.#ident(ctx, args, reply),
        )
    })
}

/// Referenced type and whether the reference is `&mut`.
fn reference(ty: &Type) -> Option<(&Type, bool)> {
    match ty {
        Type::Reference(r) => Some((&*r.elem, r.mutability.is_some())),
        Type::Paren(p) => reference(&p.elem),
        _ => None,
    }
}

fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// `-> Result<(), ..>`, or an alias whose name ends in `Result` with `()` as first argument.
fn returns_unit_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    let Type::Path(p) = &**ty else {
        return false;
    };
    let Some(last) = p.path.segments.last() else {
        return false;
    };
    if !last.ident.to_string().ends_with("Result") {
        return false;
    }
    let PathArguments::AngleBracketed(generics) = &last.arguments else {
        return false;
    };
    matches!(
        generics.args.first(),
        Some(GenericArgument::Type(Type::Tuple(t))) if t.elems.is_empty()
    )
}

/// `get_user` → `GetUser`, `r#type` → `Type`.
fn pascal_case(name: &str) -> String {
    name.trim_start_matches("r#")
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

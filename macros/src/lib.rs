use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{ItemFn, LitStr, parse_macro_input, spanned::Spanned};

/// Exports a function as a C ABI entry point of the shim.
///
/// `fn foo` becomes `#[unsafe(no_mangle)] extern "C" fn shim_foo` and is
/// registered in `crate::symbols::SHIM_SYMBOLS` under the name `foo`, or
/// under the name given as a string argument:
///
/// ```ignore
/// #[shim_symbol("ptsname_r")]
/// pub fn ptsname_into(fd: libc::c_int, buf: *mut libc::c_char, len: libc::size_t) -> libc::c_int {
///     // implementation
/// }
/// ```
///
/// Generic and `async` functions have no C ABI and are rejected.
#[proc_macro_attribute]
pub fn shim_symbol(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let export = if attr.is_empty() {
        None
    } else {
        Some(parse_macro_input!(attr as LitStr))
    };

    let sig = &input.sig;
    if !sig.generics.params.is_empty() {
        return syn::Error::new(sig.generics.span(), "shim entry points cannot be generic")
            .to_compile_error()
            .into();
    }
    if let Some(asyncness) = &sig.asyncness {
        return syn::Error::new(asyncness.span(), "shim entry points cannot be async")
            .to_compile_error()
            .into();
    }

    let vis = &input.vis;
    let block = &input.block;
    let attrs = &input.attrs;
    let inputs = &sig.inputs;
    let output = &sig.output;

    let rust_name = &sig.ident;
    let shim_name = format_ident!("shim_{}", rust_name);
    let posix_name = export
        .map(|lit| lit.value())
        .unwrap_or_else(|| rust_name.to_string());
    let entry_name = format_ident!("_SHIM_SYM_{}", rust_name.to_string().to_uppercase());

    quote! {
        #(#attrs)*
        #[unsafe(no_mangle)]
        #vis extern "C" fn #shim_name(#inputs) #output #block

        #[linkme::distributed_slice(crate::symbols::SHIM_SYMBOLS)]
        static #entry_name: crate::symbols::Symbol = crate::symbols::Symbol {
            name: #posix_name,
            addr: crate::symbols::FnPtr(#shim_name as *const ()),
        };
    }
    .into()
}

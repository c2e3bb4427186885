use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Ident, ItemFn, LitStr};

const USAGE: &str = "rxpattern_macro::test only accepts: #[rxpattern_macro::test], \
                     #[rxpattern_macro::test(local)], #[rxpattern_macro::test(shared)], or \
                     string equivalents";

/// Test attribute shared by every test in the crate.
///
/// Sync functions become plain `#[test]`s. Async functions run on tokio:
/// `local` (the default) uses the current-thread runtime, so `Rc` based
/// subjects can be held across awaits, `shared` uses the multi-thread
/// runtime for message center and shared subject tests.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  let is_async = input.sig.asyncness.is_some();
  let raw_args = proc_macro2::TokenStream::from(attr);

  if !is_async {
    if !raw_args.is_empty() {
      return TokenStream::from(
        syn::Error::new(
          raw_args.span(),
          "rxpattern_macro::test flavor args are only supported for async tests. Use \
           #[rxpattern_macro::test] for sync tests, or make the function async.",
        )
        .to_compile_error(),
      );
    }
    return TokenStream::from(quote! {
      #[test]
      #input
    });
  }

  let flavor = if raw_args.is_empty() {
    "local".to_string()
  } else if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
    ident.to_string()
  } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
    lit.value()
  } else {
    return TokenStream::from(syn::Error::new(raw_args.span(), USAGE).to_compile_error());
  };

  let tokio_args = match flavor.as_str() {
    "local" => quote!(flavor = "current_thread"),
    "shared" => quote!(flavor = "multi_thread"),
    _ => return TokenStream::from(syn::Error::new(raw_args.span(), USAGE).to_compile_error()),
  };

  TokenStream::from(quote! {
    #[tokio::test(#tokio_args)]
    #input
  })
}

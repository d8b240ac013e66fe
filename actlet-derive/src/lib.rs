use quote::quote;

/// Implements `actlet::Message` together with `actlet::Action` or
/// `actlet::Signal`.
///
/// A message with a `#[reply(T)]` (or `#[reply("T")]`) attribute becomes an
/// `Action` whose reply type is `T`.  An empty `#[reply()]` means an `Action`
/// replying `()`.  Without the attribute, the message becomes a `Signal`.
#[proc_macro_derive(Message, attributes(reply))]
pub fn message_derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &syn::DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ty_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (reply_type, message_trait) =
        match input.attrs.iter().find(|attr| attr.path().is_ident("reply")) {
            Some(attr) => (parse_reply_type(attr)?, quote!(actlet::Action)),
            None => (quote!(()), quote!(actlet::Signal)),
        };

    Ok(quote! {
        impl #impl_generics actlet::Message for #ty_name #ty_generics #where_clause {
            type Reply = #reply_type;
        }

        impl #impl_generics #message_trait for #ty_name #ty_generics #where_clause {}
    })
}

fn parse_reply_type(attr: &syn::Attribute) -> syn::Result<proc_macro2::TokenStream> {
    let tokens = match attr.meta {
        syn::Meta::Path(_) => return Ok(quote!(())),
        _ => attr.parse_args::<proc_macro2::TokenStream>()?,
    };
    if tokens.is_empty() {
        return Ok(quote!(()));
    }
    // Accept both `#[reply(T)]` and the string form `#[reply("T")]`.
    let ty: syn::Type = match syn::parse2::<syn::LitStr>(tokens.clone()) {
        Ok(lit) => lit.parse()?,
        Err(_) => syn::parse2(tokens)?,
    };
    Ok(quote!(#ty))
}

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

mod record_field;
use record_field::parse_fields;

/// Derives `crate::record::FlatRecord`, exposing every numeric field as a
/// `(name, f64)` pair in declaration order.
///
/// `#[record(skip)]` leaves a field out, `#[record(rename = "...")]` changes
/// its key.
#[proc_macro_derive(FlatRecord, attributes(record))]
pub fn derive_flat_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let fields = match parse_fields(&input) {
        Ok(fields) => fields,
        Err(e) => return e.write_errors().into(),
    };

    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let keys: Vec<String> = fields.iter().filter_map(|f| f.key()).collect();

    let pairs = fields.iter().filter_map(|f| {
        let ident = f.ident.as_ref()?;
        let key = f.key()?;
        let value = value_expr(ident, &f.ty);
        Some(quote! { (#key, #value) })
    });

    let expanded = quote! {
        impl #impl_generics crate::record::FlatRecord for #struct_name #ty_generics #where_clause {
            fn field_names() -> &'static [&'static str] {
                &[#(#keys),*]
            }

            fn fields(&self) -> Vec<(&'static str, f64)> {
                vec![#(#pairs),*]
            }
        }
    };

    TokenStream::from(expanded)
}

/// Numeric fields cast to `f64`; bools become 0.0 / 1.0.
fn value_expr(ident: &syn::Ident, ty: &syn::Type) -> proc_macro2::TokenStream {
    let type_str = quote!(#ty).to_string();
    if type_str == "bool" {
        quote! { if self.#ident { 1.0 } else { 0.0 } }
    } else {
        quote! { self.#ident as f64 }
    }
}

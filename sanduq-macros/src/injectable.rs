//! Expansion of `#[derive(Injectable)]`.

use darling::{FromDeriveInput, FromField, ast};
use proc_macro2::TokenStream;
use quote::quote;
use sanduq_support::naming::is_valid_name;
use syn::ext::IdentExt;
use syn::{DeriveInput, Generics, Ident, Type};

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), supports(struct_named, struct_unit))]
struct InjectableInput {
    ident: Ident,
    generics: Generics,
    data: ast::Data<(), InjectField>,
    #[darling(default)]
    name: Option<String>,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    name: Option<String>,
    #[darling(default)]
    default: bool,
    #[darling(default)]
    property: bool,
}

pub fn expand(input: &DeriveInput) -> darling::Result<TokenStream> {
    let input = InjectableInput::from_derive_input(input)?;
    let krate = quote!(::sanduq);
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = input
        .data
        .as_ref()
        .take_struct()
        .ok_or_else(|| darling::Error::unsupported_shape("enum"))?
        .fields;

    let mut errors = darling::Error::accumulator();
    let mut parameters = Vec::new();
    let mut properties = Vec::new();
    let mut inits = Vec::new();
    let mut arms = Vec::new();

    for field in fields {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let point = field_ident.unraw().to_string();
        let ty = &field.ty;

        let mut spec = quote!(#krate::ParamSpec::of::<#ty>(#point));
        if let Some(name) = &field.name {
            if !is_valid_name(name) {
                errors.push(darling::Error::custom("entry name must be non-empty and not padded with whitespace").with_span(field_ident));
            }
            spec = quote!(#spec.hinted(#name));
        }

        if field.property {
            if field.default {
                errors.push(darling::Error::custom("properties always start from their default; drop `default`").with_span(field_ident));
            }
            properties.push(spec);
            inits.push(quote!(#field_ident: ::core::default::Default::default()));
            arms.push(quote! {
                #point => {
                    self.#field_ident = #krate::introspect::convert(
                        &<Self as #krate::Injectable>::class_name(),
                        point,
                        value,
                    )?;
                    ::core::result::Result::Ok(())
                }
            });
        } else if field.default {
            parameters.push(quote!(#spec.with_default()));
            inits.push(quote!(#field_ident: args.take_or_default(#point)?));
        } else {
            parameters.push(spec);
            inits.push(quote!(#field_ident: args.take(#point)?));
        }
    }

    let class_name = match &input.name {
        Some(name) if !is_valid_name(name) => {
            errors.push(darling::Error::custom("class name must be non-empty and not padded with whitespace").with_span(ident));
            None
        }
        Some(name) => Some(quote! {
            fn class_name() -> ::std::string::String {
                ::std::string::String::from(#name)
            }
        }),
        None => None,
    };
    errors.finish()?;

    let inject = (!arms.is_empty()).then(|| {
        quote! {
            fn properties() -> ::std::vec::Vec<#krate::ParamSpec> {
                ::std::vec![#(#properties),*]
            }

            fn inject(&mut self, point: &str, value: #krate::Instance) -> #krate::Result<()> {
                match point {
                    #(#arms)*
                    _ => ::core::result::Result::Err(#krate::SanduqError::unknown_point(
                        &<Self as #krate::Injectable>::class_name(),
                        point,
                    )),
                }
            }
        }
    });

    // Generic classes cannot be submitted statically; register them by hand.
    let registration = input.generics.params.is_empty().then(|| {
        quote! {
            #krate::inventory::submit! {
                #krate::ClassRegistration::of::<#ident>()
            }
        }
    });

    Ok(quote! {
        impl #impl_generics #krate::Injectable for #ident #ty_generics #where_clause {
            #class_name

            fn parameters() -> ::std::vec::Vec<#krate::ParamSpec> {
                ::std::vec![#(#parameters),*]
            }

            #[allow(unused_variables)]
            fn construct(args: &mut #krate::Arguments) -> #krate::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#inits),*
                })
            }

            #inject
        }

        #registration
    })
}

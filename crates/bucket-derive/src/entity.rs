use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    DataStruct, DeriveInput, Field, Fields, GenericArgument, LitStr, PathArguments, Result, Type,
};

pub(crate) fn generate_entity_for_struct(ast: &DeriveInput, data: &DataStruct) -> Result<TokenStream> {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let collection = parse_collection(ast)?;

    let fields = match &data.fields {
        Fields::Named(named) => &named.named,
        _ => {
            return Err(syn::Error::new_spanned(
                ast,
                "Only structs with named fields are supported",
            ))
        }
    };

    let mut id_field: Option<&Field> = None;
    for field in fields {
        for attr in &field.attrs {
            if !attr.path().is_ident("entity") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    if id_field.is_some() {
                        return Err(meta.error("Multiple id fields are not allowed"));
                    }
                    id_field = Some(field);
                    Ok(())
                } else {
                    Err(meta.error("Unknown entity field attribute"))
                }
            })?;
        }
    }

    let id_field = id_field.ok_or_else(|| {
        syn::Error::new_spanned(name, "Missing #[entity(id)] on the identifier field")
    })?;
    let id_ident = &id_field.ident;

    let (id_type, accessor) = match option_inner(&id_field.ty) {
        Some(inner) => (inner, quote! { self.#id_ident.as_ref() }),
        None => (&id_field.ty, quote! { ::core::option::Option::Some(&self.#id_ident) }),
    };

    Ok(quote! {
        impl #impl_generics ::bucket::Entity for #name #ty_generics #where_clause {
            type Id = #id_type;

            const COLLECTION: &'static str = #collection;

            fn id(&self) -> ::core::option::Option<&Self::Id> {
                #accessor
            }
        }
    })
}

fn parse_collection(ast: &DeriveInput) -> Result<LitStr> {
    let mut collection: Option<LitStr> = None;

    for attr in &ast.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                if collection.is_some() {
                    return Err(meta.error("Multiple collection attributes are not allowed"));
                }
                let s: LitStr = meta.value()?.parse()?;
                if s.value().trim().is_empty() {
                    return Err(syn::Error::new_spanned(&s, "Collection name must not be blank"));
                }
                collection = Some(s);
                Ok(())
            } else {
                Err(meta.error("Unknown entity attribute"))
            }
        })?;
    }

    collection.ok_or_else(|| {
        syn::Error::new_spanned(
            &ast.ident,
            "Missing #[entity(collection = \"...\")] attribute",
        )
    })
}

/// `T` when `ty` is `Option<T>` (also `std::option::Option<T>`).
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    if type_path.qself.is_some() {
        return None;
    }
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

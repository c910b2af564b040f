use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Error, Field, Fields, GenericArgument, PathArguments, Type, Visibility};

use crate::attrs::FieldAttrs;

// derive_record
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    let ident = &input.ident;
    let type_name = ident.unraw().to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Error::new_spanned(other, "Record can only be derived for structs with named fields")
                    .to_compile_error();
            }
        },
        _ => {
            return Error::new_spanned(ident, "Record can only be derived for structs with named fields")
                .to_compile_error();
        }
    };

    let mut descs = Vec::new();
    let mut mut_arms = Vec::new();
    let mut ref_arms = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let attrs = match FieldAttrs::parse(&field.attrs) {
            Ok(attrs) => attrs,
            Err(err) => return err.to_compile_error(),
        };
        let access = FieldAccess::classify(field, &attrs);

        descs.push(field_desc(index, field, &attrs, &access));
        if let Some((mut_arm, ref_arm)) = access_arms(index, field, &access) {
            mut_arms.push(mut_arm);
            ref_arms.push(ref_arm);
        }
    }

    quote! {
        impl #impl_generics ::reqbind::Record for #ident #ty_generics #where_clause {
            fn describe() -> ::reqbind::RecordType {
                ::reqbind::RecordType::new(#type_name, ::std::vec![#(#descs),*])
            }

            fn field_mut(&mut self, index: usize) -> ::core::option::Option<::reqbind::FieldMut<'_>> {
                match index {
                    #(#mut_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_ref(&self, index: usize) -> ::core::option::Option<::reqbind::FieldRef<'_>> {
                match index {
                    #(#ref_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    }
}

///
/// FieldAccess
///

enum FieldAccess<'a> {
    Leaf,
    /// Any serde type, filled by document decode only
    Document,
    Record,
    /// `Option<inner>` holding a record
    OptionalRecord(&'a Type),
    Opaque,
}

impl<'a> FieldAccess<'a> {
    fn classify(field: &'a Field, attrs: &FieldAttrs) -> Self {
        let exported = !matches!(field.vis, Visibility::Inherited);
        if attrs.skip || (!exported && !attrs.embed) {
            return FieldAccess::Opaque;
        }
        if attrs.embed || attrs.nested {
            return match option_inner(&field.ty) {
                Some(inner) => FieldAccess::OptionalRecord(inner),
                None => FieldAccess::Record,
            };
        }
        if attrs.document {
            return FieldAccess::Document;
        }
        FieldAccess::Leaf
    }
}

fn field_desc(index: usize, field: &Field, attrs: &FieldAttrs, access: &FieldAccess<'_>) -> TokenStream {
    let name = field
        .ident
        .as_ref()
        .map(|ident| ident.unraw().to_string())
        .unwrap_or_default();
    let exported = !matches!(field.vis, Visibility::Inherited);
    let embedded = attrs.embed;
    let ty = &field.ty;

    let tag_pairs = attrs.tags.iter().map(|(key, value)| quote! { (#key, #value) });

    let kind = match access {
        FieldAccess::Leaf => quote! {
            ::reqbind::FieldKind::Leaf(<#ty as ::reqbind::Leaf>::leaf_shape())
        },
        FieldAccess::Document => quote! {
            ::reqbind::FieldKind::Leaf(::reqbind::Shape::Document)
        },
        FieldAccess::Record => quote! {
            ::reqbind::FieldKind::Record(<#ty as ::reqbind::Record>::describe)
        },
        FieldAccess::OptionalRecord(inner) => quote! {
            ::reqbind::FieldKind::Pointer(::std::boxed::Box::new(
                ::reqbind::FieldKind::Record(<#inner as ::reqbind::Record>::describe),
            ))
        },
        FieldAccess::Opaque => quote! { ::reqbind::FieldKind::Opaque },
    };

    quote! {
        ::reqbind::FieldDesc {
            name: #name,
            index: #index,
            exported: #exported,
            embedded: #embedded,
            tags: ::reqbind::Tags::new(&[#(#tag_pairs),*]),
            kind: #kind,
        }
    }
}

fn access_arms(index: usize, field: &Field, access: &FieldAccess<'_>) -> Option<(TokenStream, TokenStream)> {
    let ident = field.ident.as_ref()?;
    let arms = match access {
        FieldAccess::Leaf => (
            quote! { #index => ::core::option::Option::Some(::reqbind::FieldMut::Leaf(&mut self.#ident)), },
            quote! { #index => ::core::option::Option::Some(::reqbind::FieldRef::Leaf(&self.#ident)), },
        ),
        FieldAccess::Document => (
            quote! { #index => ::core::option::Option::Some(::reqbind::FieldMut::Document(&mut self.#ident)), },
            quote! { #index => ::core::option::Option::Some(::reqbind::FieldRef::Document(&self.#ident)), },
        ),
        FieldAccess::Record => (
            quote! { #index => ::core::option::Option::Some(::reqbind::FieldMut::Record(&mut self.#ident)), },
            quote! { #index => ::core::option::Option::Some(::reqbind::FieldRef::Record(&self.#ident)), },
        ),
        FieldAccess::OptionalRecord(_) => (
            quote! {
                #index => ::core::option::Option::Some(::reqbind::FieldMut::Record(
                    self.#ident.get_or_insert_with(::core::default::Default::default),
                )),
            },
            quote! {
                #index => ::core::option::Option::Some(match self.#ident.as_ref() {
                    ::core::option::Option::Some(inner) => ::reqbind::FieldRef::Record(inner),
                    ::core::option::Option::None => ::reqbind::FieldRef::Absent,
                }),
            },
        ),
        FieldAccess::Opaque => return None,
    };
    Some(arms)
}

/// `T` when `ty` is `Option<T>`
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

//! Derive macro for component-dispatcher
//!
//! `#[derive(Component)]` writes the `Component` impl for a struct with
//! named fields:
//!
//! - `#[component(scope = "prototype")]` on the struct sets the lifecycle
//!   (`"singleton"` is the default).
//! - `#[dep]` fields (`Arc<T>` or `Option<Arc<T>>`) become constructor
//!   dependencies, in declaration order.
//! - `#[inject]` fields (`Inject<T>`) are filled after construction.
//! - Every other field starts as `Default::default()`.
//!
//! # Example
//!
//! ```rust,ignore
//! use component_dispatcher::{Component, Inject};
//! use std::sync::Arc;
//!
//! #[derive(Component)]
//! struct MessageService;
//!
//! #[derive(Component)]
//! #[component(scope = "prototype")]
//! struct RequestTimer {
//!     started: u64,
//! }
//!
//! #[derive(Component)]
//! struct HelloController {
//!     #[dep]
//!     messages: Arc<MessageService>,
//!     #[inject]
//!     timer: Inject<RequestTimer>,
//!     hits: std::sync::atomic::AtomicU64,
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Type, parse_macro_input};

/// Derive macro for the `Component` trait.
///
/// # Attributes
///
/// - `#[component(scope = "...")]` - `"singleton"` or `"prototype"`.
/// - `#[dep]` - Constructor dependency. Must be `Arc<T>` or `Option<Arc<T>>`.
/// - `#[inject]` - Field injection. Must be `Inject<T>`.
///
/// # Generated Code
///
/// ```rust,ignore
/// impl Component for HelloController {
///     type Dependencies = Arc<MessageService>;
///     fn create(__dep_0: Self::Dependencies) -> Self {
///         Self { messages: __dep_0, timer: Inject::new(), hits: Default::default() }
///     }
///     fn field_dependencies() -> Vec<FieldDependency> {
///         vec![FieldDependency::of::<RequestTimer>("timer")]
///     }
///     fn inject_fields(&self, container: &Container) -> Result<()> {
///         self.timer.inject(container, "HelloController", "timer")?;
///         Ok(())
///     }
/// }
/// ```
#[proc_macro_derive(Component, attributes(component, dep, inject))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let scope = match find_scope(&input.attrs)? {
        Some(scope) => {
            let variant = match scope.value().as_str() {
                "singleton" => quote! { Singleton },
                "prototype" => quote! { Prototype },
                _ => {
                    return Err(syn::Error::new_spanned(
                        scope,
                        "scope must be \"singleton\" or \"prototype\"",
                    ));
                }
            };
            quote! { const SCOPE: ::component_dispatcher::Scope = ::component_dispatcher::Scope::#variant; }
        }
        None => quote! {},
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Some(&fields.named),
            Fields::Unit => None,
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Component can only be derived for structs with named fields or unit structs",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Component can only be derived for structs",
            ));
        }
    };

    let mut dep_types = Vec::new();
    let mut dep_names = Vec::new();
    let mut field_inits = Vec::new();
    let mut field_deps = Vec::new();
    let mut injections = Vec::new();

    for field in fields.into_iter().flatten() {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_type = &field.ty;
        let field_str = field_name.to_string();

        match field_kind(&field.attrs) {
            FieldKind::Dep => {
                if extract_arc_inner_type(field_type).is_none()
                    && extract_option_arc_inner_type(field_type).is_none()
                {
                    return Err(syn::Error::new_spanned(
                        field_type,
                        "Fields marked with #[dep] must have type Arc<T> or Option<Arc<T>>",
                    ));
                }
                let dep_name = syn::Ident::new(&format!("__dep_{}", dep_names.len()), field_name.span());
                dep_types.push(quote! { #field_type });
                field_inits.push(quote! { #field_name: #dep_name });
                dep_names.push(dep_name);
            }
            FieldKind::Inject => {
                let Some(inner) = extract_wrapper_inner_type(field_type, "Inject") else {
                    return Err(syn::Error::new_spanned(
                        field_type,
                        "Fields marked with #[inject] must have type Inject<T>",
                    ));
                };
                field_inits.push(quote! {
                    #field_name: ::component_dispatcher::Inject::new()
                });
                field_deps.push(quote! {
                    ::component_dispatcher::FieldDependency::of::<#inner>(#field_str)
                });
                injections.push(quote! {
                    self.#field_name.inject(container, #name_str, #field_str)?;
                });
            }
            FieldKind::Plain => {
                field_inits.push(quote! {
                    #field_name: ::std::default::Default::default()
                });
            }
        }
    }

    let (deps_type, deps_pattern) = match dep_types.len() {
        0 => (quote! { () }, quote! { _ }),
        1 => {
            let ty = &dep_types[0];
            let name = &dep_names[0];
            (quote! { #ty }, quote! { #name })
        }
        _ => (
            quote! { (#(#dep_types),*) },
            quote! { (#(#dep_names),*) },
        ),
    };

    let construct = if fields.is_some() {
        quote! { Self { #(#field_inits),* } }
    } else {
        quote! { Self }
    };

    let injection = if injections.is_empty() {
        quote! {}
    } else {
        quote! {
            fn field_dependencies() -> ::std::vec::Vec<::component_dispatcher::FieldDependency> {
                ::std::vec![#(#field_deps),*]
            }

            fn inject_fields(
                &self,
                container: &::component_dispatcher::Container,
            ) -> ::component_dispatcher::Result<()> {
                #(#injections)*
                Ok(())
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::component_dispatcher::Component for #name #ty_generics #where_clause {
            #scope

            type Dependencies = #deps_type;

            fn create(#deps_pattern: Self::Dependencies) -> Self {
                #construct
            }

            #injection
        }
    })
}

enum FieldKind {
    Dep,
    Inject,
    Plain,
}

fn field_kind(attrs: &[Attribute]) -> FieldKind {
    for attr in attrs {
        if attr.path().is_ident("dep") {
            return FieldKind::Dep;
        }
        if attr.path().is_ident("inject") {
            return FieldKind::Inject;
        }
    }
    FieldKind::Plain
}

/// Parse `#[component(scope = "...")]`
fn find_scope(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut scope = None;
    for attr in attrs {
        if !attr.path().is_ident("component") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("scope") {
                scope = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported component attribute, expected `scope`"))
            }
        })?;
    }
    Ok(scope)
}

/// Extract T from Wrapper<T>
fn extract_wrapper_inner_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == wrapper {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

/// Extract T from Arc<T>
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_wrapper_inner_type(ty, "Arc")
}

/// Extract T from Option<Arc<T>>
fn extract_option_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_wrapper_inner_type(ty, "Option").and_then(extract_arc_inner_type)
}

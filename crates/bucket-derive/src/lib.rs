//! # Bucket Derive Macros
//!
//! ### `Entity`
//!
//! Derives `bucket::Entity` for structs with named fields.
//!
//! - **Container attribute**: `#[entity(collection = "...")]` (required)
//! - **Field attribute**: `#[entity(id)]` marks exactly one identifier field.
//!   An `Option<T>` field yields `Id = T` and reports `None` while unset.
//!   `#[serde(rename = "_id")]` only suits identifiers that serialize as
//!   their own string key, such as `String`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use bucket::Entity;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Entity)]
//! #[entity(collection = "offline_player")]
//! pub struct OfflinePlayer {
//!     #[entity(id)]
//!     #[serde(rename = "_id")]
//!     pub identifier: String,
//!     pub last_name: String,
//! }
//! ```

extern crate proc_macro;
mod entity;

use crate::entity::generate_entity_for_struct;
use proc_macro::TokenStream;
use syn::{Data, DeriveInput};

/// Derives the `Entity` trait.
///
/// # Errors
///
/// Returns a compile error if:
/// - `#[entity(collection = "...")]` is missing or blank
/// - No field, or more than one field, is marked `#[entity(id)]`
/// - Applied to an enum, union, or tuple struct
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    match ast.data {
        Data::Struct(ref data) => match generate_entity_for_struct(&ast, data) {
            Ok(token_stream) => token_stream.into(),
            Err(e) => e.to_compile_error().into(),
        },
        Data::Enum(_) | Data::Union(_) => syn::Error::new_spanned(
            &ast.ident,
            format!(
                "Cannot derive Entity for '{}': only structs with named fields are supported",
                ast.ident
            ),
        )
        .to_compile_error()
        .into(),
    }
}

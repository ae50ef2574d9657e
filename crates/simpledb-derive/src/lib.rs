//! Derive macros for simpledb
//!
//! Provides `#[derive(FromRow)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod from_row;

/// Derive `FromRow` for a struct with named fields.
///
/// Each field is read from the column with the same label. A column missing
/// from the result leaves the field at `Default::default()`, so every field
/// type must implement `Default`.
///
/// # Example
///
/// ```ignore
/// use simpledb::FromRow;
///
/// #[derive(Debug, Default, FromRow)]
/// #[orm(rename_all = "camelCase")]
/// struct Article {
///     id: i64,
///     title: String,
///     created_date: chrono::NaiveDateTime,
///     #[orm(column = "is_blind")]
///     hidden: bool,
///     #[orm(skip)]
///     rendered: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(rename_all = "...")]` (struct) - derive column labels from field
///   names: `camelCase`, `PascalCase`, `snake_case`, `SCREAMING_SNAKE_CASE`,
///   `kebab-case`
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(skip)]` - Never read; always `Default::default()`
#[proc_macro_derive(FromRow, attributes(orm))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

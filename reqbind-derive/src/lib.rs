use proc_macro::TokenStream;

mod attrs;
mod record;

/// Derive `reqbind::Record` for a struct with named fields.
///
/// Field attributes, all inside `#[tags(...)]`:
/// - `key = "value"`: a tag read by the binder (`bind`, `err_msg`, `json`, `validate`, ...)
/// - `nested`: the field is itself a `Record` (or `Option` of one)
/// - `embed`: like `nested`, and walked even when the field is not `pub`
/// - `document`: any serde type, filled by document decode only; bind tokens are ignored
/// - `skip`: never bound
#[proc_macro_derive(Record, attributes(tags))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input.into()).into()
}

use syn::{Attribute, Error, LitStr, Token};

///
/// FieldAttrs
///

#[derive(Default)]
pub struct FieldAttrs {
    pub tags: Vec<(String, String)>,
    pub embed: bool,
    pub nested: bool,
    /// Document-only value filled through serde
    pub document: bool,
    pub skip: bool,
}

impl FieldAttrs {
    /// Merge every `#[tags(...)]` attribute on a field
    pub fn parse(attrs: &[Attribute]) -> Result<Self, Error> {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("tags")) {
            attr.parse_nested_meta(|meta| {
                let key = meta
                    .path
                    .get_ident()
                    .map(ToString::to_string)
                    .ok_or_else(|| meta.error("expected a tag name"))?;

                if meta.input.peek(Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    out.tags.push((key, value.value()));
                    return Ok(());
                }

                match key.as_str() {
                    "embed" => out.embed = true,
                    "nested" => out.nested = true,
                    "document" => out.document = true,
                    "skip" => out.skip = true,
                    _ => {
                        return Err(meta.error(
                            "expected `key = \"value\"`, `embed`, `nested`, `document` or `skip`",
                        ))
                    }
                }
                Ok(())
            })?;
        }
        if out.document && (out.embed || out.nested) {
            if let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("tags")) {
                return Err(Error::new_spanned(attr, "`document` cannot be combined with `embed` or `nested`"));
            }
        }
        Ok(out)
    }
}

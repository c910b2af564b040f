//! Annotation parsing - `<expression>[,key=value]...`
//!
//! ```text
//! request.query.appkey,default=abc
//! └──── expression ──┘ └ modifiers ┘
//! ```
//!
//! Only the `default` modifier is interpreted. Unknown modifiers are ignored.

/// Bind annotation split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation<'a> {
    pub expression: &'a str,
    /// Raw value of the last `default=` modifier
    pub default: Option<&'a str>,
}

/// Text before the first `sep`, and the remainder after it
pub fn head(s: &str, sep: char) -> (&str, Option<&str>) {
    match s.split_once(sep) {
        Some((before, after)) => (before, Some(after)),
        None => (s, None),
    }
}

/// Split a bind annotation into expression and default value.
///
/// The default value runs to the next comma, so it cannot itself contain
/// commas; its first `=` separates key from value.
pub fn parse_annotation(tag: &str) -> Annotation<'_> {
    let (expression, modifiers) = head(tag, ',');
    let mut default = None;
    for modifier in modifiers.into_iter().flat_map(|m| m.split(',')) {
        let (key, value) = head(modifier, '=');
        if key == "default" {
            default = Some(value.unwrap_or(""));
        }
    }
    Annotation { expression, default }
}

/// Document key for a field from its document tag, `None` when excluded.
///
/// Empty names fall back to the field name; options after a comma
/// (`omitempty` and friends) are ignored.
pub fn document_key<'a>(tag: &'a str, field_name: &'a str) -> Option<&'a str> {
    let (name, _options) = head(tag, ',');
    match name {
        "-" => None,
        "" => Some(field_name),
        name => Some(name),
    }
}

//! Request-like data sources and the built-in `request` family
//!
//! - [`RequestLike`]: the capability surface operations may rely on
//! - [`DataSource`]: what `bind` accepts; a source may or may not be request-like
//! - [`RequestOperation`]: `request.path`, `request.query.<name>`, ...
//! - [`Request`] / [`RequestBuilder`]: owned request for callers and tests

mod family;
mod message;

use std::any::Any;

pub use family::{RequestOperation, REQUEST_FAMILY};
pub use message::{Request, RequestBuilder};

/// Read access to an HTTP request
pub trait RequestLike {
    /// Upper-case method, e.g. `POST`
    fn method(&self) -> &str;

    fn path(&self) -> &str;

    /// Query string without the leading `?`
    fn raw_query(&self) -> &str;

    /// All values of a header, matched case-insensitively
    fn header_values(&self, name: &str) -> Vec<&str>;

    /// Raw (still escaped) cookie value; `None` when absent
    fn cookie(&self, name: &str) -> Option<&str>;

    fn body(&self) -> &[u8];

    /// First `Content-Type` header, if any
    fn content_type(&self) -> Option<&str> {
        self.header_values("content-type").into_iter().next()
    }
}

/// Anything a binder can read from
pub trait DataSource {
    fn as_request(&self) -> Option<&dyn RequestLike> {
        None
    }

    /// Escape hatch for custom families with their own source types
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

/// The empty source: only operations that ignore the source can run
impl DataSource for () {}

/// Query-string unescape: `+` is a space, `%XX` a byte. Invalid escapes or
/// non-UTF-8 output give `None`.
pub fn query_unescape(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hi = bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16))?;
                let lo = bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16))?;
                out.push((hi * 16 + lo) as u8);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}

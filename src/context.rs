//! Per-call context
//!
//! Owned by exactly one bind call at a time (it is not `Clone` or shared).
//! Holds:
//! - the request cache: query and form maps, each parsed at most once per bind
//! - typed extensions that custom families may read or write
//!
//! Form bodies:
//! ```text
//! application/x-www-form-urlencoded  → parsed for POST, PUT and PATCH
//! multipart/form-data                → text parts only, file parts skipped
//! anything else                      → no form values
//! ```

use std::any::{Any, TypeId};
use std::convert::Infallible;

use bytes::Bytes;
use multer::{Constraints, Multipart, SizeLimit};
use rustc_hash::FxHashMap;
use url::form_urlencoded;

use crate::request::RequestLike;

type ParamMap = FxHashMap<String, Vec<String>>;

fn parse_params(input: &[u8]) -> ParamMap {
    let mut map = ParamMap::default();
    for (key, value) in form_urlencoded::parse(input) {
        map.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    map
}

/// Multipart bodies above this size are rejected
const MULTIPART_BODY_LIMIT: u64 = 32 << 20;

fn parse_multipart(body: &[u8], boundary: String) -> Result<ParamMap, multer::Error> {
    let chunk = Bytes::copy_from_slice(body);
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(chunk) });
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(MULTIPART_BODY_LIMIT));
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    futures::executor::block_on(async move {
        let mut map = ParamMap::default();
        while let Some(field) = multipart.next_field().await? {
            if field.file_name().is_some() {
                continue;
            }
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let value = field.text().await?;
            map.entry(name).or_default().push(value);
        }
        Ok(map)
    })
}

fn parse_form(request: &dyn RequestLike) -> ParamMap {
    let Some(content_type) = request.content_type() else {
        return ParamMap::default();
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();

    if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        if !matches!(request.method(), "POST" | "PUT" | "PATCH") {
            return ParamMap::default();
        }
        return parse_params(request.body());
    }

    if essence.eq_ignore_ascii_case("multipart/form-data") {
        let parsed = multer::parse_boundary(content_type).and_then(|boundary| parse_multipart(request.body(), boundary));
        return match parsed {
            Ok(map) => map,
            Err(err) => {
                tracing::debug!(error = %err, "Multipart form parse failed");
                ParamMap::default()
            }
        };
    }

    ParamMap::default()
}

/// Lazily parsed views of one request
#[derive(Debug, Default)]
pub struct RequestCache {
    query: Option<ParamMap>,
    form: Option<ParamMap>,
}

impl RequestCache {
    /// Every value of query parameter `name`
    pub fn query_values(&mut self, request: &dyn RequestLike, name: &str) -> Vec<String> {
        self.query
            .get_or_insert_with(|| parse_params(request.raw_query().as_bytes()))
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Every value of form parameter `name`
    pub fn form_values(&mut self, request: &dyn RequestLike, name: &str) -> Vec<String> {
        self.form
            .get_or_insert_with(|| parse_form(request))
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_query_parsed(&self) -> bool {
        self.query.is_some()
    }

    pub fn is_form_parsed(&self) -> bool {
        self.form.is_some()
    }
}

/// Type-keyed values attached to a call
#[derive(Default)]
pub struct Extensions {
    map: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Insert `value`, returning the previous value of the same type
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.map.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.map.get_mut(&TypeId::of::<T>())?.downcast_mut::<T>()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions").field("len", &self.map.len()).finish()
    }
}

/// State carried through one bind call
#[derive(Debug, Default)]
pub struct CallContext {
    requests: Option<RequestCache>,
    extensions: Extensions,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The request cache, created on first use
    pub fn request_cache(&mut self) -> &mut RequestCache {
        self.requests.get_or_insert_with(RequestCache::default)
    }

    pub fn has_request_cache(&self) -> bool {
        self.requests.is_some()
    }

    /// Forget parsed request views; extensions are kept
    pub fn reset_request_cache(&mut self) {
        self.requests = None;
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::request::Request;

    #[test]
    fn request_cache_is_lazy() {
        let mut cx = CallContext::new();
        assert!(!cx.has_request_cache());

        let request = Request::builder().query_param("a", "1").build();
        let cache = cx.request_cache();
        assert!(!cache.is_query_parsed());
        assert_eq!(cache.query_values(&request, "a"), ["1"]);
        assert!(cache.is_query_parsed());
        assert!(!cache.is_form_parsed());
        assert!(cx.has_request_cache());
    }

    /// Request that counts reads of its query string and body
    struct Counting {
        inner: Request,
        query_reads: Cell<usize>,
        body_reads: Cell<usize>,
    }

    impl RequestLike for Counting {
        fn method(&self) -> &str {
            self.inner.method()
        }

        fn path(&self) -> &str {
            self.inner.path()
        }

        fn raw_query(&self) -> &str {
            self.query_reads.set(self.query_reads.get() + 1);
            self.inner.raw_query()
        }

        fn header_values(&self, name: &str) -> Vec<&str> {
            self.inner.header_values(name)
        }

        fn cookie(&self, name: &str) -> Option<&str> {
            self.inner.cookie(name)
        }

        fn body(&self) -> &[u8] {
            self.body_reads.set(self.body_reads.get() + 1);
            self.inner.body()
        }
    }

    #[test]
    fn views_are_parsed_once() {
        let request = Counting {
            inner: Request::builder()
                .query_param("a", "1")
                .query_param("b", "2")
                .form_param("f", "x")
                .form_param("g", "y")
                .build(),
            query_reads: Cell::new(0),
            body_reads: Cell::new(0),
        };
        let mut cache = RequestCache::default();

        assert_eq!(cache.query_values(&request, "a"), ["1"]);
        assert_eq!(cache.query_values(&request, "b"), ["2"]);
        assert_eq!(cache.form_values(&request, "f"), ["x"]);
        assert_eq!(cache.form_values(&request, "g"), ["y"]);
        assert_eq!(request.query_reads.get(), 1);
        assert_eq!(request.body_reads.get(), 1);
    }

    #[test]
    fn reset_drops_views_but_keeps_extensions() {
        let mut cx = CallContext::new();
        cx.insert(7_u32);
        let first = Request::builder().query_param("a", "1").build();
        let second = Request::builder().query_param("a", "2").build();

        assert_eq!(cx.request_cache().query_values(&first, "a"), ["1"]);
        cx.reset_request_cache();
        assert!(!cx.has_request_cache());
        assert_eq!(cx.request_cache().query_values(&second, "a"), ["2"]);
        assert_eq!(cx.get::<u32>(), Some(&7));
    }

    #[test]
    fn form_requires_form_content_type() {
        let json = Request::builder()
            .method("POST")
            .header("Content-Type", "application/json")
            .body("uid=1")
            .build();
        assert!(RequestCache::default().form_values(&json, "uid").is_empty());

        let form = Request::builder()
            .method("POST")
            .header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .body("uid=1&uid=2")
            .build();
        assert_eq!(RequestCache::default().form_values(&form, "uid"), ["1", "2"]);
    }

    #[test]
    fn urlencoded_body_needs_a_body_method() {
        for method in ["GET", "DELETE", "HEAD"] {
            let request = Request::builder().method(method).form_param("uid", "1").build();
            assert!(RequestCache::default().form_values(&request, "uid").is_empty(), "{method}");
        }
        for method in ["POST", "PUT", "PATCH"] {
            let request = Request::builder().method(method).form_param("uid", "1").build();
            assert_eq!(RequestCache::default().form_values(&request, "uid"), ["1"], "{method}");
        }
    }

    #[test]
    fn multipart_text_parts_are_form_values() {
        let body = "--XX\r\n\
            Content-Disposition: form-data; name=\"uids\"\r\n\r\n7\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"uids\"\r\n\r\n8\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\nfile body\r\n\
            --XX--\r\n";
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "multipart/form-data; boundary=XX")
            .body(body)
            .build();

        let mut cache = RequestCache::default();
        assert_eq!(cache.form_values(&request, "uids"), ["7", "8"]);
        assert!(cache.form_values(&request, "upload").is_empty());
    }

    #[test]
    fn malformed_multipart_yields_no_values() {
        let request = Request::builder()
            .method("POST")
            .header("Content-Type", "multipart/form-data")
            .body("uids=7")
            .build();
        assert!(RequestCache::default().form_values(&request, "uids").is_empty());
    }

    #[test]
    fn extensions_by_type() {
        #[derive(Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut cx = CallContext::new();
        assert_eq!(cx.insert(Tenant("a")), None);
        assert_eq!(cx.insert(Tenant("b")), Some(Tenant("a")));
        assert_eq!(cx.get::<Tenant>(), Some(&Tenant("b")));
        assert_eq!(cx.get::<u32>(), None);
        assert_eq!(cx.extensions().len(), 1);
    }
}

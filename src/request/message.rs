//! Owned HTTP request

use std::any::Any;

use url::form_urlencoded;
use url::Url;

use super::{DataSource, RequestLike};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MULTIPART_BOUNDARY: &str = "reqbind-form-boundary";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    /// Raw query string, without `?`
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Request for a path-and-query or absolute URI, e.g. `/api/test?page=2`
    pub fn from_uri(method: impl Into<String>, uri: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse("http://localhost")?;
        let url = base.join(uri)?;
        Ok(Self {
            method: method.into(),
            path: url.path().to_string(),
            query: url.query().unwrap_or_default().to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

impl RequestLike for Request {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn raw_query(&self) -> &str {
        &self.query
    }

    fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// First cookie named `name` across all `Cookie` headers
    fn cookie(&self, name: &str) -> Option<&str> {
        self.header_values("cookie")
            .into_iter()
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| unquote(value))
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Strip one pair of surrounding double quotes
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

impl DataSource for Request {
    fn as_request(&self) -> Option<&dyn RequestLike> {
        Some(self)
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

/// Fluent construction of a [`Request`].
///
/// Form params produce a urlencoded body, multipart params a
/// `multipart/form-data` body. Either makes the default method `POST`.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    method: Option<String>,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    form: Vec<(String, String)>,
    multipart: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl RequestBuilder {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Cookie value is stored as given (escape it yourself if needed)
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn form_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    /// Text part of a `multipart/form-data` body; takes precedence over
    /// urlencoded form params
    pub fn multipart_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.multipart.push((name.into(), value.into()));
        self
    }

    /// Raw body; takes precedence over form params
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Request {
        let query = encode_pairs(&self.query);
        let mut headers = self.headers;

        if !self.cookies.is_empty() {
            let line = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            headers.push(("Cookie".to_string(), line));
        }

        let has_form = !self.form.is_empty() || !self.multipart.is_empty();
        let has_content_type = headers
            .iter()
            .any(|(key, _)| key.eq_ignore_ascii_case("content-type"));
        let (body, content_type) = match self.body {
            Some(body) => (body, None),
            None if !self.multipart.is_empty() => (
                encode_multipart(&self.multipart).into_bytes(),
                Some(format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}")),
            ),
            None if has_form => (
                encode_pairs(&self.form).into_bytes(),
                Some(FORM_CONTENT_TYPE.to_string()),
            ),
            None => (Vec::new(), None),
        };
        if let Some(content_type) = content_type.filter(|_| !has_content_type) {
            headers.push(("Content-Type".to_string(), content_type));
        }

        let method = self
            .method
            .unwrap_or_else(|| if has_form { "POST" } else { "GET" }.to_string());
        let path = if self.path.is_empty() {
            "/".to_string()
        } else {
            self.path
        };

        Request {
            method,
            path,
            query,
            headers,
            body,
        }
    }
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn encode_multipart(parts: &[(String, String)]) -> String {
    let mut body = String::new();
    for (name, value) in parts {
        body.push_str(&format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{MULTIPART_BOUNDARY}--\r\n"));
    body
}

//! The built-in `request` family
//!
//! | expression              | tokens                              |
//! |-------------------------|-------------------------------------|
//! | `request.path`          | the path, always one token          |
//! | `request.query.<name>`  | every value of the query parameter  |
//! | `request.form.<name>`   | every value of the form parameter   |
//! | `request.header.<name>` | every value of the header           |
//! | `request.cookie.<name>` | the unescaped cookie, if present    |

use crate::context::CallContext;
use crate::error::{BindError, SyntaxError};
use crate::registry::SourceOperation;

use super::{query_unescape, DataSource, RequestLike};

pub const REQUEST_FAMILY: &str = "request";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOperation {
    Path,
    Query(String),
    Form(String),
    Header(String),
    Cookie(String),
}

impl RequestOperation {
    /// Build from expression segments, `["request", op, param?]`
    pub fn parse(segments: &[&str]) -> Result<Self, SyntaxError> {
        let expression = segments.join(".");
        let Some(operation) = segments.get(1) else {
            return Err(SyntaxError::Arity {
                expression,
                expected: 2,
                actual: segments.len(),
            });
        };

        let expected = if *operation == "path" { 2 } else { 3 };
        let known = matches!(*operation, "path" | "query" | "form" | "header" | "cookie");
        if !known {
            return Err(SyntaxError::UnknownOperation {
                family: REQUEST_FAMILY.to_string(),
                operation: operation.to_string(),
            });
        }
        if segments.len() != expected {
            return Err(SyntaxError::Arity {
                expression,
                expected,
                actual: segments.len(),
            });
        }

        let param = segments.get(2).map(|s| s.to_string()).unwrap_or_default();
        Ok(match *operation {
            "path" => RequestOperation::Path,
            "query" => RequestOperation::Query(param),
            "form" => RequestOperation::Form(param),
            "header" => RequestOperation::Header(param),
            _ => RequestOperation::Cookie(param),
        })
    }

    fn request<'a>(&self, source: &'a dyn DataSource) -> Result<&'a dyn RequestLike, BindError> {
        source.as_request().ok_or_else(|| BindError::SourceMismatch {
            operation: self.name().to_string(),
            expected: "request",
        })
    }
}

impl SourceOperation for RequestOperation {
    fn name(&self) -> &str {
        match self {
            RequestOperation::Path => "request.path",
            RequestOperation::Query(_) => "request.query",
            RequestOperation::Form(_) => "request.form",
            RequestOperation::Header(_) => "request.header",
            RequestOperation::Cookie(_) => "request.cookie",
        }
    }

    fn fetch(&self, source: &dyn DataSource, cx: &mut CallContext) -> Result<Vec<String>, BindError> {
        let request = self.request(source)?;
        let tokens = match self {
            RequestOperation::Path => vec![request.path().to_string()],
            RequestOperation::Query(name) => cx.request_cache().query_values(request, name),
            RequestOperation::Form(name) => cx.request_cache().form_values(request, name),
            RequestOperation::Header(name) => request
                .header_values(name)
                .into_iter()
                .map(str::to_owned)
                .collect(),
            RequestOperation::Cookie(name) => request
                .cookie(name)
                .map(|raw| vec![query_unescape(raw).unwrap_or_default()])
                .unwrap_or_default(),
        };
        Ok(tokens)
    }
}

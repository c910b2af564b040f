//! Operation Registry - source families by name
//!
//! An expression `family.op.param` is split on `.`; the first segment picks
//! the family factory, which receives every segment and returns the
//! operation (or rejects the arity).

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::context::CallContext;
use crate::error::{BindError, SyntaxError};
use crate::request::{DataSource, RequestOperation, REQUEST_FAMILY};

/// Fetches raw string tokens for one field
pub trait SourceOperation: fmt::Debug + Send + Sync {
    /// Qualified name, e.g. `request.query`
    fn name(&self) -> &str;

    /// Raw tokens for the field; an empty list means "not present"
    fn fetch(&self, source: &dyn DataSource, cx: &mut CallContext) -> Result<Vec<String>, BindError>;
}

/// Builds an operation from the dot-separated segments of an expression
pub type OperationFactory =
    Arc<dyn Fn(&[&str]) -> Result<Arc<dyn SourceOperation>, SyntaxError> + Send + Sync>;

#[derive(Clone)]
pub struct Registry {
    families: FxHashMap<String, OperationFactory>,
}

impl Registry {
    /// Empty registry with no families
    pub fn new() -> Self {
        Self {
            families: FxHashMap::default(),
        }
    }

    /// Registry holding the built-in `request` family
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(REQUEST_FAMILY, |segments: &[&str]| {
            let op: Arc<dyn SourceOperation> = Arc::new(RequestOperation::parse(segments)?);
            Ok(op)
        });
        registry
    }

    /// Register `factory` under `name`, replacing any earlier family
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&[&str]) -> Result<Arc<dyn SourceOperation>, SyntaxError> + Send + Sync + 'static,
    {
        self.families.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, family: &str) -> bool {
        self.families.contains_key(family)
    }

    /// Build the operation for a bind expression (no modifiers)
    pub fn build(&self, expression: &str) -> Result<Arc<dyn SourceOperation>, SyntaxError> {
        let segments: Vec<&str> = expression.split('.').collect();
        let family = segments[0];
        let factory = self
            .families
            .get(family)
            .ok_or_else(|| SyntaxError::UnknownFamily {
                family: family.to_string(),
            })?;
        factory(&segments)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut families: Vec<_> = self.families.keys().collect();
        families.sort();
        f.debug_struct("Registry").field("families", &families).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(&'static str);

    impl SourceOperation for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch(&self, _source: &dyn DataSource, _cx: &mut CallContext) -> Result<Vec<String>, BindError> {
            Ok(vec![self.0.to_string()])
        }
    }

    #[test]
    fn builtins_resolve_request_family() {
        let registry = Registry::with_builtins();
        assert!(registry.contains("request"));
        let op = registry.build("request.query.page").unwrap();
        assert_eq!(op.name(), "request.query");
    }

    #[test]
    fn unknown_family_is_syntax_error() {
        let registry = Registry::with_builtins();
        let err = registry.build("grpc.meta.x").unwrap_err();
        assert_eq!(err, SyntaxError::UnknownFamily { family: "grpc".into() });
    }

    #[test]
    fn arity_rejected_by_family() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            registry.build("request.query"),
            Err(SyntaxError::Arity { expected: 3, actual: 2, .. })
        ));
        assert!(matches!(
            registry.build("request.path.extra"),
            Err(SyntaxError::Arity { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = Registry::new();
        registry.register("const", |_: &[&str]| {
            let op: Arc<dyn SourceOperation> = Arc::new(Fixed("first"));
            Ok(op)
        });
        registry.register("const", |_: &[&str]| {
            let op: Arc<dyn SourceOperation> = Arc::new(Fixed("second"));
            Ok(op)
        });

        let op = registry.build("const.any").unwrap();
        let tokens = op.fetch(&(), &mut CallContext::new()).unwrap();
        assert_eq!(tokens, vec!["second".to_string()]);
    }
}

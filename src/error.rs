//! Error types with fix suggestions
//!
//! Error code ranges:
//! - BIND-001-009: Structural errors (target layout)
//! - BIND-010-019: Annotation syntax errors
//! - BIND-020-029: Data source errors
//! - BIND-030-039: Coercion errors
//! - BIND-040-049: Validation errors
//! - BIND-050-059: Registration errors
//! - BIND-060-069: Options errors

use thiserror::Error;

use crate::coerce::CoercionError;
use crate::validate::ValidationErrors;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Rejection of a bind annotation by the registry or a family constructor.
///
/// During compilation these are logged and the field is left without an
/// operation; they only surface when calling [`crate::Registry::build`] directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unknown source family '{family}'")]
    UnknownFamily { family: String },

    #[error("unknown operation '{operation}' in family '{family}'")]
    UnknownOperation { family: String, operation: String },

    #[error("'{expression}' expects {expected} segments, got {actual}")]
    Arity {
        expression: String,
        expected: usize,
        actual: usize,
    },
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum BindError {
    // ─────────────────────────────────────────────────────────────
    // Structural (BIND-001)
    // ─────────────────────────────────────────────────────────────
    #[error("[BIND-001] cannot bind into '{record}': {reason}")]
    Structural { record: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Annotation / source / coercion (BIND-010 to BIND-030)
    // ─────────────────────────────────────────────────────────────
    #[error("[BIND-010] invalid bind annotation: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("[BIND-020] operation '{operation}' needs a {expected} data source")]
    SourceMismatch {
        operation: String,
        expected: &'static str,
    },

    #[error("[BIND-030] field '{namespace}': {source}")]
    Coercion {
        namespace: String,
        #[source]
        source: CoercionError,
    },

    // ─────────────────────────────────────────────────────────────
    // Validation (BIND-040) and custom messages
    // ─────────────────────────────────────────────────────────────
    #[error("[BIND-040] validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A validation failure replaced by the field's custom error message.
    /// Displays exactly the message.
    #[error("{message}")]
    Rejected { namespace: String, message: String },

    #[error("[BIND-050] invalid validation rule name '{name}'")]
    InvalidRule { name: String },

    #[error("[BIND-051] cannot register family '{family}': {cached} record plan(s) already compiled")]
    RegistrationClosed { family: String, cached: usize },

    #[error("[BIND-060] invalid binder options: {0}")]
    Options(#[from] serde_yaml::Error),
}

impl BindError {
    /// Namespace of the field the error is attached to, if any
    pub fn namespace(&self) -> Option<&str> {
        match self {
            BindError::Coercion { namespace, .. } | BindError::Rejected { namespace, .. } => {
                Some(namespace)
            }
            _ => None,
        }
    }
}

impl FixSuggestion for BindError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BindError::Structural { .. } => {
                Some("Derive Record instead of implementing it by hand, or check field_mut ordinals")
            }
            BindError::Syntax(_) => {
                Some("Use <family>.<operation>[.<name>][,default=<value>], e.g. request.query.page")
            }
            BindError::SourceMismatch { .. } => Some("Pass a Request (or another RequestLike source) to bind"),
            BindError::Coercion { .. } => Some("Check the raw value matches the field type, or add a default"),
            BindError::Validation(_) => Some("Fix the request so every validate rule holds"),
            BindError::Rejected { .. } => None,
            BindError::InvalidRule { .. } => Some("Rule names must be non-empty and contain no ',', '=' or '|'"),
            BindError::RegistrationClosed { .. } => {
                Some("Register every source family before the binder compiles or binds its first record")
            }
            BindError::Options(_) => Some("Check YAML syntax and option names in the binder options file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::Shape;

    #[test]
    fn rejected_displays_only_the_message() {
        let err = BindError::Rejected {
            namespace: "Params.bduss".into(),
            message: "please log in first".into(),
        };
        assert_eq!(err.to_string(), "please log in first");
        assert_eq!(err.namespace(), Some("Params.bduss"));
        assert!(err.fix_suggestion().is_none());
    }

    #[test]
    fn coercion_error_carries_code_and_namespace() {
        let err = BindError::Coercion {
            namespace: "Params.page".into(),
            source: CoercionError::new("abc", Shape::Int(64), "invalid digit found in string"),
        };
        let text = err.to_string();
        assert!(text.starts_with("[BIND-030]"));
        assert!(text.contains("Params.page"));
        assert!(text.contains("\"abc\""));
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn syntax_error_converts() {
        let err: BindError = SyntaxError::UnknownFamily { family: "grpc".into() }.into();
        assert!(err.to_string().contains("BIND-010"));
        assert!(err.to_string().contains("grpc"));
    }
}

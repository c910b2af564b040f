//! Validation - post-bind rule checks
//!
//! The binder treats validation as a black box behind [`StructValidator`].
//! [`TagValidator`] is the built-in one, driven by the validation tag:
//!
//! ```text
//! #[tags(validate = "required,min=1")]      all rules must hold
//! #[tags(validate = "omitempty,len=3")]     zero value skips the rest
//! #[tags(validate = "len=0|min=5")]         either alternative may hold
//! ```

mod rules;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::BindError;
use crate::plan::CompiledStruct;
use crate::record::{leaf_at, Record};

/// Checks a populated record
pub trait StructValidator: Send + Sync {
    fn validate_struct(&self, record: &dyn Record, plan: &CompiledStruct) -> Result<(), ValidationErrors>;
}

/// One violated rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub namespace: String,
    pub field: String,
    pub rule: String,
    pub param: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key: '{}' Error:Field validation for '{}' failed on the '{}' tag",
            self.namespace, self.field, self.rule
        )
    }
}

/// Every violation found in one record, in field order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub violations: Vec<FieldViolation>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// What a custom rule sees
#[derive(Debug)]
pub struct FieldLevel<'a> {
    pub namespace: &'a str,
    pub value: &'a Value,
    pub param: &'a str,
}

pub type RuleFn = Arc<dyn Fn(&FieldLevel<'_>) -> bool + Send + Sync>;

/// Rule-tag validator with the built-in rules plus custom ones
#[derive(Clone)]
pub struct TagValidator {
    tag: String,
    custom: FxHashMap<String, RuleFn>,
}

impl TagValidator {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            custom: FxHashMap::default(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Register a custom rule, replacing any rule of the same name
    /// (built-ins included)
    pub fn register<F>(&mut self, name: &str, rule: F) -> Result<(), BindError>
    where
        F: Fn(&FieldLevel<'_>) -> bool + Send + Sync + 'static,
    {
        let reserved = name == "omitempty";
        if name.is_empty() || reserved || name.contains([',', '=', '|']) {
            return Err(BindError::InvalidRule { name: name.to_string() });
        }
        self.custom.insert(name.to_string(), Arc::new(rule));
        Ok(())
    }

    /// Result of one `name[=param]` rule; `None` for unknown rules
    fn check(&self, namespace: &str, value: &Value, rule: &str) -> Option<bool> {
        let (name, param) = rule.split_once('=').unwrap_or((rule, ""));
        if let Some(custom) = self.custom.get(name) {
            return Some(custom(&FieldLevel { namespace, value, param }));
        }
        let outcome = rules::check(name, value, param);
        if outcome.is_none() {
            tracing::warn!(namespace, rule = name, "Skipping unknown validation rule");
        }
        outcome
    }

    /// First violated rule group of one field
    fn first_violation(&self, namespace: &str, value: &Value, spec: &str) -> Option<String> {
        for group in spec.split(',').map(str::trim).filter(|g| !g.is_empty()) {
            if group == "omitempty" {
                if rules::is_zero(value) {
                    return None;
                }
                continue;
            }
            let mut known = false;
            let mut passed = false;
            for alternative in group.split('|') {
                if let Some(outcome) = self.check(namespace, value, alternative) {
                    known = true;
                    if outcome {
                        passed = true;
                        break;
                    }
                }
            }
            if known && !passed {
                return Some(group.to_string());
            }
        }
        None
    }
}

impl Default for TagValidator {
    fn default() -> Self {
        Self::new("validate")
    }
}

impl fmt::Debug for TagValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules: Vec<_> = self.custom.keys().collect();
        rules.sort();
        f.debug_struct("TagValidator")
            .field("tag", &self.tag)
            .field("custom", &rules)
            .finish()
    }
}

impl StructValidator for TagValidator {
    /// Fields under an unallocated optional record are not checked
    fn validate_struct(&self, record: &dyn Record, plan: &CompiledStruct) -> Result<(), ValidationErrors> {
        let mut violations = Vec::new();
        for field in plan.fields() {
            let Some(spec) = field.tags.get(&self.tag) else {
                continue;
            };
            let Some(leaf) = leaf_at(record, &field.path) else {
                continue;
            };
            let value = leaf.snapshot();
            if let Some(group) = self.first_violation(&field.namespace, &value, spec) {
                let (rule, param) = if group.contains('|') {
                    (group.as_str(), "")
                } else {
                    group.split_once('=').unwrap_or((group.as_str(), ""))
                };
                violations.push(FieldViolation {
                    namespace: field.namespace.clone(),
                    field: field.field_name().to_string(),
                    rule: rule.to_string(),
                    param: param.to_string(),
                });
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { violations })
        }
    }
}

//! Binder options
//!
//! Loadable from YAML; every key is optional:
//! ```yaml
//! bind_tag: gbind
//! err_tag: err_msg
//! default_split: "-"
//! use_number: true
//! ```

use serde::Deserialize;

use crate::coerce::NumberMode;
use crate::error::BindError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinderOptions {
    /// Tag holding the bind annotation
    pub bind_tag: String,
    /// Tag holding the custom validation error message
    pub err_tag: String,
    /// Tag mapping a field into the whole document
    pub document_tag: String,
    /// Tag holding validation rules for the built-in validator
    pub validate_tag: String,
    /// Separator for splitting default values
    pub default_split: String,
    /// Keep exact integers in free-form document values
    pub use_number: bool,
}

impl Default for BinderOptions {
    fn default() -> Self {
        Self {
            bind_tag: "bind".to_string(),
            err_tag: "err_msg".to_string(),
            document_tag: "json".to_string(),
            validate_tag: "validate".to_string(),
            default_split: "|".to_string(),
            use_number: false,
        }
    }
}

impl BinderOptions {
    /// Parse from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, BindError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_bind_tag(mut self, tag: impl Into<String>) -> Self {
        self.bind_tag = tag.into();
        self
    }

    pub fn with_err_tag(mut self, tag: impl Into<String>) -> Self {
        self.err_tag = tag.into();
        self
    }

    pub fn with_document_tag(mut self, tag: impl Into<String>) -> Self {
        self.document_tag = tag.into();
        self
    }

    pub fn with_validate_tag(mut self, tag: impl Into<String>) -> Self {
        self.validate_tag = tag.into();
        self
    }

    pub fn with_default_split(mut self, separator: impl Into<String>) -> Self {
        self.default_split = separator.into();
        self
    }

    pub fn with_use_number(mut self, use_number: bool) -> Self {
        self.use_number = use_number;
        self
    }

    pub fn number_mode(&self) -> NumberMode {
        if self.use_number {
            NumberMode::Exact
        } else {
            NumberMode::Float
        }
    }
}

//! Binder - compiles record plans and executes them against a data source
//!
//! ```text
//! compile (cache miss) → document decode (if tagged) → field operations
//!                                                     → validation (optional)
//! ```
//! Tag-sourced values are applied after the document decode, so they win
//! for fields that have both.

use std::any::TypeId;
use std::sync::Arc;

use crate::context::CallContext;
use crate::document::decode_into;
use crate::error::{BindError, SyntaxError};
use crate::options::BinderOptions;
use crate::plan::{CompiledStruct, PlanCache};
use crate::record::{leaf_at_mut, Record};
use crate::registry::{Registry, SourceOperation};
use crate::request::DataSource;
use crate::validate::{FieldLevel, StructValidator, TagValidator};

pub struct Binder {
    options: BinderOptions,
    registry: Registry,
    cache: PlanCache,
    tag_validator: TagValidator,
    validator: Option<Box<dyn StructValidator>>,
}

impl Binder {
    /// Binder with default options and the `request` family
    pub fn new() -> Self {
        Self::with_options(BinderOptions::default())
    }

    pub fn with_options(options: BinderOptions) -> Self {
        Self {
            tag_validator: TagValidator::new(options.validate_tag.clone()),
            options,
            registry: Registry::with_builtins(),
            cache: PlanCache::new(),
            validator: None,
        }
    }

    pub fn options(&self) -> &BinderOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.cache
    }

    /// Register a source family, replacing one of the same name.
    ///
    /// Published plans are never replaced, so registration is refused once
    /// any record has been compiled.
    pub fn register_family<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), BindError>
    where
        F: Fn(&[&str]) -> Result<Arc<dyn SourceOperation>, SyntaxError> + Send + Sync + 'static,
    {
        let name = name.into();
        if !self.cache.is_empty() {
            return Err(BindError::RegistrationClosed {
                family: name,
                cached: self.cache.len(),
            });
        }
        self.registry.register(name, factory);
        Ok(())
    }

    /// Register a rule for the built-in validator
    pub fn register_validation<F>(&mut self, name: &str, rule: F) -> Result<(), BindError>
    where
        F: Fn(&FieldLevel<'_>) -> bool + Send + Sync + 'static,
    {
        self.tag_validator.register(name, rule)
    }

    /// Replace the built-in validator
    pub fn set_validator(&mut self, validator: impl StructValidator + 'static) {
        self.validator = Some(Box::new(validator));
    }

    /// Plan for `T`, compiled on first use
    pub fn compile<T: Record + 'static>(&self) -> Arc<CompiledStruct> {
        let key = TypeId::of::<T>();
        if let Some(plan) = self.cache.get(key) {
            return plan;
        }
        let ty = T::describe();
        let plan = CompiledStruct::compile(&ty, &self.registry, &self.options);
        tracing::debug!(
            record = plan.type_name(),
            fields = plan.len(),
            document = plan.needs_document_decode(),
            "Compiled record plan"
        );
        self.cache.publish(key, plan)
    }

    pub fn bind<T: Record + 'static>(&self, target: &mut T, source: &dyn DataSource) -> Result<(), BindError> {
        self.bind_in(&mut CallContext::new(), target, source, false)
    }

    pub fn bind_with_validate<T: Record + 'static>(
        &self,
        target: &mut T,
        source: &dyn DataSource,
    ) -> Result<(), BindError> {
        self.bind_in(&mut CallContext::new(), target, source, true)
    }

    /// Bind with a caller-owned context.
    ///
    /// Extensions carry over between calls; the request cache is reset at
    /// the start of every bind, so each call parses its own request.
    pub fn bind_in<T: Record + 'static>(
        &self,
        cx: &mut CallContext,
        target: &mut T,
        source: &dyn DataSource,
        validate: bool,
    ) -> Result<(), BindError> {
        cx.reset_request_cache();
        let plan = self.compile::<T>();

        if plan.needs_document_decode() {
            decode_into(target, &plan, source, self.options.number_mode());
        }

        for field in plan.fields() {
            let Some(operation) = &field.operation else {
                continue;
            };
            let tokens = operation.fetch(source, cx)?;
            tracing::trace!(
                namespace = %field.namespace,
                operation = operation.name(),
                tokens = tokens.len(),
                "Fetched field tokens"
            );

            let leaf = leaf_at_mut(target, &field.path).ok_or_else(|| BindError::Structural {
                record: plan.type_name().to_string(),
                reason: format!("path {:?} of '{}' does not reach a leaf", field.path, field.namespace),
            })?;
            leaf.apply_tokens(tokens, &field.default).map_err(|err| BindError::Coercion {
                namespace: field.namespace.clone(),
                source: err,
            })?;
        }

        if validate {
            self.validate(&*target, &plan)?;
        }
        Ok(())
    }

    /// Run the validator; the first violated field with a custom message
    /// replaces the whole error with that message
    fn validate(&self, target: &dyn Record, plan: &CompiledStruct) -> Result<(), BindError> {
        let validator: &dyn StructValidator = match &self.validator {
            Some(custom) => custom.as_ref(),
            None => &self.tag_validator,
        };
        let Err(errors) = validator.validate_struct(target, plan) else {
            return Ok(());
        };
        for violation in &errors.violations {
            if let Some(message) = plan.error_message(&violation.namespace) {
                return Err(BindError::Rejected {
                    namespace: violation.namespace.clone(),
                    message: message.to_string(),
                });
            }
        }
        Err(BindError::Validation(errors))
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("custom_validator", &self.validator.is_some())
            .finish()
    }
}

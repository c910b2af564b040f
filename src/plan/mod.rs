//! Plan Module - compiled, immutable binding plans per record type
//!
//! - `compile`: walks a [`RecordType`] once and produces a [`CompiledStruct`]
//! - `cache`: [`PlanCache`], lock-free snapshot reads keyed by `TypeId`
//!
//! Walk rules:
//! ```text
//! field not pub and not embedded  → skipped
//! Option<Record>                  → followed (allocated at bind time)
//! Record (nested or embedded)     → recurse, namespace += ".field"
//! Leaf                            → one FieldPlan
//! ```

mod cache;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::annotation::{document_key, parse_annotation};
use crate::coerce::{DefaultPolicy, Shape};
use crate::options::BinderOptions;
use crate::record::{FieldDesc, FieldKind, RecordType, Tags};
use crate::registry::{Registry, SourceOperation};

pub use cache::PlanCache;

/// How one leaf field is reached and populated
#[derive(Debug, Clone)]
pub struct FieldPlan {
    /// Dot-joined path, rooted at the record type name: `Params.Page.size`
    pub namespace: String,
    /// Field ordinals from the root record down to the leaf
    pub path: Vec<usize>,
    pub shape: Shape,
    /// Absent when the field has no bind annotation or it was rejected
    pub operation: Option<Arc<dyn SourceOperation>>,
    pub default: DefaultPolicy,
    /// Key chain into the decoded document; absent unless tagged
    pub document_path: Option<Vec<String>>,
    pub tags: Tags,
}

impl FieldPlan {
    /// Last namespace segment, the field's own name
    pub fn field_name(&self) -> &str {
        self.namespace
            .rsplit_once('.')
            .map_or(self.namespace.as_str(), |(_, name)| name)
    }
}

/// Immutable set of field plans for one record type
#[derive(Debug, Clone)]
pub struct CompiledStruct {
    type_name: &'static str,
    fields: Vec<FieldPlan>,
    index: FxHashMap<String, usize>,
    needs_document_decode: bool,
    error_messages: FxHashMap<String, String>,
}

impl CompiledStruct {
    /// Walk `ty` and resolve every bind annotation against `registry`
    pub fn compile(ty: &RecordType, registry: &Registry, options: &BinderOptions) -> Self {
        let mut compiler = Compiler {
            registry,
            options,
            plan: CompiledStruct {
                type_name: ty.name,
                fields: Vec::new(),
                index: FxHashMap::default(),
                needs_document_decode: false,
                error_messages: FxHashMap::default(),
            },
        };
        compiler.walk(ty, ty.name, &mut Vec::new(), Some(Vec::new()));
        compiler.plan
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Field plans in declaration order
    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    /// Plan for the leaf at `namespace`
    pub fn get(&self, namespace: &str) -> Option<&FieldPlan> {
        self.index.get(namespace).map(|&i| &self.fields[i])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn needs_document_decode(&self) -> bool {
        self.needs_document_decode
    }

    /// Custom error message declared on the field at `namespace`
    pub fn error_message(&self, namespace: &str) -> Option<&str> {
        self.error_messages.get(namespace).map(String::as_str)
    }
}

struct Compiler<'a> {
    registry: &'a Registry,
    options: &'a BinderOptions,
    plan: CompiledStruct,
}

impl Compiler<'_> {
    /// `document_prefix` is `None` once an ancestor excluded itself from
    /// the document with `-`
    fn walk(
        &mut self,
        ty: &RecordType,
        namespace: &str,
        path: &mut Vec<usize>,
        document_prefix: Option<Vec<String>>,
    ) {
        for field in &ty.fields {
            if !field.exported && !field.embedded {
                continue;
            }

            let mut kind = &field.kind;
            while let FieldKind::Pointer(inner) = kind {
                kind = inner;
            }

            let field_namespace = format!("{namespace}.{}", field.name);
            path.push(field.index);
            match kind {
                FieldKind::Opaque | FieldKind::Pointer(_) => {}
                FieldKind::Record(describe) => {
                    let prefix = self.nested_document_prefix(field, document_prefix.as_ref());
                    self.walk(&describe(), &field_namespace, path, prefix);
                }
                FieldKind::Leaf(shape) => {
                    let plan = self.leaf(field, shape, field_namespace, path, document_prefix.as_ref());
                    self.push(plan);
                }
            }
            path.pop();
        }
    }

    fn nested_document_prefix(&self, field: &FieldDesc, prefix: Option<&Vec<String>>) -> Option<Vec<String>> {
        let mut prefix = prefix?.clone();
        match field.tags.get(&self.options.document_tag) {
            Some(tag) => prefix.push(document_key(tag, field.name)?.to_string()),
            None if field.embedded => {}
            None => prefix.push(field.name.to_string()),
        }
        Some(prefix)
    }

    fn leaf(
        &mut self,
        field: &FieldDesc,
        shape: &Shape,
        namespace: String,
        path: &[usize],
        document_prefix: Option<&Vec<String>>,
    ) -> FieldPlan {
        let tags = field.tags;

        let document_path = tags.get(&self.options.document_tag).and_then(|tag| {
            self.plan.needs_document_decode = true;
            let key = document_key(tag, field.name)?;
            let mut chain = document_prefix?.clone();
            chain.push(key.to_string());
            Some(chain)
        });

        if let Some(message) = tags.get(&self.options.err_tag) {
            self.plan
                .error_messages
                .insert(namespace.clone(), message.to_string());
        }

        let mut operation = None;
        let mut default = DefaultPolicy::disabled(self.options.default_split.as_str());
        if let Some(raw) = tags.get(&self.options.bind_tag) {
            let annotation = parse_annotation(raw);
            if let Some(value) = annotation.default {
                default = DefaultPolicy::new(value, self.options.default_split.as_str());
            }
            match self.registry.build(annotation.expression) {
                Ok(op) => operation = Some(op),
                Err(err) => {
                    tracing::debug!(
                        namespace = %namespace,
                        annotation = raw,
                        error = %err,
                        "Ignoring unusable bind annotation"
                    );
                }
            }
        }

        FieldPlan {
            namespace,
            path: path.to_vec(),
            shape: shape.clone(),
            operation,
            default,
            document_path,
            tags,
        }
    }

    fn push(&mut self, plan: FieldPlan) {
        self.plan
            .index
            .insert(plan.namespace.clone(), self.plan.fields.len());
        self.plan.fields.push(plan);
    }
}

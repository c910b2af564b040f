//! Whole-document decode
//!
//! The request body is parsed as one JSON document; every leaf whose plan
//! carries a document path receives the value found there. Failures are
//! logged and never abort the bind.

use serde_json::Value;

use crate::coerce::NumberMode;
use crate::plan::CompiledStruct;
use crate::record::{leaf_at_mut, Record};
use crate::request::DataSource;

/// Decode the source's body onto the document-tagged leaves of `target`.
///
/// Returns the number of fields assigned.
pub fn decode_into(
    target: &mut dyn Record,
    plan: &CompiledStruct,
    source: &dyn DataSource,
    numbers: NumberMode,
) -> usize {
    let Some(request) = source.as_request() else {
        tracing::debug!(record = plan.type_name(), "Document decode skipped: source is not a request");
        return 0;
    };

    let document: Value = match serde_json::from_slice(request.body()) {
        Ok(document) => document,
        Err(err) => {
            tracing::debug!(record = plan.type_name(), error = %err, "Document decode failed");
            return 0;
        }
    };

    let mut assigned = 0;
    for field in plan.fields() {
        let Some(keys) = &field.document_path else {
            continue;
        };
        let Some(value) = lookup(&document, keys) else {
            continue;
        };
        let Some(leaf) = leaf_at_mut(target, &field.path) else {
            continue;
        };
        match leaf.set_document(value, numbers) {
            Ok(()) => assigned += 1,
            Err(err) => tracing::debug!(
                namespace = %field.namespace,
                error = %err,
                "Document value does not fit field"
            ),
        }
    }
    assigned
}

fn lookup<'a>(document: &'a Value, keys: &[String]) -> Option<&'a Value> {
    keys.iter().try_fold(document, |value, key| value.as_object()?.get(key))
}

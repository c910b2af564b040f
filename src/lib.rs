//! reqbind - bind request data into typed structs
//!
//! Fields declare where their value comes from with a tag expression:
//!
//! ```text
//! #[tags(bind = "request.query.page,default=1")]
//! pub page: u32,
//! ```
//!
//! Data flow:
//! ```text
//! #[derive(Record)] layout ─→ CompiledStruct (once per type, cached)
//!                                   ↓
//!   DataSource ─→ SourceOperation ─→ raw tokens ─→ coercion ─→ field
//!                                   ↓
//!                      optional validation + err_msg remap
//! ```

// Lets the derive's `::reqbind::` paths resolve inside this crate's own tests.
extern crate self as reqbind;

pub mod annotation;
pub mod binder;
pub mod coerce;
pub mod context;
pub mod document;
pub mod error;
pub mod options;
pub mod plan;
pub mod record;
pub mod registry;
pub mod request;
pub mod validate;

use once_cell::sync::Lazy;

pub use binder::Binder;
pub use coerce::{apply_tokens, CoercionError, DefaultPolicy, DocumentValue, Leaf, Scalar, Shape};
pub use context::{CallContext, Extensions, RequestCache};
pub use error::{BindError, FixSuggestion, SyntaxError};
pub use options::BinderOptions;
pub use plan::{CompiledStruct, FieldPlan, PlanCache};
pub use record::{FieldDesc, FieldKind, FieldMut, FieldRef, LeafMut, LeafRef, Record, RecordType, Tags};
pub use registry::{Registry, SourceOperation};
pub use request::{DataSource, Request, RequestBuilder, RequestLike, RequestOperation};
pub use validate::{FieldLevel, FieldViolation, StructValidator, TagValidator, ValidationErrors};

pub use reqbind_derive::Record;

/// Process-wide binder with default options and the `request` family
static DEFAULT_BINDER: Lazy<Binder> = Lazy::new(Binder::new);

/// The shared default binder used by [`bind`] and [`bind_with_validate`]
pub fn default_binder() -> &'static Binder {
    &DEFAULT_BINDER
}

/// Bind `source` into `target` using the default binder
pub fn bind<T: Record + 'static>(target: &mut T, source: &dyn DataSource) -> Result<(), BindError> {
    DEFAULT_BINDER.bind(target, source)
}

/// Bind, then run validation rules on the populated target
pub fn bind_with_validate<T: Record + 'static>(
    target: &mut T,
    source: &dyn DataSource,
) -> Result<(), BindError> {
    DEFAULT_BINDER.bind_with_validate(target, source)
}

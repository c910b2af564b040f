//! Record layout - the static description of a bindable struct
//!
//! `#[derive(Record)]` generates both halves:
//! - [`Record::describe`]: field names, visibility, embedding, tags and kinds
//! - [`Record::field_mut`] / [`Record::field_ref`]: access by declaration ordinal
//!
//! The plan compiler walks the description once per type; binding then
//! navigates to leaves by ordinal path.

use std::fmt;

use serde_json::Value;

use crate::coerce::{apply_tokens, CoercionError, DecodeError, DefaultPolicy, DocumentValue, Leaf, NumberMode, Shape};

/// Tag key/value pairs attached to a field, in declaration order
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Tags(pub &'static [(&'static str, &'static str)]);

impl Tags {
    pub const EMPTY: Tags = Tags(&[]);

    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Tags(pairs)
    }

    /// Value of the first tag named `key`
    pub fn get(&self, key: &str) -> Option<&'static str> {
        self.0.iter().find(|(name, _)| *name == key).map(|(_, value)| *value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter().map(|(k, v)| (k, v))).finish()
    }
}

/// What a field holds
#[derive(Clone)]
pub enum FieldKind {
    /// A bindable value
    Leaf(Shape),
    /// A nested record, described lazily
    Record(fn() -> RecordType),
    /// `Option<_>` around a nested record, allocated on navigation
    Pointer(Box<FieldKind>),
    /// Not reachable for binding (private or unsupported)
    Opaque,
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Leaf(shape) => write!(f, "Leaf({shape})"),
            FieldKind::Record(_) => f.write_str("Record(..)"),
            FieldKind::Pointer(inner) => write!(f, "Pointer({inner:?})"),
            FieldKind::Opaque => f.write_str("Opaque"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDesc {
    pub name: &'static str,
    /// Declaration ordinal, the argument to `field_mut`/`field_ref`
    pub index: usize,
    pub exported: bool,
    pub embedded: bool,
    pub tags: Tags,
    pub kind: FieldKind,
}

#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: &'static str,
    pub fields: Vec<FieldDesc>,
}

impl RecordType {
    pub fn new(name: &'static str, fields: Vec<FieldDesc>) -> Self {
        Self { name, fields }
    }
}

/// Mutable access to one field
pub enum FieldMut<'a> {
    Leaf(&'a mut dyn Leaf),
    /// Filled by document decode only
    Document(&'a mut dyn DocumentValue),
    Record(&'a mut dyn Record),
}

/// Shared access to one field
pub enum FieldRef<'a> {
    Leaf(&'a dyn Leaf),
    Document(&'a dyn DocumentValue),
    Record(&'a dyn Record),
    /// An unallocated `Option` record
    Absent,
}

/// Mutable endpoint of a field path
pub enum LeafMut<'a> {
    Leaf(&'a mut dyn Leaf),
    Document(&'a mut dyn DocumentValue),
}

impl LeafMut<'_> {
    /// Coerce tag-sourced tokens; document-only values ignore them
    pub fn apply_tokens(self, tokens: Vec<String>, policy: &DefaultPolicy) -> Result<(), CoercionError> {
        match self {
            LeafMut::Leaf(leaf) => apply_tokens(leaf, tokens, policy),
            LeafMut::Document(_) => Ok(()),
        }
    }

    pub fn set_document(self, value: &Value, numbers: NumberMode) -> Result<(), DecodeError> {
        match self {
            LeafMut::Leaf(leaf) => leaf.set_document(value, numbers),
            LeafMut::Document(document) => document.assign_document(value),
        }
    }
}

/// Shared endpoint of a field path
pub enum LeafRef<'a> {
    Leaf(&'a dyn Leaf),
    Document(&'a dyn DocumentValue),
}

impl LeafRef<'_> {
    pub fn snapshot(&self) -> Value {
        match self {
            LeafRef::Leaf(leaf) => leaf.snapshot(),
            LeafRef::Document(document) => document.document_snapshot(),
        }
    }
}

/// A struct the binder can populate. Derive it with `#[derive(Record)]`.
pub trait Record {
    fn describe() -> RecordType
    where
        Self: Sized;

    /// Field at declaration ordinal `index`. Optional nested records are
    /// allocated with their `Default` value.
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>>;

    fn field_ref(&self, index: usize) -> Option<FieldRef<'_>>;
}

/// Follow `path` through nested records down to a leaf
pub fn leaf_at_mut<'a>(record: &'a mut dyn Record, path: &[usize]) -> Option<LeafMut<'a>> {
    let (last, parents) = path.split_last()?;
    let mut current = record;
    for index in parents {
        match current.field_mut(*index)? {
            FieldMut::Record(next) => current = next,
            FieldMut::Leaf(_) | FieldMut::Document(_) => return None,
        }
    }
    match current.field_mut(*last)? {
        FieldMut::Leaf(leaf) => Some(LeafMut::Leaf(leaf)),
        FieldMut::Document(document) => Some(LeafMut::Document(document)),
        FieldMut::Record(_) => None,
    }
}

/// Read-only counterpart of [`leaf_at_mut`]; `None` when an optional
/// parent is unallocated
pub fn leaf_at<'a>(record: &'a dyn Record, path: &[usize]) -> Option<LeafRef<'a>> {
    let (last, parents) = path.split_last()?;
    let mut current = record;
    for index in parents {
        match current.field_ref(*index)? {
            FieldRef::Record(next) => current = next,
            FieldRef::Leaf(_) | FieldRef::Document(_) | FieldRef::Absent => return None,
        }
    }
    match current.field_ref(*last)? {
        FieldRef::Leaf(leaf) => Some(LeafRef::Leaf(leaf)),
        FieldRef::Document(document) => Some(LeafRef::Document(document)),
        FieldRef::Record(_) | FieldRef::Absent => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Record;

    #[derive(Record, Default)]
    struct Inner {
        #[tags(bind = "request.query.id")]
        pub id: i64,
    }

    #[derive(Record, Default)]
    struct Outer {
        pub name: String,
        #[tags(nested)]
        pub inner: Inner,
        #[tags(nested)]
        pub maybe: Option<Inner>,
        hidden: u8,
    }

    #[test]
    fn describe_lists_fields_in_order() {
        let ty = Outer::describe();
        assert_eq!(ty.name, "Outer");
        let names: Vec<_> = ty.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, ["name", "inner", "maybe", "hidden"]);
        assert!(!ty.fields[3].exported);
        assert!(matches!(ty.fields[3].kind, FieldKind::Opaque));
        assert!(matches!(ty.fields[2].kind, FieldKind::Pointer(_)));
    }

    #[test]
    fn tags_lookup() {
        let ty = Inner::describe();
        assert_eq!(ty.fields[0].tags.get("bind"), Some("request.query.id"));
        assert!(!ty.fields[0].tags.contains("json"));
    }

    #[test]
    fn leaf_at_mut_allocates_optional_parent() {
        let mut outer = Outer::default();
        assert!(leaf_at(&outer, &[2, 0]).is_none());

        let leaf = leaf_at_mut(&mut outer, &[2, 0]).unwrap();
        leaf.apply_tokens(vec!["9".to_string()], &DefaultPolicy::disabled("|")).unwrap();
        assert_eq!(outer.maybe.as_ref().map(|inner| inner.id), Some(9));
        assert_eq!(outer.hidden, 0);
    }

    #[test]
    fn leaf_at_rejects_record_endpoint() {
        let mut outer = Outer::default();
        assert!(leaf_at_mut(&mut outer, &[1]).is_none());
        assert!(leaf_at_mut(&mut outer, &[]).is_none());
        assert!(leaf_at_mut(&mut outer, &[3]).is_none());
    }
}

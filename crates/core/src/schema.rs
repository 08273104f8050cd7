//! Field descriptors and schemas (§3).

use crate::kind::ValueKind;
use std::collections::HashSet;
use std::fmt;

/// An immutable (name, kind, nullable) triple. Names are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    name: String,
    kind: ValueKind,
    nullable: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: ValueKind, nullable: bool) -> Self {
        FieldDescriptor {
            name: name.into(),
            kind,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}{}",
            self.name,
            self.kind,
            if self.nullable { "?" } else { "" }
        )
    }
}

/// An ordered sequence of field descriptors with unique names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Builds a schema, panicking if field names collide.
    ///
    /// Schemas are long-lived and built once at startup (§3 Lifecycle);
    /// a duplicate-name schema is a programming error, not a recoverable
    /// runtime condition, so this mirrors the teacher's resolver-level
    /// "collisions are a construction-time error" convention rather than
    /// returning a `Result` that every caller would have to thread through.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name()) {
                panic!("duplicate field name '{}' in schema", field.name());
            }
        }
        Schema { fields }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A stable, order-sensitive string used as a cache-key component
    /// (§4.10) and as a human-readable identity in log lines.
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            out.push_str(field.name());
            out.push(':');
            out.push_str(&field.kind().to_string());
            out.push(if field.nullable() { '1' } else { '0' });
            out.push(';');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::new("f0", ValueKind::Int32, true),
            FieldDescriptor::new("f1", ValueKind::Int32, true),
        ])
    }

    #[test]
    fn looks_up_fields_by_name() {
        let s = schema();
        assert_eq!(s.field_by_name("f1").unwrap().kind(), ValueKind::Int32);
        assert!(s.field_by_name("missing").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate field name")]
    fn rejects_duplicate_names() {
        Schema::new(vec![
            FieldDescriptor::new("f0", ValueKind::Int32, true),
            FieldDescriptor::new("f0", ValueKind::Utf8, true),
        ]);
    }

    #[test]
    fn fingerprint_is_stable_for_equal_schemas() {
        assert_eq!(schema().fingerprint(), schema().fingerprint());
    }
}

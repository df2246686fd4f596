// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory document trees.

use std::collections::BTreeMap;
use std::fmt;

use super::primitive_value::PrimitiveValue;

/// A document or a part of one: either a leaf value or an object keyed by sub-keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubDocument {
    Primitive(PrimitiveValue),
    Object(BTreeMap<PrimitiveValue, SubDocument>),
}

impl SubDocument {
    /// An empty object.
    pub fn object() -> Self {
        SubDocument::Object(BTreeMap::new())
    }

    pub fn is_object(&self) -> bool {
        matches!(self, SubDocument::Object(_))
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            SubDocument::Primitive(value) => Some(value),
            SubDocument::Object(_) => None,
        }
    }

    /// Returns the child at `subkey`, or `None` for leaves and missing children.
    pub fn child(&self, subkey: &PrimitiveValue) -> Option<&SubDocument> {
        match self {
            SubDocument::Object(children) => children.get(subkey),
            SubDocument::Primitive(_) => None,
        }
    }

    /// Sets a child, turning a leaf into an object first.
    pub fn set_child(&mut self, subkey: PrimitiveValue, child: SubDocument) {
        if let SubDocument::Primitive(_) = self {
            *self = SubDocument::object();
        }
        if let SubDocument::Object(children) = self {
            children.insert(subkey, child);
        }
    }

    /// Follows `path` from this node.
    pub fn get_path(&self, path: &[PrimitiveValue]) -> Option<&SubDocument> {
        path.iter().try_fold(self, |node, subkey| node.child(subkey))
    }
}

impl From<PrimitiveValue> for SubDocument {
    fn from(value: PrimitiveValue) -> Self {
        SubDocument::Primitive(value)
    }
}

impl fmt::Display for SubDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubDocument::Primitive(value) => write!(f, "{value}"),
            SubDocument::Object(children) if children.is_empty() => write!(f, "{{}}"),
            SubDocument::Object(children) => {
                write!(f, "{{ ")?;
                for (i, (subkey, child)) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{subkey}: {child}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_child_and_get_path() {
        let mut doc = SubDocument::object();
        let mut inner = SubDocument::Primitive(PrimitiveValue::Null);
        inner.set_child(PrimitiveValue::string("c"), PrimitiveValue::Int64(1).into());
        doc.set_child(PrimitiveValue::string("b"), inner);

        let path = [PrimitiveValue::string("b"), PrimitiveValue::string("c")];
        assert_eq!(
            doc.get_path(&path).and_then(SubDocument::as_primitive),
            Some(&PrimitiveValue::Int64(1))
        );
        assert!(doc.get_path(&[PrimitiveValue::string("x")]).is_none());
        assert!(doc.get_path(&[]).is_some_and(SubDocument::is_object));
    }

    #[test]
    fn test_display() {
        let mut doc = SubDocument::object();
        assert_eq!(doc.to_string(), "{}");
        doc.set_child(PrimitiveValue::string("a"), PrimitiveValue::Int64(5).into());
        assert_eq!(doc.to_string(), "{ \"a\": 5 }");
    }
}

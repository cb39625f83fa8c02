//! Schema-guided XML → JSON value conversion
//!
//! Every element is rendered as exactly one of three shapes, chosen from its
//! DTD declaration alone (never from what the document happens to contain):
//!
//! | occurrence            | declared children | shape  |
//! |-----------------------|-------------------|--------|
//! | one or more           | any               | List   |
//! | any                   | none              | Text   |
//! | required / optional   | some              | Object |
//! | zero or more          | some              | List   |
//! | none                  | some              | error  |
//!
//! Rows are checked top to bottom. Whitespace-only text between child
//! elements is ignored for List and Object; Text keeps everything verbatim.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::dtd::{DtdSchema, Occurrence};
use crate::error::{Error, Result};
use crate::xml::XmlElement;

/// Transcoded element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    /// Tag → value in document order. Keys are unique.
    Object(Vec<(String, Value)>),
    List(Vec<Value>),
}

impl Value {
    /// Compact JSON. Text serializes as a bare string, and so does a list
    /// holding exactly one Text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Value stored under `key`, if this is an object
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::List(items) if matches!(items.as_slice(), [Self::Text(_)]) => {
                items[0].serialize(serializer)
            }
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Render `element` and its subtree according to `schema`.
///
/// Fails on the first element that is undeclared or has an illegal shape;
/// nothing is ever coerced to text.
pub fn transcode(element: &XmlElement, schema: &DtdSchema) -> Result<Value> {
    let decl = schema
        .get(&element.name)
        .ok_or_else(|| Error::SchemaMissing {
            element: element.name.clone(),
        })?;

    match (decl.occurrence, decl.children.is_empty()) {
        (Occurrence::OneOrMore, _) | (Occurrence::ZeroOrMore, false) => {
            let items = element
                .child_elements()
                .map(|child| transcode(child, schema))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::List(items))
        }
        (_, true) => Ok(Value::Text(element.text())),
        (Occurrence::Required | Occurrence::Optional, false) => {
            let mut entries: Vec<(String, Value)> = Vec::new();
            for child in element.child_elements() {
                let value = transcode(child, schema)?;
                // A tag repeated under a singular declaration keeps its first
                // position and its last value.
                match entries.iter_mut().find(|(key, _)| *key == child.name) {
                    Some(slot) => slot.1 = value,
                    None => entries.push((child.name.clone(), value)),
                }
            }
            Ok(Value::Object(entries))
        }
        (Occurrence::None, false) => Err(Error::IllegalShape {
            element: element.name.clone(),
            occurrence: decl.occurrence,
            children: decl.children.len(),
        }),
    }
}

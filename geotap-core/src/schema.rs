//! Declared record schema for a stream.
//!
//! The declaration is a permissive superset: exposed fields accept any
//! scalar or object, and unexpected attributes flow into `features`.

use serde_json::{Map, Value, json};

use crate::config::ExposedFields;
use crate::record::{SDC_FILENAME, SDC_INCREMENTAL_KEY};

/// Family of records a stream produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// Features read through a vector driver.
    Vector,
    /// OpenStreetMap entities.
    Osm,
}

/// JSON Schema document describing a stream's records.
///
/// # Examples
/// ```
/// use geotap_core::{ExposedFields, SchemaKind, StreamSchema};
///
/// let exposed = ExposedFields::new(&["name".to_owned()], &[]);
/// let schema = StreamSchema::declare(&exposed, SchemaKind::Osm);
/// assert!(schema.property("name").is_some());
/// assert!(schema.property("members").is_some());
/// assert!(schema.property("geometry").is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSchema {
    kind: SchemaKind,
    document: Value,
}

impl StreamSchema {
    /// Declare the schema for `exposed` fields on a stream of `kind`.
    pub fn declare(exposed: &ExposedFields, kind: SchemaKind) -> Self {
        let mut properties = Map::new();
        for name in exposed.iter() {
            properties.insert(
                name.to_owned(),
                json!({"type": ["null", "string", "number", "object"]}),
            );
        }
        if kind == SchemaKind::Osm {
            properties.insert("id".to_owned(), json!({"type": ["null", "string", "number"]}));
            properties.insert("type".to_owned(), json!({"type": ["string", "null"]}));
            properties.insert(
                "members".to_owned(),
                json!({
                    "type": ["array", "null"],
                    "items": {"type": "object", "additionalProperties": true},
                }),
            );
        }
        properties.insert(
            "geometry".to_owned(),
            json!({"type": ["null", "string", "object"]}),
        );
        for slot in ["features", "metadata"] {
            properties.insert(
                slot.to_owned(),
                json!({"type": ["object", "null"], "additionalProperties": true}),
            );
        }
        properties.insert(
            SDC_INCREMENTAL_KEY.to_owned(),
            json!({"type": ["string", "null"], "format": "date-time"}),
        );
        properties.insert(SDC_FILENAME.to_owned(), json!({"type": ["string", "null"]}));

        Self {
            kind,
            document: json!({
                "type": "object",
                "additionalProperties": true,
                "properties": properties,
            }),
        }
    }

    /// Family of records described.
    pub const fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Full JSON Schema document.
    pub const fn as_json(&self) -> &Value {
        &self.document
    }

    /// Declaration of a single property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.document.get("properties")?.get(name)
    }

    /// Names of every declared property.
    pub fn property_names(&self) -> Vec<&str> {
        self.document
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| properties.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

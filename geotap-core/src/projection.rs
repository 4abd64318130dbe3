//! Field projection shared by every record producer.
//!
//! A raw attribute bag is split into promoted top-level fields and the
//! remainder that lands in the record's `features` slot.

use std::collections::{BTreeSet, HashMap};

use crate::config::{ExposedFields, StreamConfig};
use crate::record::Attributes;

/// Result of projecting one attribute bag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    /// Exposed attributes keyed by their lower-cased name.
    pub promoted: Attributes,
    /// Attributes that were neither promoted nor skipped.
    pub remainder: Attributes,
}

/// Splits attribute bags according to a stream's exposed and skipped fields.
///
/// Source keys match exposed names case-insensitively; promoted keys are
/// always the lower-cased exposed name. Names listed in the `reserved` slice
/// passed to [`FieldProjector::project`] are never promoted. A missing
/// exposed attribute is simply absent from the promoted set.
///
/// # Examples
/// ```
/// use geotap_core::{CORE_FIELDS, ExposedFields, FieldProjector};
/// use serde_json::json;
///
/// let projector = FieldProjector::new(
///     ExposedFields::new(&["name".to_owned()], &[]),
///     ["internal".to_owned()],
/// );
/// let bag = json!({"NAME": "X", "pop": 10, "internal": true});
/// let serde_json::Value::Object(bag) = bag else { unreachable!() };
///
/// let projection = projector.project(bag, &CORE_FIELDS);
/// assert_eq!(projection.promoted.get("name"), Some(&json!("X")));
/// assert_eq!(projection.remainder.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldProjector {
    exposed: ExposedFields,
    skip: BTreeSet<String>,
}

impl FieldProjector {
    /// Construct a projector from an exposed-field set and skipped names.
    pub fn new(exposed: ExposedFields, skip: impl IntoIterator<Item = String>) -> Self {
        Self {
            exposed,
            skip: skip.into_iter().collect(),
        }
    }

    /// Construct the projector described by a stream configuration.
    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.exposed_fields(), config.skip_fields.iter().cloned())
    }

    /// Exposed-field set used by this projector.
    pub const fn exposed(&self) -> &ExposedFields {
        &self.exposed
    }

    /// Project `bag`, never promoting a name found in `reserved`.
    pub fn project(&self, mut bag: Attributes, reserved: &[&str]) -> Projection {
        for name in &self.skip {
            bag.remove(name);
        }

        let lookup: HashMap<String, String> = bag
            .keys()
            .map(|key| (key.to_lowercase(), key.clone()))
            .collect();

        let mut promoted = Attributes::new();
        for name in self.exposed.iter() {
            if reserved.iter().any(|slot| slot.eq_ignore_ascii_case(name)) {
                continue;
            }
            if let Some(source_key) = lookup.get(name)
                && let Some(value) = bag.remove(source_key)
            {
                promoted.insert(name.to_owned(), value);
            }
        }

        Projection {
            promoted,
            remainder: bag,
        }
    }
}

//! Transitive inclusion of schema definitions.
//!
//! Starting from the names the routes reference, copy each definition out of the
//! [`SchemaLibrary`] and follow the named references found in its properties.

use crate::schema_library::SchemaLibrary;
use crate::type_resolver::SCHEMA_REF_PREFIX;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const COMPOSITION_KEYWORDS: [&str; 3] = ["anyOf", "oneOf", "allOf"];

/// Result of a closure computation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaClosure {
    /// Every reachable definition, keyed (and therefore sorted) by name
    pub schemas: BTreeMap<String, Value>,
    /// Referenced names the library does not define
    pub missing: Vec<String>,
}

/// Compute the set of definitions reachable from `roots`.
pub fn resolve_closure<'a, I>(roots: I, library: &SchemaLibrary) -> SchemaClosure
where
    I: IntoIterator<Item = &'a String>,
{
    let mut closure = SchemaClosure::default();
    let mut visited = BTreeSet::new();
    let mut frontier: Vec<String> = roots.into_iter().cloned().collect();
    // Popping from the end; reverse so roots are expanded in their given order.
    frontier.reverse();

    while let Some(name) = frontier.pop() {
        if !visited.insert(name.clone()) {
            continue;
        }

        let Some(definition) = library.get(&name) else {
            warn!("Schema {} is referenced but not defined", name);
            closure.missing.push(name);
            continue;
        };

        let references = property_references(definition);
        debug!("Including schema {} ({} references)", name, references.len());
        frontier.extend(
            references
                .into_iter()
                .rev()
                .filter(|reference| !visited.contains(reference)),
        );
        closure.schemas.insert(name, definition.clone());
    }

    closure
}

/// Named references carried by the properties of a definition.
///
/// A property contributes its own `$ref`, its array items' `$ref` and the `$ref` of every
/// member of an `anyOf`/`oneOf`/`allOf` list.
fn property_references(definition: &Value) -> Vec<String> {
    let Some(Value::Object(properties)) = definition.get("properties") else {
        return Vec::new();
    };

    let mut references = Vec::new();
    for property in properties.values() {
        references.extend(reference_name(property));
        if let Some(items) = property.get("items") {
            references.extend(reference_name(items));
        }
        for keyword in COMPOSITION_KEYWORDS {
            if let Some(Value::Array(members)) = property.get(keyword) {
                references.extend(members.iter().filter_map(reference_name));
            }
        }
    }
    references
}

fn reference_name(schema: &Value) -> Option<String> {
    schema
        .get("$ref")
        .and_then(Value::as_str)
        .map(|reference| reference.trim_start_matches(SCHEMA_REF_PREFIX).to_string())
}

//! Inheritance patching of compiled fragments.
//!
//! The fragment compiler does not follow `extends`: a compiled child only carries its own
//! properties. Before the schema library is loaded, every child fragment found through the
//! generated interfaces gets its parent's properties and required list merged in, and is
//! written back in place.

use crate::config::ProjectLayout;
use crate::error::{Error, Result};
use crate::scanner::FileScanner;
use log::{debug, info, warn};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

/// Captures the first parent only; `extends Parent, Capability` never merges the capability.
static EXTENDS_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"interface\s+(\w+)\s+extends\s+(\w+)").expect("valid extends pattern")
});

/// Outcome of one patch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritanceReport {
    /// Children whose fragment was rewritten, in patch order
    pub patched: Vec<String>,
    /// Children skipped because their fragment (or their parent's) was not compiled
    pub skipped: Vec<String>,
    /// Children left alone because their extends chain loops
    pub cyclic: Vec<String>,
}

/// Read the child → parent relation from the generated interface sources.
///
/// Only the first `extends` clause of a file counts.
pub fn find_extends_relations(schemas_dir: &Path) -> Result<BTreeMap<String, String>> {
    let result = FileScanner::with_extensions(schemas_dir.to_path_buf(), &["ts"]).scan()?;
    let mut relations = BTreeMap::new();
    for path in &result.files {
        let content = fs::read_to_string(path)?;
        if let Some(captures) = content.lines().find_map(|line| EXTENDS_MATCHER.captures(line)) {
            debug!("{} extends {} ({})", &captures[1], &captures[2], path.display());
            relations.insert(captures[1].to_string(), captures[2].to_string());
        }
    }
    Ok(relations)
}

/// Order children so every parent that is itself a child comes first.
///
/// Children within one level are sorted by name. The second list holds the children that
/// never become ready because their chain contains a cycle.
pub fn patch_order(relations: &BTreeMap<String, String>) -> (Vec<String>, Vec<String>) {
    let mut remaining: BTreeSet<&String> = relations.keys().collect();
    let mut order = Vec::new();

    loop {
        let ready: Vec<&String> = remaining
            .iter()
            .filter(|child| !remaining.contains(&relations[**child]))
            .copied()
            .collect();
        if ready.is_empty() {
            break;
        }
        for child in ready {
            remaining.remove(child);
            order.push(child.clone());
        }
    }

    (order, remaining.into_iter().cloned().collect())
}

/// Merge every parent into its children's compiled fragments.
pub fn patch_inheritance(layout: &ProjectLayout) -> Result<InheritanceReport> {
    let mut report = InheritanceReport::default();
    if !layout.schemas_dir.is_dir() {
        warn!(
            "Schema directory {} does not exist, nothing to patch",
            layout.schemas_dir.display()
        );
        return Ok(report);
    }

    let relations = find_extends_relations(&layout.schemas_dir)?;
    let (order, cyclic) = patch_order(&relations);
    for child in &cyclic {
        warn!("Not patching {}: its extends chain is cyclic", child);
    }
    report.cyclic = cyclic;

    for child in order {
        let parent = &relations[&child];
        if patch_child(layout, &child, parent)? {
            info!("Extending {} from {}", child, parent);
            report.patched.push(child);
        } else {
            report.skipped.push(child);
        }
    }

    Ok(report)
}

/// Patch one child fragment. Returns false when a fragment is missing.
fn patch_child(layout: &ProjectLayout, child: &str, parent: &str) -> Result<bool> {
    let child_path = layout.fragment_path(child);
    let parent_path = layout.fragment_path(parent);

    let (Some(mut child_document), Some(parent_document)) =
        (read_fragment(&child_path)?, read_fragment(&parent_path)?)
    else {
        warn!("Not patching {}: compiled fragment of {} or {} is missing", child, child, parent);
        return Ok(false);
    };

    let parent_definition = definition(&parent_document, parent, &parent_path)?.clone();
    let child_definition = definition_mut(&mut child_document, child, &child_path)?;
    merge_parent(child_definition, &parent_definition);

    let mut content = serde_json::to_string_pretty(&child_document)?;
    content.push('\n');
    fs::write(&child_path, content)?;
    Ok(true)
}

fn read_fragment(path: &Path) -> Result<Option<Value>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn invalid(path: &Path, name: &str) -> Error {
    Error::InvalidFragment {
        file: path.to_path_buf(),
        message: format!("no object at components.schemas.{}", name),
    }
}

fn definition<'a>(document: &'a Value, name: &str, path: &Path) -> Result<&'a Map<String, Value>> {
    document
        .get("components")
        .and_then(|components| components.get("schemas"))
        .and_then(|schemas| schemas.get(name))
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(path, name))
}

fn definition_mut<'a>(
    document: &'a mut Value,
    name: &str,
    path: &Path,
) -> Result<&'a mut Map<String, Value>> {
    document
        .get_mut("components")
        .and_then(|components| components.get_mut("schemas"))
        .and_then(|schemas| schemas.get_mut(name))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| invalid(path, name))
}

/// Copy parent properties the child lacks and append the parent's required names.
pub fn merge_parent(child: &mut Map<String, Value>, parent: &Map<String, Value>) {
    if let Some(Value::Object(parent_properties)) = parent.get("properties") {
        let properties = child
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(properties) = properties {
            for (name, property) in parent_properties {
                if !properties.contains_key(name) {
                    properties.insert(name.clone(), property.clone());
                }
            }
        }
    }

    let Some(Value::Array(parent_required)) = parent.get("required") else {
        return;
    };
    let required = child
        .entry("required")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(required) = required {
        for name in parent_required {
            if !required.contains(name) {
                required.push(name.clone());
            }
        }
    }
}

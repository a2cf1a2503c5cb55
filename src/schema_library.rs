//! The schema library: every named schema the document may reference.
//!
//! Two sources feed it:
//!
//! - compiled model fragments in the build directory, one JSON document per model with the
//!   layout `{"components": {"schemas": {"Name": {...}}}}`;
//! - `export enum` declarations in the schema tree.
//!
//! Compiled fragments carry compiler noise (`title` keys) and pragma lines smuggled through
//! property descriptions (`@format : date-time`); both are cleaned up on load.

use crate::error::{Error, Result};
use crate::scanner::FileScanner;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Filename of the generated document, which may live next to the compiled fragments.
pub const RESERVED_OUTPUT_FILENAME: &str = "openapi.json";

static ENUM_MATCHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\benum\s+(\w+)\s*\{").expect("valid enum pattern"));

/// Keys a description pragma may set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PragmaKey {
    Format,
    Pattern,
    Example,
    Default,
    Minimum,
    Maximum,
    MultipleOf,
    MinLength,
    MaxLength,
    MinItems,
    MaxItems,
    Deprecated,
    Other(String),
}

impl PragmaKey {
    fn parse(key: &str) -> Self {
        match key {
            "format" => PragmaKey::Format,
            "pattern" => PragmaKey::Pattern,
            "example" => PragmaKey::Example,
            "default" => PragmaKey::Default,
            "minimum" => PragmaKey::Minimum,
            "maximum" => PragmaKey::Maximum,
            "multipleOf" => PragmaKey::MultipleOf,
            "minLength" => PragmaKey::MinLength,
            "maxLength" => PragmaKey::MaxLength,
            "minItems" => PragmaKey::MinItems,
            "maxItems" => PragmaKey::MaxItems,
            "deprecated" => PragmaKey::Deprecated,
            other => PragmaKey::Other(other.to_string()),
        }
    }

    /// Schema keyword the pragma is written to.
    pub fn as_str(&self) -> &str {
        match self {
            PragmaKey::Format => "format",
            PragmaKey::Pattern => "pattern",
            PragmaKey::Example => "example",
            PragmaKey::Default => "default",
            PragmaKey::Minimum => "minimum",
            PragmaKey::Maximum => "maximum",
            PragmaKey::MultipleOf => "multipleOf",
            PragmaKey::MinLength => "minLength",
            PragmaKey::MaxLength => "maxLength",
            PragmaKey::MinItems => "minItems",
            PragmaKey::MaxItems => "maxItems",
            PragmaKey::Deprecated => "deprecated",
            PragmaKey::Other(key) => key,
        }
    }
}

/// One `@key : value` line from a property description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub key: PragmaKey,
    pub value: String,
}

impl Pragma {
    /// Parse the text after the leading `@`.
    pub fn parse(text: &str) -> Option<Self> {
        let (key, value) = text.split_once(':')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self {
            key: PragmaKey::parse(key),
            value: value.trim().to_string(),
        })
    }

    /// The value as JSON: numeric keywords become numbers, `deprecated` a boolean.
    pub fn json_value(&self) -> Value {
        let typed = match self.key {
            PragmaKey::Minimum | PragmaKey::Maximum | PragmaKey::MultipleOf => self
                .value
                .parse::<i64>()
                .map(Value::from)
                .ok()
                .or_else(|| self.value.parse::<f64>().ok().map(Value::from)),
            PragmaKey::MinLength | PragmaKey::MaxLength | PragmaKey::MinItems | PragmaKey::MaxItems => {
                self.value.parse::<u64>().ok().map(Value::from)
            }
            PragmaKey::Deprecated => self.value.parse::<bool>().ok().map(Value::from),
            PragmaKey::Other(ref key) => {
                debug!("Passing through unknown pragma `{}`", key);
                None
            }
            _ => None,
        };
        typed.unwrap_or_else(|| Value::String(self.value.clone()))
    }
}

/// A literal enum member value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnumLiteral {
    Str(String),
    Int(i64),
}

/// Parse the member lines of an enum body (between the braces).
///
/// Quoted members are strings, everything else must be an integer after `=`.
pub fn parse_enum_members(lines: &[String], file: &Path) -> Result<Vec<EnumLiteral>> {
    let mut values = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with("/*") || line.starts_with('*') {
            continue;
        }

        let is_string = line.contains('"') || line.contains('\'');
        let cleaned = line.replace(['"', '\''], "");
        let cleaned = cleaned.trim().trim_end_matches(',');
        let Some((_, value)) = cleaned.split_once('=') else {
            return Err(Error::malformed(file, line, "enum member needs an explicit `= value`"));
        };
        let value = value.trim();

        if is_string {
            values.push(EnumLiteral::Str(value.to_string()));
        } else {
            let number = value.parse::<i64>().map_err(|_| {
                Error::malformed(file, line, format!("`{}` is neither quoted nor an integer", value))
            })?;
            values.push(EnumLiteral::Int(number));
        }
    }
    Ok(values)
}

/// Schema of an enum: numeric iff its first literal is a number.
pub fn enum_schema(values: &[EnumLiteral]) -> Value {
    let schema_type = match values.first() {
        Some(EnumLiteral::Int(_)) => "number",
        _ => "string",
    };
    json!({"type": schema_type, "enum": values})
}

/// Schema library - name to schema definition.
#[derive(Debug, Clone, Default)]
pub struct SchemaLibrary {
    schemas: BTreeMap<String, Value>,
}

impl SchemaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the compiled fragments of `build_dir`, then the enums of `schemas_dir`.
    pub fn load(build_dir: &Path, schemas_dir: &Path) -> Result<Self> {
        let mut library = Self::new();
        let fragments = library.load_fragments(build_dir)?;
        let enums = library.load_enum_sources(schemas_dir)?;
        info!(
            "Schema library: {} compiled schemas, {} enums",
            fragments, enums
        );
        Ok(library)
    }

    /// Load every compiled fragment in `dir`. Returns the number of schemas added.
    pub fn load_fragments(&mut self, dir: &Path) -> Result<usize> {
        let result = FileScanner::with_extensions(dir.to_path_buf(), &["json"]).scan()?;
        let mut count = 0;
        for path in &result.files {
            if path.file_name().and_then(|s| s.to_str()) == Some(RESERVED_OUTPUT_FILENAME) {
                continue;
            }
            let content = fs::read_to_string(path)?;
            count += self.load_fragment_str(&content, path)?;
        }
        Ok(count)
    }

    /// Load one compiled fragment document; `file` labels errors.
    pub fn load_fragment_str(&mut self, content: &str, file: &Path) -> Result<usize> {
        let document: Value = serde_json::from_str(content)?;
        let Some(Value::Object(schemas)) = document.pointer("/components/schemas").cloned() else {
            return Err(Error::InvalidFragment {
                file: file.to_path_buf(),
                message: "expected an object at components.schemas".to_string(),
            });
        };

        let count = schemas.len();
        for (name, mut definition) in schemas {
            clean_definition(&mut definition, file)?;
            debug!("Loaded schema {} from {}", name, file.display());
            self.insert(name, definition);
        }
        Ok(count)
    }

    /// Load every enum declared under `dir`. Returns the number of enums added.
    pub fn load_enum_sources(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            warn!("Schema directory {} does not exist, no enums loaded", dir.display());
            return Ok(0);
        }
        let result = FileScanner::with_extensions(dir.to_path_buf(), &["ts"]).scan()?;
        let mut count = 0;
        for path in &result.files {
            let content = fs::read_to_string(path)?;
            count += self.load_enum_source(&content, path)?;
        }
        Ok(count)
    }

    /// Load the enums declared in one source file.
    pub fn load_enum_source(&mut self, content: &str, file: &Path) -> Result<usize> {
        let mut count = 0;
        let mut current: Option<(String, Vec<String>)> = None;

        for line in content.lines() {
            let line = line.trim();
            if let Some(captures) = ENUM_MATCHER.captures(line) {
                current = Some((captures[1].to_string(), Vec::new()));
                if !line.contains('}') {
                    continue;
                }
            }
            let Some((name, members)) = current.as_mut() else {
                continue;
            };
            if line.contains('}') {
                let values = parse_enum_members(members, file)?;
                debug!("Loaded enum {} ({} values) from {}", name, values.len(), file.display());
                self.insert(name.clone(), enum_schema(&values));
                current = None;
                count += 1;
            } else {
                members.push(line.to_string());
            }
        }
        Ok(count)
    }

    /// Add a schema. A name defined twice keeps the later definition.
    pub fn insert(&mut self, name: String, definition: Value) {
        if self.schemas.contains_key(&name) {
            warn!("Schema {} is defined more than once, keeping the last definition", name);
        }
        self.schemas.insert(name, definition);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Strip compiler titles and move description pragmas into schema keywords.
fn clean_definition(definition: &mut Value, file: &Path) -> Result<()> {
    let Some(object) = definition.as_object_mut() else {
        return Ok(());
    };
    object.remove("title");

    if let Some(Value::Object(properties)) = object.get_mut("properties") {
        for property in properties.values_mut() {
            if let Value::Object(property) = property {
                clean_property(property, file)?;
            }
        }
    }
    Ok(())
}

fn clean_property(property: &mut Map<String, Value>, file: &Path) -> Result<()> {
    property.remove("title");
    let is_array = property.get("type").and_then(Value::as_str) == Some("array");
    if is_array {
        if let Some(Value::Object(items)) = property.get_mut("items") {
            items.remove("title");
        }
    }

    let Some(Value::String(description)) = property.remove("description") else {
        return Ok(());
    };

    let mut prose = Vec::new();
    let mut entries = Map::new();
    for line in description.split('\n') {
        match line.strip_prefix('@') {
            Some(text) => {
                let pragma = Pragma::parse(text)
                    .ok_or_else(|| Error::malformed(file, line, "expected `@key : value`"))?;
                entries.insert(pragma.key.as_str().to_string(), pragma.json_value());
            }
            None => prose.push(line),
        }
    }
    if !prose.is_empty() {
        entries.insert("description".to_string(), Value::String(prose.join("\n")));
    }

    if is_array {
        if let Some(Value::Object(items)) = property.get_mut("items") {
            items.extend(entries);
            return Ok(());
        }
    }
    property.extend(entries);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const ITEM_FRAGMENT: &str = r##"{
  "components": {
    "schemas": {
      "Item": {
        "title": "Item",
        "type": "object",
        "properties": {
          "id": {"title": "Item.id", "type": "string", "description": "Identifier\n@format : uuid"},
          "created": {"title": "Item.created", "type": "string", "description": "@format : date-time"},
          "tags": {
            "title": "Item.tags",
            "type": "array",
            "items": {"title": "Item.tags.[]", "type": "string"},
            "description": "Free-form labels\n@maxLength : 32"
          },
          "owner": {"title": "Item.owner", "$ref": "#/components/schemas/User"}
        },
        "required": ["id"]
      }
    }
  }
}"##;

    fn load_item() -> Value {
        let mut library = SchemaLibrary::new();
        library.load_fragment_str(ITEM_FRAGMENT, Path::new("build/item.json")).unwrap();
        library.get("Item").unwrap().clone()
    }

    #[test]
    fn test_titles_are_stripped() {
        let item = load_item();
        assert!(item.get("title").is_none());
        assert!(item.pointer("/properties/id/title").is_none());
        assert!(item.pointer("/properties/tags/items/title").is_none());
        assert!(item.pointer("/properties/owner/title").is_none());
    }

    #[test]
    fn test_pragmas_move_into_schema() {
        let item = load_item();
        assert_eq!(
            item["properties"]["id"],
            json!({"type": "string", "format": "uuid", "description": "Identifier"})
        );
        assert_eq!(
            item["properties"]["created"],
            json!({"type": "string", "format": "date-time"})
        );
    }

    #[test]
    fn test_array_pragmas_land_on_items() {
        let item = load_item();
        assert_eq!(
            item["properties"]["tags"],
            json!({
                "type": "array",
                "items": {"type": "string", "maxLength": 32, "description": "Free-form labels"}
            })
        );
    }

    #[test]
    fn test_malformed_pragma() {
        let fragment = r#"{"components": {"schemas": {"A": {"properties": {"x": {"type": "string", "description": "@deprecated"}}}}}}"#;
        let result = SchemaLibrary::new().load_fragment_str(fragment, Path::new("a.json"));
        assert!(matches!(result, Err(Error::MalformedLine { .. })));
    }

    #[test]
    fn test_fragment_without_schemas_is_invalid() {
        let result = SchemaLibrary::new().load_fragment_str(r#"{"definitions": {}}"#, Path::new("a.json"));
        assert!(matches!(result, Err(Error::InvalidFragment { .. })));
    }

    #[test]
    fn test_string_enum() {
        let source = "export enum Color {\n  Red = \"red\",\n  Green = 'green',\n}\n";
        let mut library = SchemaLibrary::new();
        assert_eq!(library.load_enum_source(source, Path::new("color.ts")).unwrap(), 1);
        assert_eq!(
            library.get("Color").unwrap(),
            &json!({"type": "string", "enum": ["red", "green"]})
        );
    }

    #[test]
    fn test_numeric_enum_typed_by_first_literal() {
        let source = "/**\n * banner\n */\nexport enum Level {\n  Low = 1,\n\n  High = 10,\n}\n";
        let mut library = SchemaLibrary::new();
        library.load_enum_source(source, Path::new("level.ts")).unwrap();
        assert_eq!(
            library.get("Level").unwrap(),
            &json!({"type": "number", "enum": [1, 10]})
        );

        let mixed = parse_enum_members(
            &["A = 1,".to_string(), "B = \"b\",".to_string()],
            Path::new("mixed.ts"),
        )
        .unwrap();
        assert_eq!(enum_schema(&mixed)["type"], json!("number"));
    }

    #[test]
    fn test_enum_member_without_value_is_malformed() {
        let result = parse_enum_members(&["Red,".to_string()], Path::new("c.ts"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_directories() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("build");
        let schemas = dir.path().join("schemas");
        fs::create_dir_all(&build).unwrap();
        fs::create_dir_all(&schemas).unwrap();
        fs::write(build.join("item.json"), ITEM_FRAGMENT).unwrap();
        fs::write(build.join(RESERVED_OUTPUT_FILENAME), "not json").unwrap();
        fs::write(schemas.join("color.ts"), "export enum Color {\n  Red = \"red\",\n}\n").unwrap();
        fs::write(schemas.join("item.ts"), "export interface Item {\n  id: string;\n}\n").unwrap();

        let library = SchemaLibrary::load(&build, &schemas).unwrap();

        assert_eq!(library.len(), 2);
        assert!(library.contains("Item"));
        assert!(library.contains("Color"));
    }

    #[test]
    fn test_missing_schema_directory_loads_no_enums() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("item.json"), ITEM_FRAGMENT).unwrap();

        let library = SchemaLibrary::load(&build, &dir.path().join("schemas")).unwrap();
        assert_eq!(library.len(), 1);
    }
}

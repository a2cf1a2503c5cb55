//! Run configuration, project layout and the per-prefix lookup tables.
//!
//! A run configuration is a YAML file. Keys starting with `_` steer the generator; every other
//! key is copied into the output document as-is:
//!
//! ```yaml
//! _output: identrust.json
//! _files:
//!   - ./src/api/identrust/*.ts
//! openapi: 3.0.0
//! info:
//!   title: Identrust API
//! ```

use crate::error::{Error, Result};
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_BASELINE_SCHEMA: &str = "Account";
const DEFAULT_ERROR_SCHEMA: &str = "ResultError";

/// One parsed run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// File the configuration was read from
    pub source: PathBuf,
    /// Output filename, relative to the layout's output directory
    pub output: String,
    /// Path prefixes (relative to the project root) of the route files to include
    pub include_prefixes: Vec<String>,
    /// Schemas included in every document
    pub baseline_schemas: Vec<String>,
    /// Schema referenced by every error response
    pub error_schema: String,
    /// Prefix tables, with configuration overrides applied
    pub tables: PrefixTables,
    /// Remaining top-level keys, seeding the document
    pub document: Map<String, Value>,
}

impl RunConfig {
    /// Load a run configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading run configuration: {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse run configuration text; `source` labels errors.
    pub fn parse(content: &str, source: &Path) -> Result<Self> {
        let config_error = |message: String| Error::Config {
            file: source.to_path_buf(),
            message,
        };

        let value: Value = serde_yaml::from_str(content).map_err(|e| config_error(e.to_string()))?;
        let Value::Object(mut document) = value else {
            return Err(config_error("expected a mapping at the top level".to_string()));
        };

        let output = match document.remove("_output") {
            Some(Value::String(output)) => output,
            Some(_) => return Err(config_error("_output must be a filename".to_string())),
            None => {
                return Err(config_error(
                    "_output must be set with the filename to output".to_string(),
                ))
            }
        };

        let files = document.remove("_files").ok_or_else(|| {
            config_error("_files must be set with the list of files to include".to_string())
        })?;
        let include_prefixes = string_list(files, "_files")
            .map_err(config_error)?
            .iter()
            .map(|pattern| include_prefix(pattern))
            .collect();

        let baseline_schemas = match document.remove("_schemas") {
            Some(value) => string_list(value, "_schemas").map_err(config_error)?,
            None => vec![DEFAULT_BASELINE_SCHEMA.to_string()],
        };

        let error_schema = match document.remove("_errorSchema") {
            Some(Value::String(name)) => name,
            Some(_) => return Err(config_error("_errorSchema must be a schema name".to_string())),
            None => DEFAULT_ERROR_SCHEMA.to_string(),
        };

        let mut tables = PrefixTables::default();
        if let Some(remap) = document.remove("_directoryRemap") {
            let remap: BTreeMap<String, String> = serde_json::from_value(remap)
                .map_err(|e| config_error(format!("_directoryRemap: {}", e)))?;
            tables.directory_remap.extend(remap);
        }
        if let Some(tags) = document.remove("_defaultTags") {
            let tags: BTreeMap<String, Vec<String>> = serde_json::from_value(tags)
                .map_err(|e| config_error(format!("_defaultTags: {}", e)))?;
            tables.default_tags.extend(tags);
        }

        Ok(Self {
            source: source.to_path_buf(),
            output,
            include_prefixes,
            baseline_schemas,
            error_schema,
            tables,
            document,
        })
    }

    /// Whether a route file (path relative to the project root, `/`-separated) is included.
    pub fn includes(&self, relative_path: &str) -> bool {
        self.include_prefixes
            .iter()
            .any(|prefix| relative_path.starts_with(prefix.as_str()))
    }
}

fn string_list(value: Value, key: &str) -> std::result::Result<Vec<String>, String> {
    serde_json::from_value(value).map_err(|e| format!("{} must be a list of strings: {}", key, e))
}

/// `./src/api/identrust/*.ts` becomes the path prefix `src/api/identrust/`.
fn include_prefix(pattern: &str) -> String {
    pattern.trim().replace("./", "").replace("*.ts", "")
}

/// Read the `version` string of a JSON version source such as `package.json`.
pub fn load_version(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&content)?;
    data.get("version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Config {
            file: path.to_path_buf(),
            message: "missing string `version`".to_string(),
        })
}

/// URL-prefix lookup tables, read-only once a configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixTables {
    /// Directory-derived prefix to the URL prefix actually served
    pub directory_remap: BTreeMap<String, String>,
    /// URL prefix to the tags of routes that do not set their own
    pub default_tags: BTreeMap<String, Vec<String>>,
}

impl PrefixTables {
    pub fn remap<'a>(&'a self, prefix: &'a str) -> &'a str {
        self.directory_remap
            .get(prefix)
            .map(String::as_str)
            .unwrap_or(prefix)
    }

    pub fn tags_for(&self, prefix: &str) -> Option<&[String]> {
        self.default_tags.get(prefix).map(Vec::as_slice)
    }
}

impl Default for PrefixTables {
    fn default() -> Self {
        Self {
            directory_remap: BTreeMap::from([(
                "/policyTemplates".to_string(),
                "/policytemplates".to_string(),
            )]),
            default_tags: BTreeMap::from([(
                "/identrust".to_string(),
                vec!["Identrust".to_string()],
            )]),
        }
    }
}

/// `AccountRes` becomes `accountRes`, the file stem used for a model's generated files.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Directories every stage reads from or writes to, relative to the project root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    /// Route handler tree, one directory per URL prefix
    pub api_dir: PathBuf,
    /// Model declarations fed to the interface generator
    pub models_dir: PathBuf,
    /// Generated interfaces, capability interfaces and enums
    pub schemas_dir: PathBuf,
    /// Compiled JSON fragments, one per model
    pub build_dir: PathBuf,
    /// Where output documents are written
    pub output_dir: PathBuf,
    /// JSON file carrying the document version
    pub version_file: PathBuf,
}

impl ProjectLayout {
    /// Conventional layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            api_dir: root.join("src/api"),
            models_dir: root.join("src/models"),
            schemas_dir: root.join("src/schemas"),
            build_dir: root.join("build"),
            output_dir: root.join("swagger"),
            version_file: root.join("package.json"),
            root,
        }
    }

    /// Compiled fragment of the model `name`.
    pub fn fragment_path(&self, name: &str) -> PathBuf {
        self.build_dir.join(format!("{}.json", lower_first(name)))
    }

    /// Generated interface source of the model `name`.
    pub fn schema_source_path(&self, name: &str) -> PathBuf {
        self.schemas_dir.join(format!("{}.ts", lower_first(name)))
    }

    /// `path` relative to the project root with `/` separators, as matched by `_files`.
    pub fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

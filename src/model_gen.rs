//! Model-to-interface generator.
//!
//! Model classes carry runtime members (static tables, private attribute lists, methods) that
//! the fragment compiler must not see. This module reduces each model declaration to a plain
//! interface holding only its public fields and writes it to the schema tree, one file per
//! model:
//!
//! ```text
//! export class Item extends ModelWithAssociate implements Timestamps {
//!   static privateAttributes = ["secret"];
//!   declare id: string;
//!   owner: models.User | null;
//!   secret: string;
//!   toJSON() { ... }
//! }
//! ```
//!
//! becomes
//!
//! ```text
//! import { Timestamps } from "./timestamps";
//! import { User } from "./user";
//!
//! export interface Item extends Timestamps {
//!   id: string;
//!   owner: User | null;
//! }
//! ```
//!
//! Enumerations are copied through unchanged.

use crate::config::{lower_first, ProjectLayout};
use crate::error::{Error, Result};
use crate::scanner::FileScanner;
use crate::type_resolver::{split_top_level, TypeExpr, NAMESPACE_QUALIFIER};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Banner at the top of every generated file.
pub const GENERATED_BANNER: &str = "/**\n * Do not modify this file directly. It is automatically generated from the model definition.\n */\n";

const TYPE_OVERRIDE_PRAGMA: &str = "@schema-type-override";
const PRIVATE_ATTRIBUTES: &str = "static privateAttributes";
const BUILTIN_TYPES: [&str; 8] = [
    "string", "number", "boolean", "null", "object", "any", "unknown", "undefined",
];

static HEADER_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^export\s+(interface|class|enum)\s+(\w+)(?:\s+extends\s+([\w.]+))?(?:\s+implements\s+([\w.]+))?",
    )
    .expect("valid declaration header pattern")
});

/// Tunables of the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Type names replaced before anything else
    pub type_aliases: BTreeMap<String, String>,
    /// Models that are never generated
    pub skipped_models: BTreeSet<String>,
    /// Parents dropped from the `extends` clause
    pub ignored_parents: BTreeSet<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            type_aliases: BTreeMap::from([
                ("models.SAN".to_string(), "string".to_string()),
                ("Date".to_string(), "string".to_string()),
            ]),
            skipped_models: name_set(&[
                "ListOfModels",
                "ModelWithAssociate",
                "ModelWithFilters",
                "RedshiftAdapterRow",
            ]),
            ignored_parents: name_set(&["ModelWithAssociate", "ModelWithFilters"]),
        }
    }
}

fn name_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Raw lines of one top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationBlock {
    /// Trimmed lines of the block comment right before the declaration
    pub docs: Vec<String>,
    pub header: String,
    pub body: Vec<String>,
    pub closing: String,
}

/// Split a model source file into its top-level declarations.
///
/// A declaration starts on a line beginning with `export interface|class|enum` and ends on
/// the first line beginning with `}`.
pub fn split_declarations(source: &str) -> Vec<DeclarationBlock> {
    let mut blocks = Vec::new();
    let mut docs: Vec<String> = Vec::new();
    let mut in_docs = false;
    let mut current: Option<(String, Vec<String>)> = None;

    for line in source.lines() {
        let line = line.trim_end();
        let is_header = ["export interface", "export class", "export enum"]
            .iter()
            .any(|prefix| line.starts_with(prefix));

        if is_header {
            if line.ends_with('}') {
                blocks.push(DeclarationBlock {
                    docs: std::mem::take(&mut docs),
                    header: line.trim_end_matches('}').trim_end().to_string(),
                    body: Vec::new(),
                    closing: "}".to_string(),
                });
            } else {
                current = Some((line.to_string(), Vec::new()));
            }
        } else if let Some((header, body)) = current.as_mut() {
            if line.starts_with('}') {
                blocks.push(DeclarationBlock {
                    docs: std::mem::take(&mut docs),
                    header: std::mem::take(header),
                    body: std::mem::take(body),
                    closing: line.to_string(),
                });
                current = None;
            } else {
                body.push(line.to_string());
            }
        } else if line.starts_with("/*") {
            docs = vec![line.trim().to_string()];
            in_docs = !line.ends_with("*/");
        } else if in_docs {
            let line = line.trim();
            if line.starts_with("*/") {
                in_docs = false;
            }
            docs.push(line.to_string());
        } else if line.starts_with("function") {
            docs.clear();
        }
    }

    blocks
}

/// One emitted interface field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name, keeping a trailing `?`
    pub name: String,
    /// Union alternatives after alias mapping
    pub types: Vec<String>,
    pub docs: Vec<String>,
    pub trailing_comment: Option<String>,
}

impl FieldDecl {
    fn base_name(&self) -> &str {
        self.name.trim_end_matches('?')
    }
}

/// A class or interface reduced to its public fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceModel {
    pub name: String,
    pub parent: Option<String>,
    /// Interface the model implements; its fields are inherited, not re-emitted
    pub capability: Option<String>,
    pub docs: Vec<String>,
    pub fields: Vec<FieldDecl>,
}

/// An enumeration, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumModel {
    pub name: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDeclaration {
    Interface(InterfaceModel),
    Enum(EnumModel),
}

impl ModelDeclaration {
    /// Parse a declaration block. Returns `Ok(None)` for skipped models.
    pub fn parse(block: &DeclarationBlock, options: &GeneratorOptions, file: &Path) -> Result<Option<Self>> {
        let Some(captures) = HEADER_MATCHER.captures(&block.header) else {
            return Err(Error::malformed(file, &block.header, "expected `export <kind> <Name>`"));
        };
        let name = captures[2].to_string();

        if &captures[1] == "enum" {
            let mut lines = vec![block.header.clone()];
            lines.extend(block.body.iter().cloned());
            lines.push(block.closing.clone());
            return Ok(Some(ModelDeclaration::Enum(EnumModel { name, lines })));
        }

        if options.skipped_models.contains(&name) {
            debug!("Skipping model {}", name);
            return Ok(None);
        }

        let strip = |name: &str| name.trim_start_matches(NAMESPACE_QUALIFIER).to_string();
        let parent = captures
            .get(3)
            .map(|m| strip(m.as_str()))
            .filter(|parent| !options.ignored_parents.contains(parent));
        let capability = captures.get(4).map(|m| strip(m.as_str()));

        let mut model = InterfaceModel {
            name,
            parent,
            capability,
            docs: block.docs.clone(),
            fields: Vec::new(),
        };
        model.fields = parse_fields(&block.body, &model.name, options);
        Ok(Some(ModelDeclaration::Interface(model)))
    }

    pub fn name(&self) -> &str {
        match self {
            ModelDeclaration::Interface(model) => &model.name,
            ModelDeclaration::Enum(model) => &model.name,
        }
    }

    /// Text of the generated file.
    pub fn render(&self) -> String {
        match self {
            ModelDeclaration::Interface(model) => model.render(),
            ModelDeclaration::Enum(model) => format!("{}{}\n", GENERATED_BANNER, model.lines.join("\n")),
        }
    }
}

/// Body scan state.
#[derive(Debug, Default)]
struct FieldScan {
    docs: Vec<String>,
    in_docs: bool,
    type_override: Option<String>,
    private_statement: Option<String>,
    private: Vec<String>,
    fields: Vec<FieldDecl>,
}

fn parse_fields(body: &[String], model_name: &str, options: &GeneratorOptions) -> Vec<FieldDecl> {
    let mut scan = FieldScan::default();

    for raw in body {
        let (code, comment) = match raw.find("//") {
            Some(idx) => (&raw[..idx], Some(raw[idx + 2..].trim())),
            None => (raw.as_str(), None),
        };
        let mut trailing_comment = None;
        if let Some(comment) = comment {
            match comment.strip_prefix(TYPE_OVERRIDE_PRAGMA) {
                Some(details) => {
                    let details = details.trim().trim_start_matches(':').trim();
                    scan.type_override = Some(details.to_string());
                }
                None if !comment.is_empty() => trailing_comment = Some(comment.to_string()),
                None => {}
            }
        }

        let line = code.trim();
        if scan.in_docs {
            if line.starts_with("*/") || line.ends_with("*/") {
                scan.in_docs = false;
            }
            scan.docs.push(line.to_string());
            continue;
        }
        if line.starts_with("/*") {
            scan.docs = vec![line.to_string()];
            scan.in_docs = !line.ends_with("*/");
            continue;
        }

        if scan.private_statement.is_some() || line.contains(PRIVATE_ATTRIBUTES) {
            let statement = scan.private_statement.get_or_insert_with(String::new);
            statement.push_str(line);
            if let Some(names) = private_attribute_names(statement) {
                scan.private = names;
                scan.private_statement = None;
            }
            continue;
        }

        if line.contains("static ") {
            continue;
        }
        if line.contains('(') {
            break;
        }
        let line = line.strip_prefix("declare ").unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        let Some((name, type_text)) = split_field(line) else {
            continue;
        };
        let name = name.trim().to_string();
        if scan.private.iter().any(|private| private == name.trim_end_matches('?')) {
            debug!("Dropping private attribute {}.{}", model_name, name);
            scan.docs.clear();
            continue;
        }

        let type_text = scan.type_override.take().unwrap_or(type_text);
        let type_text = type_text.trim().trim_end_matches(';');
        let type_text = match type_text.split_once(" = ") {
            Some((declared, _initializer)) => declared,
            None => type_text,
        };
        let types = split_top_level(type_text.trim(), '|')
            .iter()
            .filter(|alternative| !alternative.is_empty())
            .map(|alternative| normalize_type(alternative, options))
            .collect();

        scan.fields.push(FieldDecl {
            name,
            types,
            docs: std::mem::take(&mut scan.docs),
            trailing_comment,
        });
    }

    scan.fields
}

/// Names of a complete `static privateAttributes = [...]` statement, `None` while it is still open.
fn private_attribute_names(statement: &str) -> Option<Vec<String>> {
    let end = statement.rfind(']')?;
    let start = statement[..end].rfind('[')?;
    Some(
        statement[start + 1..end]
            .split(',')
            .map(|item| item.replace(['"', '\''], "").trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

/// Split `name: type`. A line with several colons only counts when it closes an inline type.
fn split_field(line: &str) -> Option<(&str, String)> {
    let parts: Vec<&str> = line.split(':').collect();
    match parts.len() {
        2 => Some((parts[0], parts[1].to_string())),
        n if n > 2 && line.ends_with("};") => Some((parts[0], parts[1..].join(":"))),
        _ => None,
    }
}

fn normalize_type(alternative: &str, options: &GeneratorOptions) -> String {
    let expr = TypeExpr::parse(alternative);
    let name = match options.type_aliases.get(&expr.name) {
        Some(alias) => alias.clone(),
        None => expr.name.trim_start_matches(NAMESPACE_QUALIFIER).to_string(),
    };
    if expr.is_array {
        format!("{}[]", name)
    } else {
        name
    }
}

/// Whether a type name refers to another generated interface.
fn is_importable(name: &str, model_name: &str) -> bool {
    let literal = name.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '"' || c == '\'')
        || name.contains(['{', '}', '<', '>'])
        || name == "true"
        || name == "false";
    !literal && !name.is_empty() && name != model_name && !BUILTIN_TYPES.contains(&name)
}

fn doc_line(line: &str) -> String {
    if line.is_empty() || line.starts_with('/') {
        line.to_string()
    } else {
        format!(" {}", line)
    }
}

impl InterfaceModel {
    /// Drop fields the model inherits from its capability interface.
    pub fn exclude_fields(&mut self, names: &[String]) {
        self.fields
            .retain(|field| !names.iter().any(|name| name == field.base_name()));
    }

    /// Interfaces the generated file imports, sorted.
    pub fn imports(&self) -> BTreeSet<String> {
        let mut imports: BTreeSet<String> = self
            .parent
            .iter()
            .chain(self.capability.iter())
            .cloned()
            .collect();
        for field in &self.fields {
            for alternative in &field.types {
                let element = TypeExpr::parse(alternative).name;
                if is_importable(&element, &self.name) {
                    imports.insert(element);
                }
            }
        }
        imports
    }

    pub fn render(&self) -> String {
        let mut out = String::from(GENERATED_BANNER);

        let imports = self.imports();
        for import in &imports {
            out.push_str(&format!("import {{ {} }} from \"./{}\";\n", import, lower_first(import)));
        }
        if !imports.is_empty() {
            out.push('\n');
        }

        for line in &self.docs {
            out.push_str(&doc_line(line));
            out.push('\n');
        }

        out.push_str(&format!("export interface {} ", self.name));
        match (&self.parent, &self.capability) {
            (Some(parent), Some(capability)) => {
                out.push_str(&format!("extends {}, {} ", parent, capability))
            }
            (Some(base), None) | (None, Some(base)) => out.push_str(&format!("extends {} ", base)),
            (None, None) => {}
        }
        out.push_str("{\n");

        for field in &self.fields {
            for line in &field.docs {
                out.push_str(&format!("  {}\n", doc_line(line)));
            }
            out.push_str(&format!("  {}: {};", field.name, field.types.join(" | ")));
            if let Some(comment) = &field.trailing_comment {
                out.push_str(&format!(" // {}", comment));
            }
            out.push('\n');
        }
        out.push_str("}\n");
        out
    }
}

/// Field names declared by a hand-written capability interface.
pub fn capability_fields(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Capability interface {} not found, no fields excluded", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    Ok(content
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, _)| name.replace('?', "").trim().to_string())
        .collect())
}

/// Generate the interfaces of every model file under the layout's model tree.
///
/// Returns the written files.
pub fn generate_models(layout: &ProjectLayout, options: &GeneratorOptions) -> Result<Vec<PathBuf>> {
    let result = FileScanner::with_extensions(layout.models_dir.clone(), &["ts"]).scan()?;
    fs::create_dir_all(&layout.schemas_dir)?;

    let mut written = Vec::new();
    for path in &result.files {
        debug!("Reading models from {}", path.display());
        let source = fs::read_to_string(path)?;
        for block in split_declarations(&source) {
            let Some(mut declaration) = ModelDeclaration::parse(&block, options, path)? else {
                continue;
            };
            if let ModelDeclaration::Interface(model) = &mut declaration {
                if let Some(capability) = &model.capability {
                    let excluded = capability_fields(&layout.schema_source_path(capability))?;
                    model.exclude_fields(&excluded);
                }
            }

            let target = layout.schema_source_path(declaration.name());
            fs::write(&target, declaration.render())?;
            debug!("Wrote {}", target.display());
            written.push(target);
        }
    }

    info!("Generated {} schema sources from {}", written.len(), layout.models_dir.display());
    Ok(written)
}

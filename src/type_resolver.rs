//! Type reference resolution.
//!
//! Route handlers describe their payloads with TypeScript-flavoured type expressions such as
//! `Item`, `Item[]`, `number` or `{ id: string; page?: number }`. This module turns those
//! expressions into OpenAPI schema fragments and remembers every named schema it hands out a
//! reference to, so the document builder can later pull exactly those definitions (and what
//! they reference) into `components.schemas`.

use log::debug;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Sentinel used by the typed request wrappers for "this part of the request is unused".
pub const NEVER: &str = "never";

/// Default mimetype for request and response bodies.
pub const JSON_MIMETYPE: &str = "application/json";

/// Qualifier that model types may carry in route and model sources.
pub const NAMESPACE_QUALIFIER: &str = "models.";

/// Prefix of every named schema reference.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

const PRIMITIVES: [&str; 3] = ["number", "string", "boolean"];

/// A single (non-union) type expression: a name with an optional `[]` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    /// Element type name, without the array marker
    pub name: String,
    /// Whether the expression ended in `[]`
    pub is_array: bool,
}

impl TypeExpr {
    /// Parse one alternative. Only a single trailing `[]` is recognized.
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();
        match expr.strip_suffix("[]") {
            Some(element) => Self {
                name: element.trim().to_string(),
                is_array: true,
            },
            None => Self {
                name: expr.to_string(),
                is_array: false,
            },
        }
    }

    /// Whether the element type is one of the JSON primitives.
    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&self.name.as_str())
    }
}

/// Split `input` on `separator`, ignoring separators nested inside `{}`, `<>`, `()` or `[]`.
///
/// Parts are trimmed. An empty input yields a single empty part.
pub fn split_top_level(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;

    for c in input.chars() {
        match c {
            '{' | '<' | '(' | '[' => depth += 1,
            '}' | '>' | ')' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c == separator && depth == 0 {
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    parts.push(current.trim().to_string());
    parts
}

/// One `name: type` member of an inline object type used for path or query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub type_name: String,
    /// False when the name carried a trailing `?`
    pub required: bool,
}

/// Parse an inline object type (`{ id: string; page?: number }`) into its members.
///
/// [`NEVER`] yields no members. A trailing `?` on a name is stripped and marks the member as
/// optional only when `honor_optional` is set; path parameters are always required.
/// Returns a message describing the problem when the expression cannot be split.
pub fn parse_param_list(
    expr: &str,
    honor_optional: bool,
) -> std::result::Result<Vec<ParamSpec>, String> {
    let expr = expr.trim();
    if expr == NEVER {
        return Ok(Vec::new());
    }

    let inner = expr
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| format!("expected an inline object type, found `{}`", expr))?;

    let mut params = Vec::new();
    for member in split_top_level(inner, ';') {
        if member.is_empty() {
            continue;
        }
        let (name, type_name) = member
            .split_once(':')
            .ok_or_else(|| format!("expected `name: type`, found `{}`", member))?;

        let name = name.trim();
        let (name, required) = match name.strip_suffix('?') {
            Some(stripped) if honor_optional => (stripped.trim(), false),
            Some(stripped) => (stripped.trim(), true),
            None => (name, true),
        };

        params.push(ParamSpec {
            name: name.to_string(),
            type_name: type_name.trim().to_string(),
            required,
        });
    }
    Ok(params)
}

/// Split a request-body expression into its ordered alternatives (top-level `|`).
pub fn split_request_body(expr: &str) -> Vec<String> {
    split_top_level(expr, '|')
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect()
}

/// Type resolver - maps type expressions to schema fragments and tracks the schemas in use.
#[derive(Debug, Clone)]
pub struct TypeResolver {
    schemas_in_use: BTreeSet<String>,
}

impl TypeResolver {
    /// Create a resolver whose in-use set starts with the always-included baseline schemas.
    pub fn new<I, S>(baseline: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemas_in_use: baseline.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve a type expression as it would be encoded with `mimetype`.
    ///
    /// CSV payloads are plain text and every other non-JSON mimetype is binary; neither records
    /// a schema as in use.
    pub fn resolve(&mut self, type_expr: &str, mimetype: &str) -> Value {
        match mimetype.trim() {
            "text/csv" => return json!({"type": "string", "format": "text"}),
            JSON_MIMETYPE => {}
            _ => return json!({"type": "string", "format": "binary"}),
        }

        let expr = TypeExpr::parse(type_expr);
        let element = self.resolve_element(&expr);
        if expr.is_array {
            json!({"type": "array", "items": element})
        } else {
            element
        }
    }

    fn resolve_element(&mut self, expr: &TypeExpr) -> Value {
        let name = expr.name.as_str();
        if expr.is_primitive() {
            return json!({"type": name});
        }
        if self.schemas_in_use.insert(name.to_string()) {
            debug!("Schema now in use: {}", name);
        }
        json!({"$ref": format!("{}{}", SCHEMA_REF_PREFIX, name)})
    }

    /// Names referenced so far, including the baseline.
    pub fn schemas_in_use(&self) -> &BTreeSet<String> {
        &self.schemas_in_use
    }
}

impl Default for TypeResolver {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

//! Per-route configuration from documentation blocks.
//!
//! The `/** ... */` block above a route registration is YAML once the comment markers are
//! removed:
//!
//! ```text
//! /**
//!  * @swagger
//!  * summary: Fetch one account
//!  * tags:
//!  *   - Accounts
//!  * response: The account
//!  * path:
//!  *   accountId:
//!  *     description: Account identifier
//! */
//! ```

use crate::error::{Error, Result};
use crate::type_resolver::JSON_MIMETYPE;
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Documentation and schema override for one path or query parameter.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParamDoc {
    pub description: Option<String>,
    pub schema: Option<Value>,
}

/// Raw keys of a documentation block, before defaults are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawDocConfig {
    summary: Option<String>,
    tags: Option<Vec<String>>,
    body: Option<String>,
    response: Option<String>,
    mimetype: Option<String>,
    body_mimetype: Option<String>,
    body_required: Option<bool>,
    openapi: Option<bool>,
    query: BTreeMap<String, ParamDoc>,
    path: BTreeMap<String, ParamDoc>,
}

/// Route configuration with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DocConfig {
    pub summary: Option<String>,
    /// Explicit tags, or the default tags of the route's URL prefix
    pub tags: Option<Vec<String>>,
    /// Request body description
    pub body: Option<String>,
    /// 200 response description
    pub response: Option<String>,
    /// Mimetype of the 200 response
    pub mimetype: String,
    /// Mimetypes zipped by position against the request body alternatives
    pub body_mimetypes: Vec<String>,
    pub body_required: bool,
    /// False removes the route from the document
    pub openapi: bool,
    pub query: BTreeMap<String, ParamDoc>,
    pub path: BTreeMap<String, ParamDoc>,
}

impl DocConfig {
    /// Configuration used when a route has no documentation block.
    pub fn defaults(default_tags: Option<&[String]>) -> Self {
        Self::from_raw(RawDocConfig::default(), default_tags)
    }

    /// Parse the stripped lines of a documentation block.
    ///
    /// `file` only labels errors. A block that is plain prose rather than a YAML mapping falls
    /// back to the defaults.
    pub fn parse(lines: &[String], default_tags: Option<&[String]>, file: &Path) -> Result<Self> {
        let text = lines
            .iter()
            .filter(|line| !line.contains("@swagger"))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");

        let raw = match serde_yaml::from_str::<serde_yaml::Value>(&text) {
            Ok(serde_yaml::Value::Null) => RawDocConfig::default(),
            Ok(value @ serde_yaml::Value::Mapping(_)) => serde_yaml::from_value(value).map_err(|e| {
                Error::DocBlock {
                    file: file.to_path_buf(),
                    message: e.to_string(),
                }
            })?,
            Ok(_) => {
                warn!(
                    "Documentation block in {} is not a key/value block, using defaults",
                    file.display()
                );
                RawDocConfig::default()
            }
            Err(e) => {
                warn!(
                    "Documentation block in {} is not valid YAML ({}), using defaults",
                    file.display(),
                    e
                );
                RawDocConfig::default()
            }
        };

        Ok(Self::from_raw(raw, default_tags))
    }

    fn from_raw(raw: RawDocConfig, default_tags: Option<&[String]>) -> Self {
        let body_mimetypes = raw
            .body_mimetype
            .as_deref()
            .unwrap_or(JSON_MIMETYPE)
            .split('|')
            .map(|mimetype| mimetype.trim().to_string())
            .collect();

        Self {
            summary: raw.summary,
            tags: raw.tags.or_else(|| default_tags.map(<[String]>::to_vec)),
            body: raw.body,
            response: raw.response,
            mimetype: raw.mimetype.unwrap_or_else(|| JSON_MIMETYPE.to_string()),
            body_mimetypes,
            body_required: raw.body_required.unwrap_or(true),
            openapi: raw.openapi.unwrap_or(true),
            query: raw.query,
            path: raw.path,
        }
    }
}

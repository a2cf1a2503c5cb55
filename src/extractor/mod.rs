//! Route extraction from Express route files.
//!
//! Every route file registers (at most) one handler on a router, typed through the
//! `TypedRequest*` / `TypedResponse` wrapper interfaces:
//!
//! ```text
//! router.get(
//!   "/:accountId",
//!   async (req: TypedRequestPath<{ accountId: string }>, res: TypedResponse<AccountRes>, next) => {
//!     ...
//!     next(new NotFoundError("no such account"));
//!   }
//! );
//! ```
//!
//! [`file_scan`] walks the lines of a file and [`registration`] turns the text of one
//! registration call into a [`RouteDescriptor`].

pub mod file_scan;
pub mod registration;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// HTTP methods a router registration may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    /// Parse the method name of a `router.<verb>(...)` call.
    pub fn parse(verb: &str) -> Option<Self> {
        match verb {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "options" => Some(HttpMethod::Options),
            "head" => Some(HttpMethod::Head),
            _ => None,
        }
    }

    /// Lowercase verb, as used for OpenAPI path item keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized description of one registered route.
///
/// The request parts hold either [`crate::type_resolver::NEVER`] or a type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub method: HttpMethod,
    /// Path template including the directory's URL prefix, still in `:name` form
    pub uri: String,
    /// False when the request wrapper lacks the `User` prefix
    pub is_secure: bool,
    pub request_body: String,
    pub request_query: String,
    pub request_params: String,
    /// Ordered response alternatives, never empty
    pub response_types: Vec<String>,
}

impl RouteDescriptor {
    /// The canonical (first) response type.
    pub fn response_type(&self) -> &str {
        &self.response_types[0]
    }
}

/// Status code to error-kind label, collected over a whole route file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorCodeMap(BTreeMap<String, String>);

impl ErrorCodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `label` for `status`, replacing an earlier label.
    pub fn insert(&mut self, status: impl Into<String>, label: impl Into<String>) {
        self.0.insert(status.into(), label.into());
    }

    /// Record `label` for `status` unless the code is already known.
    pub fn insert_if_absent(&mut self, status: impl Into<String>, label: impl Into<String>) {
        self.0.entry(status.into()).or_insert_with(|| label.into());
    }

    pub fn get(&self, status: &str) -> Option<&str> {
        self.0.get(status).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(code, label)| (code.as_str(), label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything one route file contributes to the document.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// URL prefix the file's directory maps to
    pub url_prefix: String,
    pub route: Option<RouteDescriptor>,
    /// Stripped lines of the documentation block closest before the registration
    pub doc_lines: Option<Vec<String>>,
    pub error_codes: ErrorCodeMap,
}

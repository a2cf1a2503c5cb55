use crate::closure::resolve_closure;
use crate::config::{PrefixTables, RunConfig};
use crate::doc_block::{DocConfig, ParamDoc};
use crate::error::{Error, Result};
use crate::extractor::{HttpMethod, RouteDescriptor, ScannedFile};
use crate::schema_library::SchemaLibrary;
use crate::type_resolver::{
    parse_param_list, split_request_body, ParamSpec, TypeResolver, JSON_MIMETYPE, NEVER,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the document's single security scheme.
pub const SECURITY_SCHEME_NAME: &str = "OAuth2AuthorizationCodeBearer";

/// Scheme name to required scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// Top-level keys carried over from the run configuration
    base: Map<String, Value>,
    /// OpenAPI info section
    info: Map<String, Value>,
    /// Paths collection (URL path -> PathItem)
    paths: BTreeMap<String, PathItem>,
    /// Schema referenced by every error response
    error_schema: String,
    resolver: TypeResolver,
    route_count: usize,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    /// Get the operation registered for `method`.
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
        }
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Empty for routes that do not require authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
    /// Path parameters first, then query parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Status code -> response
    pub responses: BTreeMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query)
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: Value,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Mimetype -> media type
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Value,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: BTreeMap<String, MediaType>,
}

/// OAuth2 security scheme with a single authorization-code flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub flows: OAuthFlows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthFlows {
    #[serde(rename = "authorizationCode")]
    pub authorization_code: OAuthFlow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthFlow {
    pub scopes: BTreeMap<String, String>,
    #[serde(rename = "authorizationUrl")]
    pub authorization_url: String,
    #[serde(rename = "tokenUrl")]
    pub token_url: String,
}

impl Default for SecurityScheme {
    fn default() -> Self {
        Self {
            scheme_type: "oauth2".to_string(),
            flows: OAuthFlows {
                authorization_code: OAuthFlow {
                    scopes: BTreeMap::new(),
                    authorization_url: String::new(),
                    token_url: "/token".to_string(),
                },
            },
        }
    }
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(rename = "securitySchemes")]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    /// Schema definitions, the closure of the schemas the routes use
    pub schemas: BTreeMap<String, Value>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// Keys copied from the run configuration (`openapi`, `servers`, ...)
    #[serde(flatten)]
    pub base: Map<String, Value>,
    pub info: Map<String, Value>,
    pub security: Vec<SecurityRequirement>,
    pub components: Components,
    pub paths: BTreeMap<String, PathItem>,
}

/// A finished document and what went into it.
#[derive(Debug, Clone)]
pub struct BuiltDocument {
    pub document: OpenApiDocument,
    /// Number of operations in the document
    pub route_count: usize,
    /// Referenced schema names the library did not define
    pub missing_schemas: Vec<String>,
}

const GENERATED_KEYS: [&str; 3] = ["security", "components", "paths"];

impl OpenApiBuilder {
    /// Create a builder seeded with `base` top-level keys.
    pub fn new(mut base: Map<String, Value>, baseline_schemas: &[String], error_schema: &str) -> Self {
        debug!("Initializing OpenApiBuilder");
        for key in GENERATED_KEYS {
            if base.remove(key).is_some() {
                warn!("Ignoring `{}` from the run configuration, it is generated", key);
            }
        }
        let info = match base.remove("info") {
            Some(Value::Object(info)) => info,
            _ => Map::new(),
        };

        Self {
            base,
            info,
            paths: BTreeMap::new(),
            error_schema: error_schema.to_string(),
            resolver: TypeResolver::new(baseline_schemas.iter().cloned()),
            route_count: 0,
        }
    }

    /// Create a builder for one run configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.document.clone(), &config.baseline_schemas, &config.error_schema)
    }

    /// Set `info.version`.
    pub fn with_version(mut self, version: &str) -> Self {
        self.info.insert("version".to_string(), Value::String(version.to_string()));
        self
    }

    /// Add the route of a scanned file to the document.
    ///
    /// Returns false when the file has no documentable route or its documentation block
    /// opts out with `openapi: false`.
    pub fn add_file(&mut self, file: &ScannedFile, tables: &PrefixTables) -> Result<bool> {
        let Some(route) = &file.route else {
            return Ok(false);
        };

        let default_tags = tables.tags_for(&file.url_prefix);
        let config = match &file.doc_lines {
            Some(lines) => DocConfig::parse(lines, default_tags, &file.path)?,
            None => DocConfig::defaults(default_tags),
        };
        if !config.openapi {
            debug!("Route {} {} is excluded from the document", route.method, route.uri);
            return Ok(false);
        }

        let path_params = params(&route.request_params, false, &file.path)?;
        let query_params = params(&route.request_query, true, &file.path)?;
        let openapi_path = Self::convert_path_format(&route.uri, &path_params);
        debug!("Adding route: {} {}", route.method, openapi_path);

        let mut parameters: Vec<Parameter> = path_params
            .iter()
            .map(|param| path_parameter(param, config.path.get(&param.name)))
            .collect();
        parameters.extend(
            query_params
                .iter()
                .map(|param| query_parameter(param, config.query.get(&param.name))),
        );

        let request_body = self.request_body(route, &config);
        let responses = self.responses(route, file, &config);

        let operation = Operation {
            tags: config.tags,
            summary: config.summary,
            security: (!route.is_secure).then(Vec::new),
            parameters,
            request_body,
            responses,
        };

        let slot = self.paths.entry(openapi_path.clone()).or_default().slot(route.method);
        if slot.is_some() {
            warn!(
                "{} {} is registered more than once, keeping {}",
                route.method,
                openapi_path,
                file.path.display()
            );
        } else {
            self.route_count += 1;
        }
        *slot = Some(operation);

        Ok(true)
    }

    fn request_body(&mut self, route: &RouteDescriptor, config: &DocConfig) -> Option<RequestBody> {
        if route.request_body == NEVER {
            return None;
        }

        // Bodies are documented by their declared type whatever the mimetype.
        let content = split_request_body(&route.request_body)
            .iter()
            .zip(&config.body_mimetypes)
            .map(|(body_type, mimetype)| {
                let schema = self.resolver.resolve(body_type, JSON_MIMETYPE);
                (mimetype.clone(), MediaType { schema })
            })
            .collect();

        Some(RequestBody {
            description: config.body.clone(),
            required: config.body_required,
            content,
        })
    }

    fn responses(
        &mut self,
        route: &RouteDescriptor,
        file: &ScannedFile,
        config: &DocConfig,
    ) -> BTreeMap<String, Response> {
        let schema = self.resolver.resolve(route.response_type(), &config.mimetype);
        let mut responses = BTreeMap::from([(
            "200".to_string(),
            Response {
                description: config.response.clone(),
                content: BTreeMap::from([(config.mimetype.clone(), MediaType { schema })]),
            },
        )]);

        // Alternatives are not documented but their schemas must be available.
        for alternative in &route.response_types[1..] {
            self.resolver.resolve(alternative, JSON_MIMETYPE);
        }

        for (code, label) in file.error_codes.iter() {
            if responses.contains_key(code) {
                continue;
            }
            let schema = self.resolver.resolve(&self.error_schema, JSON_MIMETYPE);
            responses.insert(
                code.to_string(),
                Response {
                    description: Some(label.to_string()),
                    content: BTreeMap::from([(JSON_MIMETYPE.to_string(), MediaType { schema })]),
                },
            );
        }

        responses
    }

    /// Convert `:param` segments of declared path parameters to `{param}`.
    fn convert_path_format(uri: &str, path_params: &[ParamSpec]) -> String {
        uri.split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if path_params.iter().any(|param| param.name == name) => {
                    format!("{{{}}}", name)
                }
                _ => segment.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Build the final OpenAPI document
    pub fn build(self, library: &SchemaLibrary) -> BuiltDocument {
        debug!("Building final OpenAPI document");
        let closure = resolve_closure(self.resolver.schemas_in_use(), library);

        let document = OpenApiDocument {
            base: self.base,
            info: self.info,
            security: vec![BTreeMap::from([(SECURITY_SCHEME_NAME.to_string(), Vec::new())])],
            components: Components {
                security_schemes: BTreeMap::from([(
                    SECURITY_SCHEME_NAME.to_string(),
                    SecurityScheme::default(),
                )]),
                schemas: closure.schemas,
            },
            paths: self.paths,
        };

        BuiltDocument {
            document,
            route_count: self.route_count,
            missing_schemas: closure.missing,
        }
    }
}

fn params(expr: &str, honor_optional: bool, file: &Path) -> Result<Vec<ParamSpec>> {
    parse_param_list(expr, honor_optional).map_err(|message| Error::malformed(file, expr, message))
}

fn path_parameter(param: &ParamSpec, doc: Option<&ParamDoc>) -> Parameter {
    let schema = match doc.and_then(|doc| doc.schema.clone()) {
        Some(schema) => schema,
        None if param.name == "id" => json!({"type": param.type_name, "format": "uuid"}),
        None => json!({"type": param.type_name}),
    };
    Parameter {
        name: param.name.clone(),
        location: "path".to_string(),
        required: true,
        description: doc.and_then(|doc| doc.description.clone()),
        schema,
    }
}

fn query_parameter(param: &ParamSpec, doc: Option<&ParamDoc>) -> Parameter {
    Parameter {
        name: param.name.clone(),
        location: "query".to_string(),
        required: param.required,
        description: doc.and_then(|doc| doc.description.clone()),
        schema: doc
            .and_then(|doc| doc.schema.clone())
            .unwrap_or_else(|| json!({"type": param.type_name})),
    }
}

//! Recognition of a single route registration and of error-forwarding calls.

use crate::error::{Error, Result};
use crate::extractor::{ErrorCodeMap, HttpMethod, RouteDescriptor};
use crate::type_resolver::{split_top_level, NAMESPACE_QUALIFIER, NEVER};
use log::debug;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static PATH_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"router\.(\w+)\(\s*["'`]([^"'`]*)["'`]"#).expect("valid registration pattern")
});

static REQUEST_MATCHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TypedRequest(\w*)<(.*?)>").expect("valid request pattern"));

static RESPONSE_MATCHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TypedResponse<(.*?)>").expect("valid response pattern"));

static ERROR_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"next\(\s*new\s+(\w+)\((.*?)[,)]").expect("valid error pattern")
});

static STATUS_MATCHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.status\((.*?)\)\.json").expect("valid status pattern"));

/// Error kinds with a fixed status code; anything else (except `HttpError`) maps to 500.
const ERROR_STATUS_CODES: [(&str, u16); 4] = [
    ("InvalidRequestError", 422),
    ("NotAllowedError", 403),
    ("NotFoundError", 404),
    ("NotAuthorizedError", 401),
];

/// A registration call with whatever typing information it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub method: HttpMethod,
    pub uri: String,
    pub is_secure: bool,
    /// `(body, query, params)` when a request wrapper was found
    pub request: Option<(String, String, String)>,
    pub response_types: Vec<String>,
}

impl Registration {
    /// Turn the registration into a descriptor, or `None` when it cannot be documented.
    pub fn into_descriptor(self) -> Option<RouteDescriptor> {
        let (request_body, request_query, request_params) = match self.request {
            Some(request) => request,
            None => {
                debug!("Dropping {} {}: no typed request", self.method, self.uri);
                return None;
            }
        };
        if self.response_types.is_empty() {
            debug!("Dropping {} {}: no typed response", self.method, self.uri);
            return None;
        }

        Some(RouteDescriptor {
            method: self.method,
            uri: self.uri,
            is_secure: self.is_secure,
            request_body,
            request_query,
            request_params,
            response_types: self.response_types,
        })
    }
}

/// Parse the concatenated text of one `router.<verb>("<path>", ...)` call.
///
/// Returns `Ok(None)` when the text is not a registration with a known verb.
pub fn parse_registration(text: &str, url_prefix: &str, file: &Path) -> Result<Option<Registration>> {
    let Some(captures) = PATH_MATCHER.captures(text) else {
        return Ok(None);
    };
    let Some(method) = HttpMethod::parse(&captures[1]) else {
        debug!("Ignoring router.{} call in {}", &captures[1], file.display());
        return Ok(None);
    };

    let mut registration = Registration {
        method,
        uri: format!("{}{}", url_prefix, &captures[2]),
        is_secure: true,
        request: None,
        response_types: Vec::new(),
    };

    if let Some(request) = REQUEST_MATCHER.captures(text) {
        let (kind, is_secure) = match request[1].strip_prefix("User") {
            Some(kind) => (kind, true),
            None => (&request[1], false),
        };
        registration.is_secure = is_secure;
        let (body, query, params) = split_request_args(kind, &request[2], text, file)?;
        registration.request = Some((strip_namespace(&body), query, params));
    }

    if let Some(response) = RESPONSE_MATCHER.captures(text) {
        registration.response_types = response[1]
            .split('|')
            .map(|alternative| strip_namespace(alternative.trim()))
            .filter(|alternative| !alternative.is_empty())
            .collect();
    }

    Ok(Some(registration))
}

/// Dispatch the wrapper arguments to `(body, query, params)` by wrapper kind.
fn split_request_args(
    kind: &str,
    args: &str,
    text: &str,
    file: &Path,
) -> Result<(String, String, String)> {
    let args = args.trim().to_string();
    let never = || NEVER.to_string();

    match kind {
        "Path" => Ok((never(), never(), args)),
        "Query" => Ok((never(), args, never())),
        "Body" => Ok((args, never(), never())),
        _ => {
            let parts = split_top_level(&args, ',');
            match <[String; 3]>::try_from(parts) {
                Ok([body, query, params]) => Ok((body, query, params)),
                Err(parts) => Err(Error::malformed(
                    file,
                    text,
                    format!(
                        "TypedRequest{} expects <body, query, params>, found {} argument(s)",
                        kind,
                        parts.len()
                    ),
                )),
            }
        }
    }
}

fn strip_namespace(type_expr: &str) -> String {
    type_expr.replace(NAMESPACE_QUALIFIER, "")
}

/// Record the status of a `next(new <Kind>(...))` call found in `text`.
pub fn record_error_call(text: &str, error_codes: &mut ErrorCodeMap) {
    let Some(captures) = ERROR_MATCHER.captures(text) else {
        return;
    };
    let kind = &captures[1];
    let status = if kind == "HttpError" {
        captures[2].trim().to_string()
    } else {
        ERROR_STATUS_CODES
            .iter()
            .find(|(name, _)| *name == kind)
            .map_or(500, |(_, code)| *code)
            .to_string()
    };
    debug!("Error response {} -> {}", status, kind);
    error_codes.insert(status, kind);
}

/// Record the code of a direct `.status(<code>).json(...)` call found in `line`.
pub fn record_status_call(line: &str, error_codes: &mut ErrorCodeMap) {
    let Some(captures) = STATUS_MATCHER.captures(line) else {
        return;
    };
    match captures[1].trim().parse::<u16>() {
        Ok(code) => error_codes.insert_if_absent(code.to_string(), "Unknown"),
        Err(_) => debug!("Ignoring non-literal status `{}`", &captures[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Option<Registration> {
        parse_registration(text, "/items", Path::new("items/get.ts")).unwrap()
    }

    #[test]
    fn test_path_wrapper() {
        let registration = parse(
            r#"router.get("/:id",async (req: TypedRequestPath<{id: string}>,res: TypedResponse<Item>,next: NextFunction) => {"#,
        )
        .unwrap();

        assert_eq!(registration.method, HttpMethod::Get);
        assert_eq!(registration.uri, "/items/:id");
        assert!(!registration.is_secure);
        assert_eq!(
            registration.request,
            Some(("never".to_string(), "never".to_string(), "{id: string}".to_string()))
        );
        assert_eq!(registration.response_types, vec!["Item".to_string()]);
    }

    #[test]
    fn test_user_prefix_marks_secure() {
        let registration = parse(
            r#"router.post("/",async (req: TypedRequestUserBody<models.ItemCreate>,res: TypedResponse<Item>) => {"#,
        )
        .unwrap();

        assert!(registration.is_secure);
        assert_eq!(
            registration.request,
            Some(("ItemCreate".to_string(), "never".to_string(), "never".to_string()))
        );
    }

    #[test]
    fn test_query_wrapper_with_union_response() {
        let registration = parse(
            r#"router.get("/",async (req: TypedRequestQuery<{ page?: number }>,res: TypedResponse<Item | models.ItemError>) => {"#,
        )
        .unwrap();

        assert_eq!(
            registration.request,
            Some(("never".to_string(), "{ page?: number }".to_string(), "never".to_string()))
        );
        assert_eq!(
            registration.response_types,
            vec!["Item".to_string(), "ItemError".to_string()]
        );
    }

    #[test]
    fn test_positional_triple_splits_outside_braces() {
        let registration = parse(
            r#"router.put("/:id",async (req: TypedRequestUser<ItemUpdate, never, { id: string, rev: number }>,res: TypedResponse<Item>) => {"#,
        )
        .unwrap();

        assert!(registration.is_secure);
        assert_eq!(
            registration.request,
            Some((
                "ItemUpdate".to_string(),
                "never".to_string(),
                "{ id: string, rev: number }".to_string()
            ))
        );
    }

    #[test]
    fn test_wrong_arity_is_malformed() {
        let result = parse_registration(
            r#"router.put("/:id",async (req: TypedRequest<ItemUpdate, never>) => {"#,
            "",
            Path::new("put.ts"),
        );
        assert!(matches!(result, Err(Error::MalformedLine { .. })));
    }

    #[test]
    fn test_unknown_verb_and_non_registration() {
        assert!(parse(r#"router.use("/", middleware)"#).is_none());
        assert!(parse("const value = compute(1);").is_none());
    }

    #[test]
    fn test_into_descriptor_requires_both_types() {
        let missing_response = parse(r#"router.get("/",async (req: TypedRequestQuery<never>) => {"#).unwrap();
        assert!(missing_response.into_descriptor().is_none());

        let missing_request = parse(r#"router.get("/",async (req, res: TypedResponse<Item>) => {"#).unwrap();
        assert!(missing_request.into_descriptor().is_none());

        let complete = parse(
            r#"router.get("/",async (req: TypedRequestQuery<never>, res: TypedResponse<Item[]>) => {"#,
        )
        .unwrap()
        .into_descriptor()
        .unwrap();
        assert_eq!(complete.response_type(), "Item[]");
    }

    #[test]
    fn test_error_calls() {
        let mut codes = ErrorCodeMap::new();
        record_error_call(r#"return next(new HttpError(418, "teapot"));"#, &mut codes);
        record_error_call(r#"next(new NotFoundError("missing"));"#, &mut codes);
        record_error_call("next(new SomethingOdd());", &mut codes);
        record_error_call("next(error);", &mut codes);

        assert_eq!(codes.get("418"), Some("HttpError"));
        assert_eq!(codes.get("404"), Some("NotFoundError"));
        assert_eq!(codes.get("500"), Some("SomethingOdd"));
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn test_status_calls() {
        let mut codes = ErrorCodeMap::new();
        codes.insert("404", "NotFoundError");
        record_status_call("res.status(404).json({ message: 'gone' });", &mut codes);
        record_status_call("res.status(400).json(errors);", &mut codes);
        record_status_call("res.status(response.statusCode).json(response);", &mut codes);
        record_status_call("res.status(201).send(response);", &mut codes);

        assert_eq!(codes.get("404"), Some("NotFoundError"));
        assert_eq!(codes.get("400"), Some("Unknown"));
        assert_eq!(codes.len(), 2);
    }
}

//! Fetch call arguments and the tolerant `(method, url)` resolver.
//!
//! Instrumented callers reach fetch in several shapes: a bare URL string, a
//! request object that knows its own URL and method, or either of those plus
//! an init record. [`parse_fetch_args`] normalizes all of them without ever
//! failing; undetermined pieces fall back to `GET` and the empty URL.

use std::collections::HashMap;

use bytes::Bytes;

/// The resource argument of a fetch call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResource {
    /// A plain URL string.
    Url(String),
    /// A request object carrying its own URL and optional method.
    Request(FetchRequest),
}

/// A request-shaped fetch resource.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub method: Option<String>,
}

/// The optional second argument of a fetch call.
///
/// When an init record is present its `method` decides the request method;
/// a method carried by the resource object is ignored, matching the calling
/// convention of the platform entry point this crate wraps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchInit {
    pub method: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
}

/// The full argument list of one fetch call.
///
/// `FetchArgs::default()` is the zero-argument call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchArgs {
    pub resource: Option<FetchResource>,
    pub init: Option<FetchInit>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

impl FetchInit {
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl FetchArgs {
    /// A one-argument call.
    pub fn new(resource: impl Into<FetchResource>) -> Self {
        Self {
            resource: Some(resource.into()),
            init: None,
        }
    }

    /// A two-argument call.
    pub fn with_init(resource: impl Into<FetchResource>, init: FetchInit) -> Self {
        Self {
            resource: Some(resource.into()),
            init: Some(init),
        }
    }
}

impl From<&str> for FetchResource {
    fn from(url: &str) -> Self {
        FetchResource::Url(url.to_string())
    }
}

impl From<String> for FetchResource {
    fn from(url: String) -> Self {
        FetchResource::Url(url)
    }
}

impl From<reqwest::Url> for FetchResource {
    fn from(url: reqwest::Url) -> Self {
        FetchResource::Url(url.to_string())
    }
}

impl From<FetchRequest> for FetchResource {
    fn from(request: FetchRequest) -> Self {
        FetchResource::Request(request)
    }
}

/// Resolves `(method, url)` from a fetch argument list.
///
/// Zero arguments yield `("GET", "")`. The URL comes from the resource: the
/// string itself, or a request object's `url`. The method comes from the init
/// record when one is present (even if it carries no method), otherwise from
/// a request-shaped resource, otherwise `GET`. Methods are uppercased.
pub fn parse_fetch_args(args: &FetchArgs) -> (String, String) {
    let url = match &args.resource {
        Some(FetchResource::Url(url)) => url.clone(),
        Some(FetchResource::Request(request)) => request.url.clone(),
        None => String::new(),
    };

    let method = match &args.init {
        Some(init) => normalize_method(init.method.as_deref()),
        None => match &args.resource {
            Some(FetchResource::Request(request)) => normalize_method(request.method.as_deref()),
            _ => normalize_method(None),
        },
    };

    (method, url)
}

fn normalize_method(method: Option<&str>) -> String {
    match method {
        Some(method) if !method.trim().is_empty() => method.trim().to_uppercase(),
        _ => "GET".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_arguments_defaults_to_get_and_empty_url() {
        let (method, url) = parse_fetch_args(&FetchArgs::default());
        assert_eq!(method, "GET");
        assert_eq!(url, "");
    }

    #[test]
    fn test_url_with_init_method_is_uppercased() {
        let args = FetchArgs::with_init(
            "https://example.com/api",
            FetchInit::default().with_method("post"),
        );

        let (method, url) = parse_fetch_args(&args);
        assert_eq!(method, "POST");
        assert_eq!(url, "https://example.com/api");
    }

    #[test]
    fn test_request_object_contributes_url() {
        let args = FetchArgs::new(FetchRequest::new("https://example.com/items"));

        let (method, url) = parse_fetch_args(&args);
        assert_eq!(method, "GET");
        assert_eq!(url, "https://example.com/items");
    }

    #[test]
    fn test_request_object_method_used_without_init() {
        let args = FetchArgs::new(FetchRequest::new("https://example.com").with_method("delete"));

        let (method, _) = parse_fetch_args(&args);
        assert_eq!(method, "DELETE");
    }

    #[test]
    fn test_init_without_method_overrides_request_method() {
        let args = FetchArgs::with_init(
            FetchRequest::new("https://example.com").with_method("delete"),
            FetchInit::default(),
        );

        let (method, _) = parse_fetch_args(&args);
        assert_eq!(method, "GET");
    }

    #[test]
    fn test_blank_method_defaults_to_get() {
        let args = FetchArgs::with_init(
            "https://example.com",
            FetchInit::default().with_method("  "),
        );

        let (method, _) = parse_fetch_args(&args);
        assert_eq!(method, "GET");
    }

    #[test]
    fn test_string_conversions_build_url_resources() {
        let from_str: FetchResource = "https://a.example".into();
        let from_string: FetchResource = String::from("https://b.example").into();

        assert_eq!(from_str, FetchResource::Url("https://a.example".to_string()));
        assert_eq!(from_string, FetchResource::Url("https://b.example".to_string()));
    }

    #[test]
    fn test_parsed_url_conversion() {
        let url = reqwest::Url::parse("https://example.com/path").unwrap();
        let resource: FetchResource = url.into();

        assert_eq!(
            resource,
            FetchResource::Url("https://example.com/path".to_string())
        );
    }
}

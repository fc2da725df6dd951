//! Transport boundary
//!
//! No sockets live here. A server hands over an [`Exchange`] and writes back
//! the [`EncodedResponse`] it gets from [`serve`].

use crate::{Body, BodyCodec, Dispatcher, HandlerResult, RequestContext};
use ahash::AHashMap;
use std::borrow::Cow;

#[cfg(feature = "logging")]
use tracing::{trace, warn};

/// Methods the dispatcher answers; anything else gets a 405
pub const ALLOWED_METHODS: [&str; 2] = ["GET", "POST"];

/// A raw request as read off the wire
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    method: String,
    path: String,
    raw_query: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Exchange {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Split `/path?query` into its two halves
    pub fn from_target(method: impl Into<String>, target: &str) -> Self {
        match target.split_once('?') {
            Some((path, query)) => Self::new(method, path).with_query(query),
            None => Self::new(method, target),
        }
    }

    pub fn with_query(mut self, raw_query: impl Into<String>) -> Self {
        self.raw_query = Some(raw_query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn raw_query(&self) -> Option<&str> {
        self.raw_query.as_deref()
    }

    #[inline]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Status, headers and body bytes ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl EncodedResponse {
    fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Value of the first header called `name`, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a raw query string.
///
/// Pairs split on `&`, then on the first `=`. `+` decodes to a space.
/// A repeated key keeps its last value.
pub fn parse_query(raw: &str) -> AHashMap<String, String> {
    let mut params = AHashMap::new();

    for part in raw.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').unwrap_or((part, ""));
        params.insert(decode_component(key), decode_component(value));
    }

    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Build the request context, or the 405 answer for an unsupported method.
///
/// Header names are lower-cased; for repeated names the first value wins.
/// The exchange itself, minus its body, travels along as the context's
/// exchange handle.
pub fn request_context(mut exchange: Exchange) -> Result<RequestContext, EncodedResponse> {
    if !ALLOWED_METHODS.contains(&exchange.method.as_str()) {
        #[cfg(feature = "logging")]
        trace!(
            target: crate::logging::TARGET,
            method = exchange.method.as_str(),
            path = exchange.path.as_str(),
            "Method not allowed"
        );

        return Err(EncodedResponse::empty(405));
    }

    let query = exchange
        .raw_query
        .as_deref()
        .map(parse_query)
        .unwrap_or_default();

    let body = match String::from_utf8_lossy(&std::mem::take(&mut exchange.body)) {
        Cow::Borrowed(text) => text.to_owned(),
        Cow::Owned(text) => text,
    };

    let mut ctx = RequestContext::new(exchange.path.clone())
        .with_query(query)
        .with_body(body);
    for (name, value) in &exchange.headers {
        if ctx.header(name).is_none() {
            ctx = ctx.with_header(name, value.clone());
        }
    }

    Ok(ctx.with_exchange(exchange))
}

/// Encode a result for the wire.
///
/// Handler headers come first; `Content-Type` is added from the body kind
/// unless the handler already set one.
pub fn encode_response(result: &HandlerResult, codec: &dyn BodyCodec) -> EncodedResponse {
    let (content_type, body) = match &result.body {
        Body::Empty => (None, Vec::new()),
        Body::Text(text) => (Some("text/plain"), text.as_bytes().to_vec()),
        Body::Bytes(bytes) => (Some("application/octet-stream"), bytes.clone()),
        Body::Json(value) => match codec.encode(value) {
            Ok(bytes) => (Some(codec.content_type()), bytes),
            Err(_err) => {
                #[cfg(feature = "logging")]
                warn!(target: crate::logging::TARGET, error = %_err, "Failed to encode body");

                let mut failed = EncodedResponse::empty(500);
                failed.headers.push(("Content-Type".into(), "text/plain".into()));
                failed.body = b"500 Internal Server Error".to_vec();
                return failed;
            }
        },
    };

    let mut headers: Vec<(String, String)> = result
        .headers
        .iter()
        .map(|(name, value)| (name.to_owned(), value.to_owned()))
        .collect();
    let has_content_type = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
    if let Some(content_type) = content_type.filter(|_| !has_content_type) {
        headers.push(("Content-Type".into(), content_type.into()));
    }

    EncodedResponse {
        status: result.status,
        headers,
        body,
    }
}

/// Run one exchange through the dispatcher.
pub fn serve(dispatcher: &Dispatcher, exchange: Exchange) -> EncodedResponse {
    match request_context(exchange) {
        Ok(mut ctx) => {
            let result = dispatcher.dispatch(&mut ctx);
            encode_response(&result, dispatcher.codec())
        }
        Err(rejected) => rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonCodec, ResponseEntity};

    #[test]
    fn test_parse_query() {
        let query = parse_query("q=rust+lang&page=2&name=J%C3%BCrgen&flag&&page=3");
        assert_eq!(query.get("q").map(String::as_str), Some("rust lang"));
        assert_eq!(query.get("name").map(String::as_str), Some("Jürgen"));
        assert_eq!(query.get("flag").map(String::as_str), Some(""));
        assert_eq!(query.get("page").map(String::as_str), Some("3"));
        assert_eq!(query.len(), 4);
    }

    #[test]
    fn test_parse_query_keeps_bad_escapes() {
        let query = parse_query("v=%FF%FE");
        assert_eq!(query.get("v").map(String::as_str), Some("%FF%FE"));
    }

    #[test]
    fn test_from_target() {
        let exchange = Exchange::from_target("GET", "/search?q=x");
        assert_eq!(exchange.path(), "/search");
        assert_eq!(exchange.raw_query(), Some("q=x"));

        let exchange = Exchange::from_target("GET", "/plain");
        assert_eq!(exchange.raw_query(), None);
    }

    #[test]
    fn test_rejects_other_methods() {
        let rejected = request_context(Exchange::new("DELETE", "/users/1")).unwrap_err();
        assert_eq!(rejected.status, 405);
        assert!(rejected.body.is_empty());
    }

    #[test]
    fn test_request_context() {
        let exchange = Exchange::new("POST", "/users")
            .with_query("page=1")
            .with_header("X-Trace", "abc")
            .with_header("x-trace", "ignored")
            .with_body(br#"{"name":"ana"}"#.to_vec());

        let ctx = request_context(exchange).unwrap();
        assert_eq!(ctx.path(), "/users");
        assert_eq!(ctx.query_param("page"), Some("1"));
        assert_eq!(ctx.headers().get("x-trace").map(String::as_str), Some("abc"));
        assert_eq!(ctx.body(), r#"{"name":"ana"}"#);

        let handle = ctx.exchange::<Exchange>().unwrap();
        assert_eq!(handle.method(), "POST");
        assert!(handle.body().is_empty());
    }

    #[test]
    fn test_encode_text_and_bytes() {
        let text = encode_response(&HandlerResult::new(200, "hi"), &JsonCodec);
        assert_eq!(text.header("content-type"), Some("text/plain"));
        assert_eq!(text.body, b"hi");

        let bytes = encode_response(&HandlerResult::new(200, vec![1u8, 2]), &JsonCodec);
        assert_eq!(bytes.header("Content-Type"), Some("application/octet-stream"));

        let empty = encode_response(&HandlerResult::new(204, ()), &JsonCodec);
        assert!(empty.headers.is_empty());
        assert!(empty.body.is_empty());
    }

    #[test]
    fn test_encode_json_with_handler_headers_first() {
        let entity = ResponseEntity::status(201)
            .header("X-App", "demo")
            .body(serde_json::json!({ "id": 7 }));
        let encoded = encode_response(&entity.into(), &JsonCodec);

        assert_eq!(encoded.status, 201);
        assert_eq!(encoded.headers[0], ("X-App".to_string(), "demo".to_string()));
        assert_eq!(encoded.header("content-type"), Some("application/json"));
        assert_eq!(encoded.body, br#"{"id":7}"#);
    }

    #[test]
    fn test_handler_content_type_wins() {
        let entity = ResponseEntity::ok("<p>hi</p>").header("Content-Type", "text/html");
        let encoded = encode_response(&entity.into(), &JsonCodec);
        assert_eq!(encoded.headers.len(), 1);
        assert_eq!(encoded.header("content-type"), Some("text/html"));
    }
}

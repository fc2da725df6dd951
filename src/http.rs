//! Request and response values shared by the dispatcher and its collaborators

use ahash::AHashMap;
use serde::Serialize;
use std::any::Any;

use crate::HandlerError;

// =============================================================================
// Body
// =============================================================================

/// Response body. The variant decides how the transport encodes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// Sent as `text/plain`
    Text(String),
    /// Sent as `application/octet-stream`
    Bytes(Vec<u8>),
    /// Encoded by the body codec
    Json(serde_json::Value),
}

impl Body {
    /// Serialize any value into a structured body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|err| HandlerError::internal(format!("Failed to serialize body: {}", err)))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// The text payload, if this is a text body
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}

// =============================================================================
// Headers
// =============================================================================

/// Ordered header map with unique keys.
///
/// Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

// =============================================================================
// Results
// =============================================================================

/// The outcome of one dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResult {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

impl HandlerResult {
    pub fn new(status: u16, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }
}

impl From<ResponseEntity> for HandlerResult {
    fn from(entity: ResponseEntity) -> Self {
        Self {
            status: entity.status,
            headers: entity.headers,
            body: entity.body,
        }
    }
}

/// A handler reply carrying its own status and headers.
///
/// ```rust
/// use component_dispatcher::ResponseEntity;
///
/// let created = ResponseEntity::status(201).header("X-App", "demo").body("Created");
/// assert_eq!(created.status_code(), 201);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEntity {
    status: u16,
    headers: Headers,
    body: Body,
}

impl ResponseEntity {
    /// 200 with the given body
    pub fn ok(body: impl Into<Body>) -> Self {
        Self::status(200).body(body)
    }

    /// Start an entity with the given status and an empty body
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    #[inline]
    pub fn status_code(&self) -> u16 {
        self.status
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline]
    pub fn body_ref(&self) -> &Body {
        &self.body
    }
}

/// What a route or exception handler returns
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Used verbatim
    Entity(ResponseEntity),
    /// A bare value; status and headers come from the caller
    Value(Body),
}

impl From<ResponseEntity> for Reply {
    fn from(entity: ResponseEntity) -> Self {
        Reply::Entity(entity)
    }
}

macro_rules! impl_reply_from_value {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Reply {
                fn from(value: $ty) -> Self {
                    Reply::Value(value.into())
                }
            }
        )+
    };
}

impl_reply_from_value!(Body, &str, String, Vec<u8>, serde_json::Value, ());

// =============================================================================
// RequestContext
// =============================================================================

/// Everything known about one in-flight request.
///
/// Header names are stored lower-cased. The attribute bag lets interceptors
/// hand typed values to later phases of the same request.
#[derive(Default)]
pub struct RequestContext {
    body: String,
    path: String,
    path_variables: AHashMap<String, String>,
    query: AHashMap<String, String>,
    headers: AHashMap<String, String>,
    attributes: AHashMap<String, Box<dyn Any + Send + Sync>>,
    exchange: Option<Box<dyn Any + Send>>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, query: AHashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Add a header; the name is lower-cased
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach the transport's own request handle
    pub fn with_exchange<E: Any + Send>(mut self, exchange: E) -> Self {
        self.exchange = Some(Box::new(exchange));
        self
    }

    #[inline]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn path_variables(&self) -> &AHashMap<String, String> {
        &self.path_variables
    }

    pub fn path_variable(&self, name: &str) -> Option<&str> {
        self.path_variables.get(name).map(String::as_str)
    }

    pub(crate) fn set_path_variables(&mut self, variables: AHashMap<String, String>) {
        self.path_variables = variables;
    }

    #[inline]
    pub fn query(&self) -> &AHashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    #[inline]
    pub fn headers(&self) -> &AHashMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn set_attribute<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.attributes.insert(key.into(), Box::new(value));
    }

    /// Typed attribute lookup; `None` if absent or of another type
    pub fn attribute<T: Any>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key)?.downcast_ref::<T>()
    }

    pub fn remove_attribute(&mut self, key: &str) -> bool {
        self.attributes.remove(key).is_some()
    }

    /// The transport handle, if it is an `E`
    pub fn exchange<E: Any>(&self) -> Option<&E> {
        self.exchange.as_ref()?.downcast_ref::<E>()
    }

    pub fn exchange_mut<E: Any>(&mut self) -> Option<&mut E> {
        self.exchange.as_mut()?.downcast_mut::<E>()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("path", &self.path)
            .field("path_variables", &self.path_variables)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("attributes", &self.attributes.len())
            .field("has_exchange", &self.exchange.is_some())
            .finish()
    }
}

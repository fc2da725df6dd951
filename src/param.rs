//! Parameter binding declarations
//!
//! Each route lists one [`ParamSpec`] per handler parameter, in order. The
//! builders here produce them:
//!
//! ```rust
//! use component_dispatcher::param;
//!
//! let params = vec![
//!     param::path("id").typed::<i64>(),
//!     param::query("q"),
//!     param::query("page").typed::<i32>().default_value("1"),
//!     param::header("X-Debug").typed::<bool>().optional(),
//!     param::context(),
//! ];
//! assert_eq!(params.len(), 5);
//! ```

use crate::{BodyCodec, HandlerError, RequestContext, Validate};
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};

/// Decodes raw body text into the declared type, validating if declared
pub(crate) type BodyDecoder =
    fn(&dyn BodyCodec, &str) -> Result<Box<dyn Any + Send>, HandlerError>;

/// Where a parameter's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    PathVariable(String),
    QueryParam {
        name: String,
        required: bool,
        default: Option<String>,
    },
    /// `name` is stored lower-cased
    RequestHeader {
        name: String,
        required: bool,
        default: Option<String>,
    },
    RequestBody { required: bool, validated: bool },
    /// The request context itself
    RequestContext,
    /// No source can supply this parameter; binding always fails
    Unresolvable,
}

/// The type a scalar source is converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    String,
    /// `i32`
    Int,
    /// `i64`
    Long,
    Bool,
    /// Structured type decoded by the body codec
    Body(&'static str),
    /// Anything the binder cannot convert
    Other(&'static str),
}

impl TargetType {
    /// Map a Rust type onto the conversion table
    pub fn of<T: 'static>() -> Self {
        let id = TypeId::of::<T>();
        if id == TypeId::of::<String>() {
            TargetType::String
        } else if id == TypeId::of::<i32>() {
            TargetType::Int
        } else if id == TypeId::of::<i64>() {
            TargetType::Long
        } else if id == TypeId::of::<bool>() {
            TargetType::Bool
        } else {
            TargetType::Other(std::any::type_name::<T>())
        }
    }

    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            TargetType::String => "String",
            TargetType::Int => "i32",
            TargetType::Long => "i64",
            TargetType::Bool => "bool",
            TargetType::Body(name) | TargetType::Other(name) => name,
        }
    }
}

/// Binding declaration for one handler parameter
#[derive(Clone)]
pub struct ParamSpec {
    source: Source,
    target: TargetType,
    decoder: Option<BodyDecoder>,
}

impl ParamSpec {
    fn new(source: Source, target: TargetType) -> Self {
        Self {
            source,
            target,
            decoder: None,
        }
    }

    /// Convert the raw value into `T` (`String`, `i32`, `i64` or `bool`)
    pub fn typed<T: 'static>(mut self) -> Self {
        self.target = TargetType::of::<T>();
        self
    }

    /// Bind an absent value instead of failing when the source is missing
    pub fn optional(mut self) -> Self {
        match &mut self.source {
            Source::QueryParam { required, .. }
            | Source::RequestHeader { required, .. }
            | Source::RequestBody { required, .. } => *required = false,
            _ => {}
        }
        self
    }

    /// Fallback for a missing or empty query parameter or header.
    ///
    /// An empty default means no default.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        let value = if value.is_empty() { None } else { Some(value) };
        match &mut self.source {
            Source::QueryParam { default, .. } | Source::RequestHeader { default, .. } => {
                *default = value
            }
            _ => {}
        }
        self
    }

    #[inline]
    pub fn source(&self) -> &Source {
        &self.source
    }

    #[inline]
    pub fn target(&self) -> TargetType {
        self.target
    }

    #[inline]
    pub(crate) fn decoder(&self) -> Option<BodyDecoder> {
        self.decoder
    }
}

impl std::fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamSpec")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// Path variable `{name}`
pub fn path(name: impl Into<String>) -> ParamSpec {
    ParamSpec::new(Source::PathVariable(name.into()), TargetType::String)
}

/// Required query parameter
pub fn query(name: impl Into<String>) -> ParamSpec {
    ParamSpec::new(
        Source::QueryParam {
            name: name.into(),
            required: true,
            default: None,
        },
        TargetType::String,
    )
}

/// Required request header, matched case-insensitively
pub fn header(name: &str) -> ParamSpec {
    ParamSpec::new(
        Source::RequestHeader {
            name: name.to_ascii_lowercase(),
            required: true,
            default: None,
        },
        TargetType::String,
    )
}

/// Required request body decoded into `T`
pub fn body<T: DeserializeOwned + Send + 'static>() -> ParamSpec {
    ParamSpec {
        source: Source::RequestBody {
            required: true,
            validated: false,
        },
        target: TargetType::Body(std::any::type_name::<T>()),
        decoder: Some(decode_body::<T> as BodyDecoder),
    }
}

/// Required request body decoded into `T`, then checked with [`Validate`]
pub fn valid_body<T: DeserializeOwned + Validate + Send + 'static>() -> ParamSpec {
    ParamSpec {
        source: Source::RequestBody {
            required: true,
            validated: true,
        },
        target: TargetType::Body(std::any::type_name::<T>()),
        decoder: Some(decode_valid_body::<T> as BodyDecoder),
    }
}

/// The [`RequestContext`] of the current request
pub fn context() -> ParamSpec {
    ParamSpec::new(
        Source::RequestContext,
        TargetType::Other(std::any::type_name::<RequestContext>()),
    )
}

/// A parameter of type `T` that no source can supply
pub fn unresolvable<T: 'static>() -> ParamSpec {
    ParamSpec::new(Source::Unresolvable, TargetType::of::<T>())
}

fn decode_typed<T: DeserializeOwned>(codec: &dyn BodyCodec, text: &str) -> Result<T, HandlerError> {
    let value = codec
        .decode(text)
        .map_err(|err| HandlerError::binding(err.to_string()))?;
    serde_json::from_value(value).map_err(|err| {
        HandlerError::binding(format!(
            "Failed to decode body as {}: {}",
            std::any::type_name::<T>(),
            err
        ))
    })
}

fn decode_body<T: DeserializeOwned + Send + 'static>(
    codec: &dyn BodyCodec,
    text: &str,
) -> Result<Box<dyn Any + Send>, HandlerError> {
    let body: T = decode_typed(codec, text)?;
    Ok(Box::new(body))
}

fn decode_valid_body<T: DeserializeOwned + Validate + Send + 'static>(
    codec: &dyn BodyCodec,
    text: &str,
) -> Result<Box<dyn Any + Send>, HandlerError> {
    let body: T = decode_typed(codec, text)?;
    body.validate().map_err(HandlerError::validation)?;
    Ok(Box::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, JsonCodec, Violations};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct UserRequest {
        name: String,
        age: i32,
    }

    impl Validate for UserRequest {
        fn validate(&self) -> Result<(), Vec<String>> {
            Violations::new()
                .size("name", Some(self.name.as_str()), 2, 20)
                .finish()
        }
    }

    #[test]
    fn test_target_type_of() {
        assert_eq!(TargetType::of::<String>(), TargetType::String);
        assert_eq!(TargetType::of::<i32>(), TargetType::Int);
        assert_eq!(TargetType::of::<i64>(), TargetType::Long);
        assert_eq!(TargetType::of::<bool>(), TargetType::Bool);
        assert!(matches!(TargetType::of::<f64>(), TargetType::Other("f64")));
    }

    #[test]
    fn test_query_builder() {
        let spec = query("page").typed::<i32>().default_value("1");
        assert_eq!(
            spec.source(),
            &Source::QueryParam {
                name: "page".into(),
                required: true,
                default: Some("1".into())
            }
        );
        assert_eq!(spec.target(), TargetType::Int);
    }

    #[test]
    fn test_header_name_lowercased_and_optional() {
        let spec = header("X-Debug").optional().default_value("");
        assert_eq!(
            spec.source(),
            &Source::RequestHeader {
                name: "x-debug".into(),
                required: false,
                default: None
            }
        );
    }

    #[test]
    fn test_optional_ignored_for_path() {
        let spec = path("id").optional();
        assert_eq!(spec.source(), &Source::PathVariable("id".into()));
    }

    #[test]
    fn test_body_decoder() {
        let spec = body::<UserRequest>();
        let decode = spec.decoder().unwrap();
        let decoded = decode(&JsonCodec, r#"{"name":"ana","age":30}"#).unwrap();
        let user = decoded.downcast::<UserRequest>().unwrap();
        assert_eq!(user.age, 30);

        let err = decode(&JsonCodec, r#"{"name":"ana"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Binding);
    }

    #[test]
    fn test_valid_body_decoder_reports_violations() {
        let decode = valid_body::<UserRequest>().decoder().unwrap();
        let err = decode(&JsonCodec, r#"{"name":"a","age":3}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.violations(), ["name size must be between 2 and 20"]);
    }
}

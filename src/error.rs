//! Error types for the container and the dispatch pipeline
//!
//! Two families live here:
//!
//! - [`ConfigError`] is raised while components are registered and resolved.
//!   It is fatal at startup: [`Scanner::scan`](crate::Scanner::scan) returns it
//!   before anything is served.
//! - [`HandlerError`] is raised while a request is dispatched. It never escapes
//!   [`Dispatcher::dispatch`](crate::Dispatcher::dispatch); the
//!   [`ExceptionResolver`](crate::ExceptionResolver) turns it into a result.

use std::any::TypeId;
use thiserror::Error;

/// Errors raised while building or resolving the component graph
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No descriptor exists for the requested type
    #[error("Component not registered: {type_name}")]
    NotRegistered {
        type_name: &'static str,
        type_id: TypeId,
    },

    /// The type is already being constructed higher up the same resolution
    #[error("Circular dependency detected while resolving: {type_name}")]
    CircularDependency { type_name: &'static str },

    /// Resolving an injectable field failed
    #[error("Failed to inject field {field} on {owner}: {source}")]
    InjectionFailed {
        owner: &'static str,
        field: &'static str,
        #[source]
        source: Box<ConfigError>,
    },

    /// A stored instance did not have the type it was registered under
    #[error("Registered instance is not a {type_name}")]
    Downcast { type_name: &'static str },
}

impl ConfigError {
    /// Create a NotRegistered error for a type
    #[inline]
    pub fn not_registered<T: 'static>() -> Self {
        Self::NotRegistered {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Create a CircularDependency error
    #[inline]
    pub fn circular(type_name: &'static str) -> Self {
        Self::CircularDependency { type_name }
    }

    /// Wrap a field resolution failure
    #[inline]
    pub fn injection_failed(owner: &'static str, field: &'static str, source: ConfigError) -> Self {
        Self::InjectionFailed {
            owner,
            field,
            source: Box::new(source),
        }
    }
}

impl Clone for ConfigError {
    fn clone(&self) -> Self {
        match self {
            Self::NotRegistered { type_name, type_id } => Self::NotRegistered {
                type_name,
                type_id: *type_id,
            },
            Self::CircularDependency { type_name } => Self::CircularDependency { type_name },
            Self::InjectionFailed {
                owner,
                field,
                source,
            } => Self::InjectionFailed {
                owner,
                field,
                source: source.clone(),
            },
            Self::Downcast { type_name } => Self::Downcast { type_name },
        }
    }
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Tag identifying what went wrong during a dispatch.
///
/// Kinds form a small tree rooted at [`ErrorKind::Any`]. Advice handlers and
/// the built-in status table match a kind or any of its ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Root of the tree; claiming it catches every error
    Any,
    IllegalArgument,
    /// Missing or unconvertible parameter
    Binding,
    /// Constraint violations on a decoded body
    Validation,
    /// Scalar source bound to a type the binder cannot convert
    UnsupportedType,
    Security,
    NoSuchElement,
    UnsupportedOperation,
    Internal,
    /// Application-defined kind
    Custom(&'static str),
}

impl ErrorKind {
    /// The kind this one specializes.
    #[inline]
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            ErrorKind::Any => None,
            ErrorKind::Binding => Some(ErrorKind::IllegalArgument),
            _ => Some(ErrorKind::Any),
        }
    }

    /// This kind followed by every ancestor up to [`ErrorKind::Any`].
    pub fn ancestors(self) -> impl Iterator<Item = ErrorKind> {
        std::iter::successors(Some(self), |kind| kind.parent())
    }

    /// True if `self` is `other` or specializes it.
    #[inline]
    pub fn is_a(self, other: ErrorKind) -> bool {
        self.ancestors().any(|kind| kind == other)
    }

    /// Status fixed by the kind itself
    #[inline]
    pub fn declared_status(self) -> Option<u16> {
        match self {
            ErrorKind::Validation => Some(400),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Custom(tag) => f.write_str(tag),
            other => write!(f, "{:?}", other),
        }
    }
}

/// An error raised while binding or invoking a handler.
///
/// Carries its [`ErrorKind`], an optional message, an optional fixed
/// response status and, for validation failures, the violation messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {}", .message.as_deref().unwrap_or("<no message>"))]
pub struct HandlerError {
    kind: ErrorKind,
    message: Option<String>,
    status: Option<u16>,
    violations: Vec<String>,
}

impl HandlerError {
    /// An error of the given kind with no message
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            status: None,
            violations: Vec::new(),
        }
    }

    /// An error of the given kind carrying a message
    #[inline]
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(kind)
        }
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::IllegalArgument, message)
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Binding, message)
    }

    /// A validation failure; the message is the violations joined by newlines
    pub fn validation(violations: Vec<String>) -> Self {
        Self {
            message: Some(violations.join("\n")),
            violations,
            ..Self::new(ErrorKind::Validation)
        }
    }

    pub fn unsupported_type(type_name: &str) -> Self {
        Self::with_message(
            ErrorKind::UnsupportedType,
            format!("Unsupported parameter type: {}", type_name),
        )
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Security, message)
    }

    pub fn no_such_element(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::NoSuchElement, message)
    }

    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::UnsupportedOperation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Internal, message)
    }

    pub fn custom(tag: &'static str, message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Custom(tag), message)
    }

    /// Force the response status for this error
    #[inline]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Status fixed on this value by [`with_status`](Self::with_status)
    #[inline]
    pub fn fixed_status(&self) -> Option<u16> {
        self.status
    }

    /// Fixed status on the value, or the nearest one declared by its kind tree
    pub fn status(&self) -> Option<u16> {
        self.status
            .or_else(|| self.kind.ancestors().find_map(ErrorKind::declared_status))
    }

    /// Constraint violations, empty unless this is a validation failure
    #[inline]
    pub fn violations(&self) -> &[String] {
        &self.violations
    }
}

impl From<ConfigError> for HandlerError {
    fn from(err: ConfigError) -> Self {
        HandlerError::internal(err.to_string())
    }
}

/// Errors raised by a [`BodyCodec`](crate::BodyCodec)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to decode body: {0}")]
    Decode(String),

    #[error("Failed to encode body: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_is_an_illegal_argument() {
        assert!(ErrorKind::Binding.is_a(ErrorKind::IllegalArgument));
        assert!(ErrorKind::Binding.is_a(ErrorKind::Any));
        assert!(!ErrorKind::IllegalArgument.is_a(ErrorKind::Binding));
    }

    #[test]
    fn test_ancestor_chain() {
        let chain: Vec<_> = ErrorKind::Binding.ancestors().collect();
        assert_eq!(
            chain,
            vec![ErrorKind::Binding, ErrorKind::IllegalArgument, ErrorKind::Any]
        );
    }

    #[test]
    fn test_validation_status_from_kind() {
        let err = HandlerError::validation(vec!["name must not be null".into()]);
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.message(), Some("name must not be null"));
    }

    #[test]
    fn test_explicit_status_wins() {
        let err = HandlerError::custom("user_not_found", "no user 7").with_status(404);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.kind(), ErrorKind::Custom("user_not_found"));
        assert_eq!(err.to_string(), "user_not_found: no user 7");
    }

    #[test]
    fn test_config_error_into_handler_error() {
        let err: HandlerError = ConfigError::circular("A").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.message().unwrap().contains("Circular dependency"));
    }
}

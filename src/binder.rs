//! Parameter binding
//!
//! [`bind`] resolves every [`ParamSpec`] of a route against the request, in
//! declaration order, and hands the handler an [`Arguments`] list to read
//! its parameters from.

use crate::param::{Source, TargetType};
use crate::{BodyCodec, HandlerError, RequestContext, Route};
use std::any::Any;

#[cfg(feature = "logging")]
use tracing::trace;

/// One bound parameter value
pub enum Argument {
    /// The request context; read it with [`Arguments::context`]
    Context,
    /// Optional source with nothing to bind
    Absent,
    Str(String),
    Int(i32),
    Long(i64),
    Bool(bool),
    /// Decoded request body
    Body(Box<dyn Any + Send>),
}

impl Argument {
    fn describe(&self) -> &'static str {
        match self {
            Argument::Context => "the request context",
            Argument::Absent => "absent",
            Argument::Str(_) => "a String",
            Argument::Int(_) => "an i32",
            Argument::Long(_) => "an i64",
            Argument::Bool(_) => "a bool",
            Argument::Body(_) => "a request body",
        }
    }
}

impl std::fmt::Debug for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Argument::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Argument::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Argument::Long(value) => f.debug_tuple("Long").field(value).finish(),
            Argument::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Argument::Context => f.write_str("Context"),
            Argument::Absent => f.write_str("Absent"),
            Argument::Body(_) => f.write_str("Body(..)"),
        }
    }
}

/// Bound parameters of one handler call.
///
/// Accessors take the value at `index` out of the list; reading the same
/// index twice yields an error the second time for owned values.
///
/// ```rust,ignore
/// table.route("/search", "search", vec![param::query("q"), param::query("page").typed::<i32>().default_value("1")],
///     |c: &HelloController, mut args| Ok(c.search(args.string(0)?, args.int(1)?).into()));
/// ```
pub struct Arguments<'a> {
    ctx: &'a RequestContext,
    owner: &'static str,
    method: &'static str,
    values: Vec<Argument>,
}

macro_rules! scalar_accessors {
    ($($get:ident, $opt:ident, $variant:ident, $ty:ty, $expected:literal;)+) => {
        $(
            #[doc = concat!("The ", $expected, " at `index`")]
            pub fn $get(&mut self, index: usize) -> Result<$ty, HandlerError> {
                self.$opt(index)?.ok_or_else(|| self.absent(index))
            }

            #[doc = concat!("The ", $expected, " at `index`, `None` if absent")]
            pub fn $opt(&mut self, index: usize) -> Result<Option<$ty>, HandlerError> {
                match self.take(index)? {
                    Argument::$variant(value) => Ok(Some(value)),
                    Argument::Absent => Ok(None),
                    other => Err(self.mismatch(index, $expected, &other)),
                }
            }
        )+
    };
}

impl<'a> Arguments<'a> {
    pub fn new(
        ctx: &'a RequestContext,
        owner: &'static str,
        method: &'static str,
        values: Vec<Argument>,
    ) -> Self {
        Self {
            ctx,
            owner,
            method,
            values,
        }
    }

    /// The request being handled
    #[inline]
    pub fn context(&self) -> &'a RequestContext {
        self.ctx
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the raw argument at `index`
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.values.get(index)
    }

    scalar_accessors! {
        string, opt_string, Str, String, "String";
        int, opt_int, Int, i32, "i32";
        long, opt_long, Long, i64, "i64";
        bool, opt_bool, Bool, bool, "bool";
    }

    /// The decoded body at `index`
    pub fn body<T: Any>(&mut self, index: usize) -> Result<T, HandlerError> {
        self.opt_body(index)?.ok_or_else(|| self.absent(index))
    }

    /// The decoded body at `index`, `None` if an optional body was blank
    pub fn opt_body<T: Any>(&mut self, index: usize) -> Result<Option<T>, HandlerError> {
        match self.take(index)? {
            Argument::Body(boxed) => match boxed.downcast::<T>() {
                Ok(body) => Ok(Some(*body)),
                Err(_) => Err(HandlerError::internal(format!(
                    "Parameter {} of {}.{} is not a {}",
                    index,
                    self.owner,
                    self.method,
                    std::any::type_name::<T>()
                ))),
            },
            Argument::Absent => Ok(None),
            other => Err(self.mismatch(index, "request body", &other)),
        }
    }

    fn take(&mut self, index: usize) -> Result<Argument, HandlerError> {
        match self.values.get_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, Argument::Absent)),
            None => Err(HandlerError::internal(format!(
                "{}.{} has no parameter {}",
                self.owner, self.method, index
            ))),
        }
    }

    fn absent(&self, index: usize) -> HandlerError {
        HandlerError::internal(format!(
            "Parameter {} of {}.{} is absent",
            index, self.owner, self.method
        ))
    }

    fn mismatch(&self, index: usize, expected: &str, found: &Argument) -> HandlerError {
        HandlerError::internal(format!(
            "Parameter {} of {}.{} is {}, not {}",
            index,
            self.owner,
            self.method,
            found.describe(),
            expected
        ))
    }
}

impl std::fmt::Debug for Arguments<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("handler", &format_args!("{}.{}", self.owner, self.method))
            .field("values", &self.values)
            .finish()
    }
}

/// Resolve every parameter of `route` from `ctx`.
///
/// Fails on the first parameter that cannot be bound.
pub fn bind<'a>(
    route: &Route,
    ctx: &'a RequestContext,
    codec: &dyn BodyCodec,
) -> Result<Arguments<'a>, HandlerError> {
    let mut values = Vec::with_capacity(route.params().len());

    for (index, spec) in route.params().iter().enumerate() {
        let target = spec.target();
        let value = match spec.source() {
            Source::RequestContext => Argument::Context,

            Source::PathVariable(name) => match ctx.path_variable(name) {
                Some(raw) => convert(raw, target, index)?,
                None => {
                    return Err(HandlerError::binding(format!(
                        "Missing path variable: {}",
                        name
                    )));
                }
            },

            Source::QueryParam {
                name,
                required,
                default,
            } => match lookup(ctx.query_param(name), default.as_deref()) {
                Some(raw) => convert(raw, target, index)?,
                None if *required => {
                    return Err(HandlerError::binding(format!(
                        "Missing required query param: {}",
                        name
                    )));
                }
                None => Argument::Absent,
            },

            Source::RequestHeader {
                name,
                required,
                default,
            } => match lookup(ctx.header(name), default.as_deref()) {
                Some(raw) => convert(raw, target, index)?,
                None if *required => {
                    return Err(HandlerError::binding(format!(
                        "Missing required header: {}",
                        name
                    )));
                }
                None => Argument::Absent,
            },

            Source::RequestBody { required, .. } => {
                let text = ctx.body();
                if text.trim().is_empty() {
                    if *required {
                        return Err(HandlerError::binding(format!(
                            "Missing required request body for parameter {}",
                            index
                        )));
                    }
                    Argument::Absent
                } else {
                    match spec.decoder() {
                        Some(decode) => Argument::Body(decode(codec, text)?),
                        None => return Err(HandlerError::unsupported_type(target.name())),
                    }
                }
            }

            Source::Unresolvable => {
                return Err(HandlerError::binding(format!(
                    "Cannot resolve parameter at index {} of type {} in method {}.{}",
                    index,
                    target.name(),
                    route.owner(),
                    route.method()
                )));
            }
        };

        values.push(value);
    }

    #[cfg(feature = "logging")]
    trace!(
        target: crate::logging::TARGET,
        handler = format_args!("{}.{}", route.owner(), route.method()),
        bound = values.len(),
        "Parameters bound"
    );

    Ok(Arguments::new(ctx, route.owner(), route.method(), values))
}

/// Present non-empty value, else the default
fn lookup<'v>(value: Option<&'v str>, default: Option<&'v str>) -> Option<&'v str> {
    value.filter(|raw| !raw.is_empty()).or(default)
}

/// Convert a raw scalar into the declared target
fn convert(raw: &str, target: TargetType, index: usize) -> Result<Argument, HandlerError> {
    match target {
        TargetType::String => Ok(Argument::Str(raw.to_owned())),
        TargetType::Int => raw
            .parse()
            .map(Argument::Int)
            .map_err(|_| invalid(raw, target, index)),
        TargetType::Long => raw
            .parse()
            .map(Argument::Long)
            .map_err(|_| invalid(raw, target, index)),
        TargetType::Bool => Ok(Argument::Bool(raw.eq_ignore_ascii_case("true"))),
        TargetType::Body(name) | TargetType::Other(name) => {
            Err(HandlerError::unsupported_type(name))
        }
    }
}

fn invalid(raw: &str, target: TargetType, index: usize) -> HandlerError {
    HandlerError::binding(format!(
        "Invalid value for parameter {}: '{}' is not a valid {}",
        index,
        raw,
        target.name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::AnyInstance;
    use crate::router::RoutePattern;
    use crate::{Container, ErrorKind, JsonCodec, ParamSpec, Reply, param};
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    struct UserRequest {
        name: String,
        age: i32,
    }

    fn route(pattern: &str, params: Vec<ParamSpec>) -> Route {
        Route::new(
            RoutePattern::parse(pattern),
            "HelloController",
            "handler",
            params,
            None,
            Arc::new(|_: &Container| Ok(Arc::new(()) as AnyInstance)),
            Arc::new(|_: &AnyInstance, _: Arguments<'_>| Ok(Reply::from(()))),
        )
    }

    fn context(path: &str, route: &Route) -> RequestContext {
        let mut ctx = RequestContext::new(path);
        let vars = route.pattern().extract(path);
        ctx.set_path_variables(vars);
        ctx
    }

    #[test]
    fn test_path_variable_conversion() {
        let route = route("/user/{id}", vec![param::path("id").typed::<i32>()]);
        let ctx = context("/user/42", &route);
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        assert_eq!(args.int(0).unwrap(), 42);
    }

    #[test]
    fn test_path_variable_not_a_number() {
        let route = route("/user/{id}", vec![param::path("id").typed::<i32>()]);
        let ctx = context("/user/abc", &route);
        let err = bind(&route, &ctx, &JsonCodec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Binding);
        assert_eq!(err.status(), None);
        assert!(err.kind().is_a(ErrorKind::IllegalArgument));
    }

    #[test]
    fn test_missing_path_variable() {
        let route = route("/user/{id}", vec![param::path("name")]);
        let ctx = context("/user/42", &route);
        let err = bind(&route, &ctx, &JsonCodec).unwrap_err();
        assert_eq!(err.message(), Some("Missing path variable: name"));
    }

    #[test]
    fn test_query_required_and_default() {
        let route = route(
            "/search",
            vec![
                param::query("q"),
                param::query("page").typed::<i32>().default_value("1"),
            ],
        );

        let ctx = RequestContext::new("/search");
        let err = bind(&route, &ctx, &JsonCodec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Binding);
        assert_eq!(err.message(), Some("Missing required query param: q"));

        let ctx = RequestContext::new("/search").with_query_param("q", "rust");
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        assert_eq!(args.string(0).unwrap(), "rust");
        assert_eq!(args.int(1).unwrap(), 1);
    }

    #[test]
    fn test_empty_query_uses_default() {
        let route = route("/search", vec![param::query("page").typed::<i64>().default_value("3")]);
        let ctx = RequestContext::new("/search").with_query_param("page", "");
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        assert_eq!(args.long(0).unwrap(), 3);
    }

    #[test]
    fn test_optional_query_is_absent() {
        let route = route("/search", vec![param::query("sort").optional()]);
        let ctx = RequestContext::new("/search");
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        assert_eq!(args.opt_string(0).unwrap(), None);
    }

    #[test]
    fn test_header_binding() {
        let route = route(
            "/debug",
            vec![
                param::header("User-Agent"),
                param::header("X-Debug")
                    .typed::<bool>()
                    .optional()
                    .default_value("false"),
            ],
        );

        let ctx = RequestContext::new("/debug")
            .with_header("user-agent", "curl/8")
            .with_header("X-DEBUG", "TRUE");
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        assert_eq!(args.string(0).unwrap(), "curl/8");
        assert!(args.bool(1).unwrap());

        let ctx = RequestContext::new("/debug").with_header("User-Agent", "curl/8");
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        assert!(!args.bool(1).unwrap());

        let err = bind(&route, &RequestContext::new("/debug"), &JsonCodec).unwrap_err();
        assert_eq!(err.message(), Some("Missing required header: user-agent"));
    }

    #[test]
    fn test_unsupported_scalar_type() {
        let route = route("/q", vec![param::query("ratio").typed::<f64>()]);
        let ctx = RequestContext::new("/q").with_query_param("ratio", "0.5");
        let err = bind(&route, &ctx, &JsonCodec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert_eq!(err.message(), Some("Unsupported parameter type: f64"));
    }

    #[test]
    fn test_body_binding() {
        let route = route("/user/create", vec![param::body::<UserRequest>()]);

        let ctx = RequestContext::new("/user/create").with_body(r#"{"name":"ana","age":30}"#);
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        let user: UserRequest = args.body(0).unwrap();
        assert_eq!(user, UserRequest { name: "ana".into(), age: 30 });

        let blank = RequestContext::new("/user/create").with_body("  ");
        let err = bind(&route, &blank, &JsonCodec).unwrap_err();
        assert_eq!(
            err.message(),
            Some("Missing required request body for parameter 0")
        );

        let broken = RequestContext::new("/user/create").with_body("{");
        assert_eq!(
            bind(&route, &broken, &JsonCodec).unwrap_err().kind(),
            ErrorKind::Binding
        );
    }

    #[test]
    fn test_optional_blank_body_is_absent() {
        let route = route("/user/create", vec![param::body::<UserRequest>().optional()]);
        let ctx = RequestContext::new("/user/create");
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        assert!(args.opt_body::<UserRequest>(0).unwrap().is_none());
    }

    #[test]
    fn test_context_and_unresolvable() {
        let with_context = route("/ctx", vec![param::context()]);
        let ctx = RequestContext::new("/ctx");
        let args = bind(&with_context, &ctx, &JsonCodec).unwrap();
        assert!(matches!(args.get(0), Some(Argument::Context)));
        assert_eq!(args.context().path(), "/ctx");

        let broken = route("/ctx", vec![param::context(), param::unresolvable::<Vec<u8>>()]);
        let err = bind(&broken, &ctx, &JsonCodec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Binding);
        assert!(
            err.message()
                .unwrap()
                .starts_with("Cannot resolve parameter at index 1 of type alloc::vec::Vec<u8>")
        );
        assert!(err.message().unwrap().ends_with("in method HelloController.handler"));
    }

    #[test]
    fn test_accessor_mismatch() {
        let route = route("/user/{id}", vec![param::path("id")]);
        let ctx = context("/user/7", &route);
        let mut args = bind(&route, &ctx, &JsonCodec).unwrap();
        let err = args.int(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(args.string(5).is_err());
    }
}

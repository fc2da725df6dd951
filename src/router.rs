//! Route patterns and the route table
//!
//! Patterns are `/`-separated; a segment written `{name}` captures exactly one
//! non-empty path segment. One leading and one trailing `/` are ignored on
//! both patterns and paths, so `/a/b`, `a/b/` and `a/b` are the same.
//!
//! Lookup is a linear scan in registration order and the first structural
//! match wins. Two patterns that can match the same path are reported as
//! ambiguous but both stay registered.

use crate::container::AnyInstance;
use crate::{Arguments, ConfigError, Container, HandlerError, ParamSpec, Reply, RequestContext};
use ahash::AHashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// Produces the controller instance for one dispatch
pub(crate) type Supplier =
    Arc<dyn Fn(&Container) -> std::result::Result<AnyInstance, ConfigError> + Send + Sync>;

/// Calls the handler method on a type-erased controller instance
pub(crate) type Invoker =
    Arc<dyn Fn(&AnyInstance, Arguments<'_>) -> Result<Reply, HandlerError> + Send + Sync>;

/// Strip one leading and one trailing `/`
pub fn normalize(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// One compiled pattern segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable(String),
}

impl Segment {
    fn parse(text: &str) -> Self {
        match text.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            Some(name) if !name.is_empty() => Segment::Variable(name.to_owned()),
            _ => Segment::Literal(text.to_owned()),
        }
    }

    #[inline]
    fn accepts(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == segment,
            Segment::Variable(_) => !segment.is_empty(),
        }
    }

    /// True if some path segment satisfies both
    fn overlaps(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (Segment::Literal(lit), Segment::Variable(_))
            | (Segment::Variable(_), Segment::Literal(lit)) => !lit.is_empty(),
            (Segment::Variable(_), Segment::Variable(_)) => true,
        }
    }
}

/// A compiled route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    key: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Self {
        let key = normalize(pattern);
        Self {
            key: key.to_owned(),
            segments: key.split('/').map(Segment::parse).collect(),
        }
    }

    /// Normalized pattern text, unique within a router
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = normalize(path).split('/').collect();
        self.matches_segments(&parts)
    }

    fn matches_segments(&self, parts: &[&str]) -> bool {
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(segment, part)| segment.accepts(part))
    }

    /// Variable name to raw path segment, by index alignment
    pub fn extract(&self, path: &str) -> AHashMap<String, String> {
        self.segments
            .iter()
            .zip(normalize(path).split('/'))
            .filter_map(|(segment, part)| match segment {
                Segment::Variable(name) => Some((name.clone(), part.to_owned())),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// True if at least one path matches both patterns
    pub fn is_ambiguous_with(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.overlaps(b))
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.key)
    }
}

/// A registered route: pattern, target method and how to reach it
pub struct Route {
    pattern: RoutePattern,
    owner: &'static str,
    method: &'static str,
    params: Vec<ParamSpec>,
    status: Option<u16>,
    supplier: Supplier,
    invoker: Invoker,
}

impl Route {
    pub(crate) fn new(
        pattern: RoutePattern,
        owner: &'static str,
        method: &'static str,
        params: Vec<ParamSpec>,
        status: Option<u16>,
        supplier: Supplier,
        invoker: Invoker,
    ) -> Self {
        Self {
            pattern,
            owner,
            method,
            params,
            status,
            supplier,
            invoker,
        }
    }

    #[inline]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Short name of the controller type
    #[inline]
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    #[inline]
    pub fn method(&self) -> &'static str {
        self.method
    }

    #[inline]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Fixed response status for non-entity replies
    #[inline]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Obtain the controller instance for this dispatch
    pub(crate) fn instance(&self, container: &Container) -> Result<AnyInstance, HandlerError> {
        (self.supplier)(container).map_err(|err| {
            HandlerError::internal(format!(
                "Failed to create instance for route: {}: {}",
                self.pattern, err
            ))
        })
    }

    pub(crate) fn invoke(
        &self,
        instance: &AnyInstance,
        args: Arguments<'_>,
    ) -> Result<Reply, HandlerError> {
        (self.invoker)(instance, args)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.key)
            .field("handler", &format_args!("{}.{}", self.owner, self.method))
            .field("params", &self.params)
            .field("status", &self.status)
            .finish()
    }
}

/// Route table
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. A route with the same normalized pattern is replaced in
    /// place, keeping its position.
    pub fn register(&mut self, route: Route) {
        #[cfg(feature = "logging")]
        for existing in &self.routes {
            if existing.pattern.key != route.pattern.key
                && existing.pattern.is_ambiguous_with(&route.pattern)
            {
                warn!(
                    target: crate::logging::TARGET,
                    first = %existing.pattern,
                    second = %route.pattern,
                    "Ambiguous routes: the first registered wins"
                );
            }
        }

        match self
            .routes
            .iter_mut()
            .find(|existing| existing.pattern.key == route.pattern.key)
        {
            Some(existing) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: crate::logging::TARGET,
                    pattern = %route.pattern,
                    previous = format_args!("{}.{}", existing.owner, existing.method),
                    handler = format_args!("{}.{}", route.owner, route.method),
                    "Replacing route"
                );

                *existing = route;
            }
            None => {
                #[cfg(feature = "logging")]
                debug!(
                    target: crate::logging::TARGET,
                    pattern = %route.pattern,
                    handler = format_args!("{}.{}", route.owner, route.method),
                    "Registered route"
                );

                self.routes.push(route);
            }
        }
    }

    /// First route whose pattern structurally matches `path`
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        let parts: Vec<&str> = normalize(path).split('/').collect();
        let found = self
            .routes
            .iter()
            .find(|route| route.pattern.matches_segments(&parts));

        #[cfg(feature = "logging")]
        trace!(
            target: crate::logging::TARGET,
            path = path,
            matched = found.map(|route| route.pattern.key.as_str()),
            "Route lookup"
        );

        found
    }

    /// Path variables of `ctx`'s path under `route`'s pattern
    pub fn bind(&self, route: &Route, ctx: &RequestContext) -> AHashMap<String, String> {
        route.pattern.extract(ctx.path())
    }

    /// Every pair of registered patterns that can match the same path
    pub fn ambiguities(&self) -> Vec<(&RoutePattern, &RoutePattern)> {
        let mut pairs = Vec::new();
        for (i, first) in self.routes.iter().enumerate() {
            for second in &self.routes[i + 1..] {
                if first.pattern.is_ambiguous_with(&second.pattern) {
                    pairs.push((&first.pattern, &second.pattern));
                }
            }
        }
        pairs
    }

    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(pattern: &str, method: &'static str) -> Route {
        Route::new(
            RoutePattern::parse(pattern),
            "TestController",
            method,
            Vec::new(),
            None,
            Arc::new(|_: &Container| Ok(Arc::new(()) as AnyInstance)),
            Arc::new(|_: &AnyInstance, _: Arguments<'_>| Ok(Reply::from(()))),
        )
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/b"), "a/b");
        assert_eq!(normalize("a/b/"), "a/b");
        assert_eq!(normalize("/a/b/"), "a/b");
        assert_eq!(normalize("//a"), "/a");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn test_pattern_segments() {
        let pattern = RoutePattern::parse("/user/{id}/profile");
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("user".into()),
                Segment::Variable("id".into()),
                Segment::Literal("profile".into()),
            ]
        );
        assert_eq!(pattern.key(), "user/{id}/profile");
        assert_eq!(pattern.to_string(), "/user/{id}/profile");
        assert_eq!(
            RoutePattern::parse("/a/{}").segments()[1],
            Segment::Literal("{}".into())
        );
    }

    #[test]
    fn test_match_and_extract() {
        let pattern = RoutePattern::parse("/user/{id}/profile");
        assert!(pattern.matches("/user/42/profile"));
        assert!(pattern.matches("user/42/profile/"));
        assert!(!pattern.matches("/user/42"));
        assert!(!pattern.matches("/admin/42/profile"));
        assert!(!pattern.matches("/user//profile"));

        let vars = pattern.extract("/user/42/profile");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_first_registered_wins() {
        let mut router = Router::new();
        router.register(route("/user/{id}", "by_id"));
        router.register(route("/user/create", "create"));

        assert_eq!(router.match_path("/user/create").unwrap().method(), "by_id");
        assert_eq!(router.match_path("/user/7").unwrap().method(), "by_id");
        assert!(router.match_path("/user").is_none());
    }

    #[test]
    fn test_ambiguities() {
        let mut router = Router::new();
        router.register(route("/user/{id}", "by_id"));
        router.register(route("/user/create", "create"));
        router.register(route("/user/{id}/profile", "profile"));
        router.register(route("/hello", "hello"));

        let pairs: Vec<_> = router
            .ambiguities()
            .into_iter()
            .map(|(a, b)| (a.key(), b.key()))
            .collect();
        assert_eq!(pairs, vec![("user/{id}", "user/create")]);
    }

    #[test]
    fn test_reregistration_replaces_in_place() {
        let mut router = Router::new();
        router.register(route("/hello", "first"));
        router.register(route("/goodbye", "goodbye"));
        router.register(route("hello/", "second"));

        assert_eq!(router.len(), 2);
        assert_eq!(router.routes()[0].method(), "second");
        assert_eq!(router.match_path("/hello").unwrap().method(), "second");
    }

    #[test]
    fn test_root_pattern() {
        let mut router = Router::new();
        router.register(route("/", "index"));
        assert_eq!(router.match_path("/").unwrap().method(), "index");
        assert_eq!(router.match_path("").unwrap().method(), "index");
        assert!(router.match_path("/x").is_none());
    }

    #[test]
    fn test_bind_uses_context_path() {
        let mut router = Router::new();
        router.register(route("/hello/{name}", "greet"));
        let ctx = RequestContext::new("/hello/ana");
        let route = router.match_path(ctx.path()).unwrap();
        let vars = router.bind(route, &ctx);
        assert_eq!(vars.get("name").map(String::as_str), Some("ana"));
    }
}

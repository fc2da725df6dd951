//! Exception resolution
//!
//! A [`HandlerError`] becomes a [`HandlerResult`] in two tiers:
//!
//! 1. Advice handlers, in registration order. The first one claiming the
//!    error's kind, or any ancestor of it, produces the reply. Entity replies
//!    are used as they are, bare values are sent with status 500.
//! 2. The built-in mapping. A status fixed on the error or declared for its
//!    kind (built in, or through [`declare_status`](ExceptionResolver::declare_status))
//!    wins; otherwise the first matching row of
//!    `IllegalArgument → 400, Security → 403, NoSuchElement → 404,
//!    UnsupportedOperation → 405`, and 500 for anything else.

use crate::container::AnyInstance;
use crate::{Component, ErrorKind, HandlerError, HandlerResult, Reply, ResponseEntity};
use ahash::AHashMap;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Built-in kind to status rows, checked in order
const STATUS_TABLE: [(ErrorKind, u16); 4] = [
    (ErrorKind::IllegalArgument, 400),
    (ErrorKind::Security, 403),
    (ErrorKind::NoSuchElement, 404),
    (ErrorKind::UnsupportedOperation, 405),
];

type AdviceHandler = Arc<dyn Fn(&AnyInstance, &HandlerError) -> Reply + Send + Sync>;

/// A component whose methods turn errors into responses.
///
/// ```rust
/// use component_dispatcher::{AdviceTable, Component, ControllerAdvice, ErrorKind, HandlerError, ResponseEntity};
///
/// struct NotFoundAdvice;
///
/// impl Component for NotFoundAdvice {
///     type Dependencies = ();
///     fn create(_: ()) -> Self { NotFoundAdvice }
/// }
///
/// impl ControllerAdvice for NotFoundAdvice {
///     fn handlers(table: &mut AdviceTable<Self>) {
///         table.handle(&[ErrorKind::NoSuchElement], "not_found", |_, err: &HandlerError| {
///             ResponseEntity::status(404).body(format!("missing: {}", err.message().unwrap_or("?")))
///         });
///     }
/// }
/// ```
pub trait ControllerAdvice: Component {
    fn handlers(table: &mut AdviceTable<Self>);
}

/// Handler declarations of one advice type
pub struct AdviceTable<A> {
    handlers: Vec<(Vec<ErrorKind>, &'static str, AdviceHandler)>,
    _advice: PhantomData<fn(&A)>,
}

impl<A: ControllerAdvice> AdviceTable<A> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Vec::new(),
            _advice: PhantomData,
        }
    }

    /// Claim `kinds` (and every kind below them) for `handler`
    pub fn handle<F, R>(&mut self, kinds: &[ErrorKind], method: &'static str, handler: F) -> &mut Self
    where
        F: Fn(&A, &HandlerError) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        let erased: AdviceHandler = Arc::new(move |instance: &AnyInstance, error: &HandlerError| {
            match (**instance).downcast_ref::<A>() {
                Some(advice) => handler(advice, error).into(),
                None => Reply::Entity(
                    ResponseEntity::status(500).body(format!(
                        "Advice instance is not a {}",
                        std::any::type_name::<A>()
                    )),
                ),
            }
        });
        self.handlers.push((kinds.to_vec(), method, erased));
        self
    }

    pub(crate) fn into_entries(self, instance: AnyInstance) -> Vec<ExceptionHandlerEntry> {
        let owner = short_type_name::<A>();
        self.handlers
            .into_iter()
            .map(|(kinds, method, handler)| ExceptionHandlerEntry {
                owner,
                method,
                kinds,
                instance: Arc::clone(&instance),
                handler,
            })
            .collect()
    }
}

/// Last path segment of a type name
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let start = base.rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}

/// One registered error handler method
pub struct ExceptionHandlerEntry {
    owner: &'static str,
    method: &'static str,
    kinds: Vec<ErrorKind>,
    instance: AnyInstance,
    handler: AdviceHandler,
}

impl ExceptionHandlerEntry {
    /// True if a claimed kind is `kind` or one of its ancestors
    pub fn supports(&self, kind: ErrorKind) -> bool {
        kind.ancestors().any(|k| self.kinds.contains(&k))
    }

    pub fn kinds(&self) -> &[ErrorKind] {
        &self.kinds
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    fn invoke(&self, error: &HandlerError) -> Reply {
        (self.handler)(&self.instance, error)
    }
}

impl std::fmt::Debug for ExceptionHandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionHandlerEntry")
            .field("handler", &format_args!("{}.{}", self.owner, self.method))
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// Two-tier error to response mapping
#[derive(Debug, Default)]
pub struct ExceptionResolver {
    entries: Vec<ExceptionHandlerEntry>,
    declared: AHashMap<ErrorKind, u16>,
}

impl ExceptionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: ExceptionHandlerEntry) {
        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            handler = format_args!("{}.{}", entry.owner, entry.method),
            kinds = ?entry.kinds,
            "Registered exception handler"
        );

        self.entries.push(entry);
    }

    /// Fix the status for every error of `kind` and its descendants that
    /// carries no status of its own. A later declaration for the same kind
    /// replaces the earlier one.
    pub fn declare_status(&mut self, kind: ErrorKind, status: u16) {
        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            kind = %kind,
            status = status,
            "Declared error status"
        );

        self.declared.insert(kind, status);
    }

    /// Status declared for a kind, here or by the kind itself
    pub fn declared_status(&self, kind: ErrorKind) -> Option<u16> {
        self.declared
            .get(&kind)
            .copied()
            .or_else(|| kind.declared_status())
    }

    #[inline]
    pub fn entries(&self) -> &[ExceptionHandlerEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turn an error into a result
    pub fn resolve(&self, error: &HandlerError) -> HandlerResult {
        if let Some(entry) = self.entries.iter().find(|e| e.supports(error.kind())) {
            #[cfg(feature = "logging")]
            debug!(
                target: crate::logging::TARGET,
                kind = %error.kind(),
                handler = format_args!("{}.{}", entry.owner, entry.method),
                "Error handled by advice"
            );

            return match entry.invoke(error) {
                Reply::Entity(entity) => entity.into(),
                Reply::Value(body) => HandlerResult::new(500, body),
            };
        }

        let status = error.fixed_status().or_else(|| {
            error
                .kind()
                .ancestors()
                .find_map(|kind| self.declared_status(kind))
        });
        Self::respond(error, status)
    }

    /// The built-in tier alone
    pub fn resolve_default(error: &HandlerError) -> HandlerResult {
        Self::respond(error, error.status())
    }

    fn respond(error: &HandlerError, status: Option<u16>) -> HandlerResult {
        let status = status.unwrap_or_else(|| Self::default_status(error.kind()));

        #[cfg(feature = "logging")]
        trace!(
            target: crate::logging::TARGET,
            kind = %error.kind(),
            status = status,
            "Error mapped to status"
        );

        let body = match error.message() {
            Some(message) => message.to_owned(),
            None => format!("{} Error", status),
        };
        HandlerResult::new(status, body)
    }

    /// Status from the built-in table for a kind without a fixed status
    pub fn default_status(kind: ErrorKind) -> u16 {
        STATUS_TABLE
            .iter()
            .find(|(row, _)| kind.is_a(*row))
            .map(|(_, status)| *status)
            .unwrap_or(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Body;

    struct Advice {
        prefix: &'static str,
    }

    impl Component for Advice {
        type Dependencies = ();
        fn create(_: ()) -> Self {
            Advice { prefix: "handled" }
        }
    }

    impl ControllerAdvice for Advice {
        fn handlers(table: &mut AdviceTable<Self>) {
            table
                .handle(&[ErrorKind::Custom("user_not_found")], "not_found", |a, err| {
                    ResponseEntity::status(404)
                        .body(format!("{}: {}", a.prefix, err.message().unwrap_or("")))
                })
                .handle(&[ErrorKind::IllegalArgument], "bad_input", |_, _| "plain value");
        }
    }

    fn resolver() -> ExceptionResolver {
        let mut table = AdviceTable::<Advice>::new();
        Advice::handlers(&mut table);
        let instance: AnyInstance = Arc::new(Advice::create(()));

        let mut resolver = ExceptionResolver::new();
        for entry in table.into_entries(instance) {
            resolver.register(entry);
        }
        resolver
    }

    #[test]
    fn test_default_table() {
        assert_eq!(ExceptionResolver::default_status(ErrorKind::IllegalArgument), 400);
        assert_eq!(ExceptionResolver::default_status(ErrorKind::Binding), 400);
        assert_eq!(ExceptionResolver::default_status(ErrorKind::Security), 403);
        assert_eq!(ExceptionResolver::default_status(ErrorKind::NoSuchElement), 404);
        assert_eq!(ExceptionResolver::default_status(ErrorKind::UnsupportedOperation), 405);
        assert_eq!(ExceptionResolver::default_status(ErrorKind::UnsupportedType), 500);
        assert_eq!(ExceptionResolver::default_status(ErrorKind::Custom("x")), 500);
    }

    #[test]
    fn test_default_body() {
        let result = ExceptionResolver::resolve_default(&HandlerError::illegal_argument("bad id"));
        assert_eq!(result.status, 400);
        assert_eq!(result.body, Body::Text("bad id".into()));

        let result = ExceptionResolver::resolve_default(&HandlerError::new(ErrorKind::Security));
        assert_eq!(result.status, 403);
        assert_eq!(result.body, Body::Text("403 Error".into()));
    }

    #[test]
    fn test_fixed_status_beats_table() {
        let err = HandlerError::illegal_argument("teapot").with_status(418);
        assert_eq!(ExceptionResolver::resolve_default(&err).status, 418);

        let err = HandlerError::validation(vec!["a bad".into(), "b bad".into()]);
        let result = ExceptionResolver::resolve_default(&err);
        assert_eq!(result.status, 400);
        assert_eq!(result.body, Body::Text("a bad\nb bad".into()));
    }

    #[test]
    fn test_declared_status_for_custom_kind() {
        let mut resolver = ExceptionResolver::new();
        resolver.declare_status(ErrorKind::Custom("user_not_found"), 404);
        resolver.declare_status(ErrorKind::IllegalArgument, 422);

        let result = resolver.resolve(&HandlerError::custom("user_not_found", "no user 9"));
        assert_eq!(result.status, 404);
        assert_eq!(result.body, Body::Text("no user 9".into()));

        // Descendants inherit, the value's own status still wins
        assert_eq!(resolver.resolve(&HandlerError::binding("bad")).status, 422);
        let pinned = HandlerError::custom("user_not_found", "gone").with_status(410);
        assert_eq!(resolver.resolve(&pinned).status, 410);

        // Kind-level declarations survive and undeclared kinds use the table
        assert_eq!(resolver.resolve(&HandlerError::validation(vec!["x".into()])).status, 400);
        assert_eq!(resolver.resolve(&HandlerError::custom("other", "x")).status, 500);
    }

    #[test]
    fn test_advice_entity_used_verbatim() {
        let err = HandlerError::custom("user_not_found", "no user 9");
        let result = resolver().resolve(&err);
        assert_eq!(result.status, 404);
        assert_eq!(result.body, Body::Text("handled: no user 9".into()));
    }

    #[test]
    fn test_advice_matches_ancestor_and_wraps_value() {
        let result = resolver().resolve(&HandlerError::binding("Missing required query param: q"));
        assert_eq!(result.status, 500);
        assert_eq!(result.body, Body::Text("plain value".into()));
    }

    #[test]
    fn test_unclaimed_falls_through() {
        let result = resolver().resolve(&HandlerError::security("nope"));
        assert_eq!(result.status, 403);
        assert_eq!(result.body, Body::Text("nope".into()));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Advice>(), "Advice");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec<alloc::string::String>");
    }
}

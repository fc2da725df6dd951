//! Request dispatch
//!
//! One call to [`Dispatcher::dispatch`] walks a request through
//! match → pre-handle → invoke → post-handle → after-completion → resolve.

use crate::binder;
use crate::interceptor::InterceptorChain;
use crate::{
    BodyCodec, Container, DispatcherConfig, ExceptionResolver, HandlerError, HandlerInterceptor,
    HandlerResult, Injectable, Reply, RequestContext, Route, Router,
};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// The request pipeline built by [`Scanner::scan`](crate::Scanner::scan).
///
/// Immutable apart from [`add_interceptor`](Self::add_interceptor); share it
/// by reference across request threads.
pub struct Dispatcher {
    container: Container,
    router: Router,
    interceptors: InterceptorChain,
    resolver: ExceptionResolver,
    codec: Arc<dyn BodyCodec>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub(crate) fn new(
        container: Container,
        router: Router,
        interceptors: InterceptorChain,
        resolver: ExceptionResolver,
        codec: Arc<dyn BodyCodec>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            container,
            router,
            interceptors,
            resolver,
            codec,
            config,
        }
    }

    /// Handle one request.
    ///
    /// Never fails: routing misses, rejections and handler errors all become
    /// results. Panics raised by handlers or interceptors propagate.
    pub fn dispatch(&self, ctx: &mut RequestContext) -> HandlerResult {
        let Some(route) = self.router.match_path(ctx.path()) else {
            #[cfg(feature = "logging")]
            trace!(target: crate::logging::TARGET, path = ctx.path(), "No route matched");

            return HandlerResult::new(404, self.config.not_found_body.as_str());
        };

        let variables = self.router.bind(route, ctx);
        ctx.set_path_variables(variables);

        if let Err(_rejected_by) = self.interceptors.pre_handle(ctx) {
            #[cfg(feature = "logging")]
            debug!(
                target: crate::logging::TARGET,
                path = ctx.path(),
                interceptor = _rejected_by,
                "Request rejected in pre-handle"
            );

            return HandlerResult::new(403, self.config.forbidden_body.as_str());
        }

        let outcome = self.invoke(route, ctx);

        if let Ok(result) = &outcome {
            self.interceptors.post_handle(ctx, result);
        }
        self.interceptors.after_completion(ctx, outcome.as_ref().err());

        match outcome {
            Ok(result) => result,
            Err(error) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: crate::logging::TARGET,
                    handler = format_args!("{}.{}", route.owner(), route.method()),
                    error = %error,
                    "Handler failed"
                );

                self.resolver.resolve(&error)
            }
        }
    }

    fn invoke(&self, route: &Route, ctx: &RequestContext) -> Result<HandlerResult, HandlerError> {
        let instance = route.instance(&self.container)?;
        let args = binder::bind(route, ctx, self.codec.as_ref())?;

        #[cfg(feature = "logging")]
        trace!(
            target: crate::logging::TARGET,
            handler = format_args!("{}.{}", route.owner(), route.method()),
            "Invoking handler"
        );

        let reply = route.invoke(&instance, args)?;
        Ok(normalize(reply, route.status()))
    }

    /// Append an interceptor; it runs after every existing one.
    pub fn add_interceptor<I: HandlerInterceptor>(&mut self, interceptor: I) {
        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            interceptor = interceptor.name(),
            "Added interceptor"
        );

        self.interceptors.push(Arc::new(interceptor));
    }

    /// The singleton instance of `T`, if it exists yet
    pub fn singleton<T: Injectable>(&self) -> Option<Arc<T>> {
        self.container.singleton::<T>()
    }

    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[inline]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Registered routes in match order
    #[inline]
    pub fn routes(&self) -> &[Route] {
        self.router.routes()
    }

    #[inline]
    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    #[inline]
    pub fn resolver(&self) -> &ExceptionResolver {
        &self.resolver
    }

    #[inline]
    pub fn codec(&self) -> &dyn BodyCodec {
        self.codec.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("container", &self.container)
            .field("routes", &self.router.len())
            .field("interceptors", &self.interceptors)
            .field("exception_handlers", &self.resolver.len())
            .finish()
    }
}

/// Entity replies are used verbatim; bare values get the route's fixed
/// status or 200.
fn normalize(reply: Reply, status: Option<u16>) -> HandlerResult {
    match reply {
        Reply::Entity(entity) => entity.into(),
        Reply::Value(body) => HandlerResult::new(status.unwrap_or(200), body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Body, JsonCodec, ResponseEntity};

    fn empty() -> Dispatcher {
        Dispatcher::new(
            Container::new(),
            Router::new(),
            InterceptorChain::new(),
            ExceptionResolver::new(),
            Arc::new(JsonCodec),
            DispatcherConfig::default().not_found_body("nope"),
        )
    }

    #[test]
    fn test_dispatcher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Dispatcher>();
    }

    #[test]
    fn test_normalize() {
        let entity = normalize(Reply::from(ResponseEntity::status(202).body("queued")), Some(201));
        assert_eq!(entity.status, 202);

        let fixed = normalize(Reply::from("made"), Some(201));
        assert_eq!(fixed.status, 201);
        assert!(fixed.headers.is_empty());

        let plain = normalize(Reply::from("hi"), None);
        assert_eq!(plain.status, 200);
        assert_eq!(plain.body, Body::Text("hi".into()));
    }

    #[test]
    fn test_unmatched_uses_configured_body() {
        let dispatcher = empty();
        let result = dispatcher.dispatch(&mut RequestContext::new("/missing"));
        assert_eq!(result.status, 404);
        assert_eq!(result.body, Body::Text("nope".into()));
    }

    #[test]
    fn test_add_interceptor_appends() {
        struct Audit;
        impl HandlerInterceptor for Audit {}

        let mut dispatcher = empty();
        dispatcher.add_interceptor(Audit);
        assert_eq!(dispatcher.interceptors().len(), 1);
    }
}

//! Startup registration
//!
//! The [`Scanner`] collects components, controllers, advice and interceptors,
//! then [`scan`](Scanner::scan) runs once to build the [`Dispatcher`]:
//!
//! 1. instantiate advice types and collect their handlers,
//! 2. instantiate interceptors, in registration order,
//! 3. build every singleton (unless `eager_singletons` is off),
//! 4. register routes, in controller registration order,
//! 5. lock the container and log the scan report.

use crate::component::{Dependency, Injectable};
use crate::controller::RouteTable;
use crate::interceptor::InterceptorChain;
use crate::resolver::{AdviceTable, ExceptionHandlerEntry};
use crate::{
    BodyCodec, Component, Container, Controller, ControllerAdvice, Dispatcher, DispatcherConfig,
    ErrorKind, ExceptionResolver, HandlerInterceptor, JsonCodec, Result, Route, Router, Scope,
};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, info};

type AdviceStep = Box<dyn FnOnce(&Container) -> Result<Vec<ExceptionHandlerEntry>>>;
type InterceptorStep = Box<dyn FnOnce(&Container) -> Result<Arc<dyn HandlerInterceptor>>>;
type RouteStep = Box<dyn FnOnce() -> Vec<Route>>;

/// One-shot builder for a [`Dispatcher`].
///
/// ```rust
/// use component_dispatcher::{Component, Controller, RequestContext, RouteTable, Scanner};
///
/// struct Ping;
///
/// impl Component for Ping {
///     type Dependencies = ();
///     fn create(_: ()) -> Self { Ping }
/// }
///
/// impl Controller for Ping {
///     fn routes(table: &mut RouteTable<Self>) {
///         table.route("/ping", "ping", vec![], |_, _| Ok("pong"));
///     }
/// }
///
/// let dispatcher = Scanner::new().controller::<Ping>().scan().unwrap();
/// let result = dispatcher.dispatch(&mut RequestContext::new("/ping"));
/// assert_eq!(result.status, 200);
/// ```
pub struct Scanner {
    container: Container,
    components: Vec<Dependency>,
    advice: Vec<AdviceStep>,
    interceptors: Vec<InterceptorStep>,
    routes: Vec<RouteStep>,
    error_statuses: Vec<(ErrorKind, u16)>,
    codec: Arc<dyn BodyCodec>,
    config: DispatcherConfig,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            container: Container::new(),
            components: Vec::new(),
            advice: Vec::new(),
            interceptors: Vec::new(),
            routes: Vec::new(),
            error_statuses: Vec::new(),
            codec: Arc::new(JsonCodec),
            config: DispatcherConfig::default(),
        }
    }

    /// Register a plain component
    pub fn component<T: Component>(mut self) -> Self {
        self.container.register::<T>();
        self.components.push(Dependency::of::<T>());
        self
    }

    /// Register a ready-made singleton
    pub fn instance<T: Injectable>(mut self, instance: T) -> Self {
        self.container.register_instance(instance);
        self.components.push(Dependency::of::<T>());
        self
    }

    /// Register a component and its routes
    pub fn controller<C: Controller>(self) -> Self {
        let mut scanner = self.component::<C>();
        scanner.routes.push(Box::new(|| {
            let mut table = RouteTable::<C>::new();
            C::routes(&mut table);
            table.into_routes()
        }));
        scanner
    }

    /// Register an advice component and its exception handlers
    pub fn advice<A: ControllerAdvice>(self) -> Self {
        let mut scanner = self.component::<A>();
        scanner.advice.push(Box::new(
            |container: &Container| -> Result<Vec<ExceptionHandlerEntry>> {
                let instance = container.resolve::<A>()?;
                let mut table = AdviceTable::<A>::new();
                A::handlers(&mut table);
                Ok(table.into_entries(instance))
            },
        ));
        scanner
    }

    /// Register an interceptor component; it joins the chain at scan time
    pub fn interceptor<I: HandlerInterceptor + Component>(self) -> Self {
        let mut scanner = self.component::<I>();
        scanner.interceptors.push(Box::new(
            |container: &Container| -> Result<Arc<dyn HandlerInterceptor>> {
                let interceptor: Arc<dyn HandlerInterceptor> = container.resolve::<I>()?;
                Ok(interceptor)
            },
        ));
        scanner
    }

    /// Answer unhandled errors of `kind` (and its descendants) with `status`
    /// unless the error value fixes its own
    pub fn error_status(mut self, kind: ErrorKind, status: u16) -> Self {
        self.error_statuses.push((kind, status));
        self
    }

    pub fn codec<B: BodyCodec + 'static>(mut self, codec: B) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the dispatcher. Any resolution failure aborts the scan.
    pub fn scan(self) -> Result<Dispatcher> {
        let Scanner {
            container,
            components,
            advice,
            interceptors,
            routes,
            error_statuses,
            codec,
            config,
        } = self;

        let mut resolver = ExceptionResolver::new();
        for (kind, status) in error_statuses {
            resolver.declare_status(kind, status);
        }
        for step in advice {
            for entry in step(&container)? {
                resolver.register(entry);
            }
        }

        let mut chain = InterceptorChain::new();
        for step in interceptors {
            let interceptor = step(&container)?;

            #[cfg(feature = "logging")]
            debug!(
                target: crate::logging::TARGET,
                interceptor = interceptor.name(),
                "Registered interceptor"
            );

            chain.push(interceptor);
        }

        if config.eager_singletons {
            for dependency in &components {
                let is_singleton = container
                    .descriptor(dependency.type_id)
                    .is_some_and(|d| d.scope() == Scope::Singleton);
                if is_singleton {
                    container.resolve_dependency(*dependency, false)?;
                }
            }
        }

        let mut router = Router::new();
        for step in routes {
            for route in step() {
                router.register(route);
            }
        }

        container.lock();

        #[cfg(feature = "logging")]
        info!(
            target: crate::logging::TARGET,
            components = container.len(),
            singletons = container.singleton_count(),
            prototypes = container.prototype_count(),
            routes = router.len(),
            ambiguous_routes = router.ambiguities().len(),
            interceptors = chain.len(),
            exception_handlers = resolver.len(),
            "Scan complete"
        );

        Ok(Dispatcher::new(container, router, chain, resolver, codec, config))
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, ErrorKind, HandlerError, RequestContext, ResponseEntity, param};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Greeting(String);

    struct Greeter {
        greeting: Arc<Greeting>,
    }

    impl Component for Greeter {
        type Dependencies = Arc<Greeting>;
        fn create(greeting: Arc<Greeting>) -> Self {
            Greeter { greeting }
        }
    }

    impl Controller for Greeter {
        fn routes(table: &mut RouteTable<Self>) {
            table
                .route("/greet/{name}", "greet", vec![param::path("name")], |g, mut args| {
                    Ok(format!("{}, {}", g.greeting.0, args.string(0)?))
                })
                .route("/fail", "fail", vec![], |_, _| {
                    Err::<(), _>(HandlerError::no_such_element("gone"))
                });
        }
    }

    struct GoneAdvice;

    impl Component for GoneAdvice {
        type Dependencies = ();
        fn create(_: ()) -> Self {
            GoneAdvice
        }
    }

    impl ControllerAdvice for GoneAdvice {
        fn handlers(table: &mut AdviceTable<Self>) {
            table.handle(&[ErrorKind::NoSuchElement], "gone", |_, _| {
                ResponseEntity::status(410).body("gone for good")
            });
        }
    }

    #[test]
    fn test_scan_wires_everything() {
        let dispatcher = Scanner::new()
            .instance(Greeting("Hi".into()))
            .controller::<Greeter>()
            .advice::<GoneAdvice>()
            .scan()
            .unwrap();

        assert_eq!(dispatcher.routes().len(), 2);
        assert_eq!(dispatcher.resolver().len(), 1);
        assert!(dispatcher.container().is_locked());
        assert!(dispatcher.singleton::<Greeter>().is_some());

        let result = dispatcher.dispatch(&mut RequestContext::new("/greet/ana"));
        assert_eq!(result.body.as_text(), Some("Hi, ana"));

        let result = dispatcher.dispatch(&mut RequestContext::new("/fail"));
        assert_eq!(result.status, 410);
    }

    #[test]
    fn test_error_status_declared_at_scan() {
        let dispatcher = Scanner::new()
            .instance(Greeting("Hi".into()))
            .controller::<Greeter>()
            .error_status(ErrorKind::NoSuchElement, 410)
            .scan()
            .unwrap();

        assert_eq!(dispatcher.resolver().declared_status(ErrorKind::NoSuchElement), Some(410));
        let result = dispatcher.dispatch(&mut RequestContext::new("/fail"));
        assert_eq!(result.status, 410);
        assert_eq!(result.body.as_text(), Some("gone"));
    }

    #[test]
    fn test_lazy_config_defers_singletons() {
        let dispatcher = Scanner::new()
            .instance(Greeting("Hey".into()))
            .controller::<Greeter>()
            .config(DispatcherConfig::lazy())
            .scan()
            .unwrap();

        assert!(dispatcher.singleton::<Greeter>().is_none());
        dispatcher.dispatch(&mut RequestContext::new("/greet/bo"));
        assert!(dispatcher.singleton::<Greeter>().is_some());
    }

    #[test]
    fn test_missing_dependency_aborts_scan() {
        let err = Scanner::new().controller::<Greeter>().scan().unwrap_err();
        assert!(matches!(err, ConfigError::NotRegistered { .. }));
    }

    #[test]
    fn test_interceptor_components_are_resolved_once() {
        static CREATED: AtomicUsize = AtomicUsize::new(0);

        struct Audit;

        impl Component for Audit {
            type Dependencies = ();
            fn create(_: ()) -> Self {
                CREATED.fetch_add(1, Ordering::SeqCst);
                Audit
            }
        }

        impl HandlerInterceptor for Audit {}

        let dispatcher = Scanner::new().interceptor::<Audit>().scan().unwrap();
        assert_eq!(dispatcher.interceptors().len(), 1);
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);
    }
}

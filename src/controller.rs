//! Route declarations
//!
//! A [`Controller`] lists its routes once, when the scanner registers it.
//! Each route pairs a pattern and parameter specs with a closure that calls
//! the handler method on the controller instance.

use crate::component::Dependency;
use crate::container::AnyInstance;
use crate::resolver::short_type_name;
use crate::router::{Invoker, RoutePattern, Supplier};
use crate::{Arguments, Component, Container, HandlerError, ParamSpec, Reply, Route};
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

/// A component that exposes routes.
///
/// ```rust
/// use component_dispatcher::{param, Component, Controller, RouteTable};
///
/// struct HelloController;
///
/// impl Component for HelloController {
///     type Dependencies = ();
///     fn create(_: ()) -> Self { HelloController }
/// }
///
/// impl HelloController {
///     fn greet(&self, name: String) -> String {
///         format!("Hello, {}!", name)
///     }
/// }
///
/// impl Controller for HelloController {
///     fn routes(table: &mut RouteTable<Self>) {
///         table.route("/hello/{name}", "greet", vec![param::path("name")], |c, mut args| {
///             Ok(c.greet(args.string(0)?))
///         });
///     }
/// }
/// ```
pub trait Controller: Component {
    fn routes(table: &mut RouteTable<Self>);
}

/// Route declarations of one controller type
pub struct RouteTable<C> {
    routes: Vec<Route>,
    _controller: PhantomData<fn(&C)>,
}

impl<C: Controller> RouteTable<C> {
    pub(crate) fn new() -> Self {
        Self {
            routes: Vec::new(),
            _controller: PhantomData,
        }
    }

    /// Declare a route answering 200 unless the handler returns an entity
    pub fn route<F, R>(
        &mut self,
        pattern: &str,
        method: &'static str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&C, Arguments<'_>) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.push(pattern, method, params, None, handler)
    }

    /// Declare a route whose non-entity replies use `status`
    pub fn route_with_status<F, R>(
        &mut self,
        pattern: &str,
        method: &'static str,
        status: u16,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&C, Arguments<'_>) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.push(pattern, method, params, Some(status), handler)
    }

    fn push<F, R>(
        &mut self,
        pattern: &str,
        method: &'static str,
        params: Vec<ParamSpec>,
        status: Option<u16>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&C, Arguments<'_>) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        let invoker: Invoker = Arc::new(move |instance: &AnyInstance, args: Arguments<'_>| {
            let controller = (**instance).downcast_ref::<C>().ok_or_else(|| {
                HandlerError::internal(format!(
                    "Route instance is not a {}",
                    std::any::type_name::<C>()
                ))
            })?;
            handler(controller, args).map(Into::into)
        });

        self.routes.push(Route::new(
            RoutePattern::parse(pattern),
            short_type_name::<C>(),
            method,
            params,
            status,
            supplier::<C>(),
            invoker,
        ));
        self
    }

    pub(crate) fn into_routes(self) -> Vec<Route> {
        self.routes
    }
}

/// Lifecycle-aware instance supplier.
///
/// Prototype controllers, and singletons with a prototype among their direct
/// dependencies, are built fresh for every dispatch.
fn supplier<C: Component>() -> Supplier {
    Arc::new(|container: &Container| {
        let type_id = TypeId::of::<C>();
        let force_new =
            container.is_prototype(type_id) || container.has_prototype_dependency(type_id);
        container.resolve_dependency(Dependency::of::<C>(), force_new)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Body, JsonCodec, RequestContext, Scope, bind, param};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Ticket;

    impl Component for Ticket {
        const SCOPE: Scope = Scope::Prototype;
        type Dependencies = ();
        fn create(_: ()) -> Self {
            Ticket
        }
    }

    struct TicketController {
        _ticket: Arc<Ticket>,
    }

    impl Component for TicketController {
        type Dependencies = Arc<Ticket>;
        fn create(ticket: Arc<Ticket>) -> Self {
            BUILT.fetch_add(1, Ordering::SeqCst);
            TicketController { _ticket: ticket }
        }
    }

    impl Controller for TicketController {
        fn routes(table: &mut RouteTable<Self>) {
            table
                .route("/ticket/{id}", "show", vec![param::path("id").typed::<i64>()], |_, mut args| {
                    Ok(format!("ticket {}", args.long(0)?))
                })
                .route_with_status("/ticket", "create", 201, vec![], |_, _| Ok("created"));
        }
    }

    #[test]
    fn test_table_builds_routes() {
        let mut table = RouteTable::<TicketController>::new();
        TicketController::routes(&mut table);
        let routes = table.into_routes();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].owner(), "TicketController");
        assert_eq!(routes[0].method(), "show");
        assert_eq!(routes[0].status(), None);
        assert_eq!(routes[1].status(), Some(201));
    }

    #[test]
    fn test_supplier_rebuilds_contaminated_controller() {
        let container = Container::new();
        container.register::<Ticket>();
        container.register::<TicketController>();

        let mut table = RouteTable::<TicketController>::new();
        TicketController::routes(&mut table);
        let routes = table.into_routes();
        let route = &routes[0];

        let before = BUILT.load(Ordering::SeqCst);
        let first = route.instance(&container).unwrap();
        let second = route.instance(&container).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(BUILT.load(Ordering::SeqCst), before + 2);

        let mut ctx = RequestContext::new("/ticket/12");
        ctx.set_path_variables(route.pattern().extract("/ticket/12"));
        let args = bind(route, &ctx, &JsonCodec).unwrap();
        let reply = route.invoke(&first, args).unwrap();
        assert_eq!(reply, Reply::Value(Body::Text("ticket 12".into())));
    }

    #[test]
    fn test_supplier_failure_is_internal() {
        let container = Container::new();
        container.register::<TicketController>();

        let mut table = RouteTable::<TicketController>::new();
        TicketController::routes(&mut table);
        let routes = table.into_routes();

        let err = routes[0].instance(&container).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
        assert!(
            err.message()
                .unwrap()
                .starts_with("Failed to create instance for route: /ticket/{id}")
        );
    }

    #[test]
    fn test_wrong_instance_type() {
        let mut table = RouteTable::<TicketController>::new();
        TicketController::routes(&mut table);
        let routes = table.into_routes();

        let ctx = RequestContext::new("/ticket");
        let args = bind(&routes[1], &ctx, &JsonCodec).unwrap();
        let wrong: AnyInstance = Arc::new(42u8);
        let err = routes[1].invoke(&wrong, args).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
    }
}

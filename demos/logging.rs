//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use component_dispatcher::param;
use component_dispatcher::prelude::*;

struct Database {
    url: String,
}

impl Component for Database {
    type Dependencies = ();
    fn create(_: ()) -> Self {
        Database {
            url: "postgres://localhost/mydb".into(),
        }
    }
}

struct RequestId(u32);

impl Component for RequestId {
    const SCOPE: Scope = Scope::Prototype;
    type Dependencies = ();
    fn create(_: ()) -> Self {
        RequestId(7)
    }
}

struct UserController {
    db: Arc<Database>,
    request: Arc<RequestId>,
}

impl Component for UserController {
    type Dependencies = (Arc<Database>, Arc<RequestId>);
    fn create((db, request): Self::Dependencies) -> Self {
        UserController { db, request }
    }
}

impl Controller for UserController {
    fn routes(table: &mut RouteTable<Self>) {
        table
            .route("/users/{id}", "show", vec![param::path("id").typed::<i64>()], |c, mut args| {
                Ok(format!(
                    "user {} from {} (request {})",
                    args.long(0)?,
                    c.db.url,
                    c.request.0
                ))
            })
            // Overlaps /users/{id}; logged as ambiguous at scan time
            .route("/users/me", "me", vec![], |_, _| Ok("me"));
    }
}

fn main() {
    // Initialize logging - uses JSON if logging-json feature enabled,
    // pretty if logging-pretty enabled
    #[cfg(feature = "logging")]
    {
        component_dispatcher::logging::builder().debug().init();
    }

    println!("=== Component Dispatcher Logging Demo ===\n");

    // Logs: container creation, registrations, eager singletons, routes,
    // the ambiguity warning and the scan report
    let dispatcher = Scanner::new()
        .component::<Database>()
        .component::<RequestId>()
        .controller::<UserController>()
        .scan()
        .expect("scan failed");

    // Logs: route lookup, prototype construction, handler invocation
    let result = dispatcher.dispatch(&mut RequestContext::new("/users/42"));
    println!("GET /users/42 -> {} {:?}", result.status, result.body);

    // Logs: binding failure and its resolution
    let result = dispatcher.dispatch(&mut RequestContext::new("/users/abc"));
    println!("GET /users/abc -> {} {:?}", result.status, result.body);

    // Logs: no route matched
    let result = dispatcher.dispatch(&mut RequestContext::new("/nowhere"));
    println!("GET /nowhere -> {} {:?}", result.status, result.body);

    println!("\n=== Demo Complete ===");
    println!("Check the log output above to see structured logging in action!");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
}

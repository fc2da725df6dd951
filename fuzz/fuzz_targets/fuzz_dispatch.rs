#![no_main]

//! Fuzz target for the full dispatch pipeline
//!
//! Feeds arbitrary exchanges through the transport boundary and checks that
//! every request ends in a well-formed response.

use arbitrary::Arbitrary;
use component_dispatcher::transport::{self, Exchange};
use component_dispatcher::{
    Component, Controller, Dispatcher, HandlerInterceptor, RequestContext, RouteTable, Scanner,
    Scope, Validate, Violations, param,
};
use libfuzzer_sys::fuzz_target;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Arbitrary)]
struct Request {
    method: u8,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

#[derive(Deserialize)]
struct Payload {
    name: Option<String>,
}

impl Validate for Payload {
    fn validate(&self) -> Result<(), Vec<String>> {
        Violations::new()
            .not_null("name", self.name.as_ref())
            .size("name", self.name.as_deref(), 1, 16)
            .finish()
    }
}

struct Fresh;

impl Component for Fresh {
    const SCOPE: Scope = Scope::Prototype;
    type Dependencies = ();
    fn create(_: ()) -> Self {
        Fresh
    }
}

struct Api {
    _fresh: Arc<Fresh>,
}

impl Component for Api {
    type Dependencies = Arc<Fresh>;
    fn create(fresh: Arc<Fresh>) -> Self {
        Api { _fresh: fresh }
    }
}

impl Controller for Api {
    fn routes(table: &mut RouteTable<Self>) {
        table
            .route("/items/{id}", "item", vec![param::path("id").typed::<i64>()], |_, mut args| {
                Ok(format!("item {}", args.long(0)?))
            })
            .route(
                "/search",
                "search",
                vec![
                    param::query("q"),
                    param::query("page").typed::<i32>().default_value("1"),
                    param::header("X-Flag").typed::<bool>().optional(),
                ],
                |_, mut args| {
                    Ok(format!("{} {} {:?}", args.string(0)?, args.int(1)?, args.opt_bool(2)?))
                },
            )
            .route("/items", "create", vec![param::valid_body::<Payload>()], |_, mut args| {
                let payload: Payload = args.body(0)?;
                Ok(payload.name.unwrap_or_default())
            });
    }
}

struct Gate;

impl Component for Gate {
    type Dependencies = ();
    fn create(_: ()) -> Self {
        Gate
    }
}

impl HandlerInterceptor for Gate {
    fn pre_handle(&self, ctx: &mut RequestContext) -> bool {
        ctx.header("x-deny").is_none()
    }
}

fn dispatcher() -> &'static Dispatcher {
    static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();
    DISPATCHER.get_or_init(|| {
        Scanner::new()
            .component::<Fresh>()
            .controller::<Api>()
            .interceptor::<Gate>()
            .scan()
            .expect("scan")
    })
}

fuzz_target!(|request: Request| {
    let method = match request.method % 3 {
        0 => "GET",
        1 => "POST",
        _ => "PATCH",
    };

    let mut exchange = Exchange::from_target(method, &request.target).with_body(request.body);
    for (name, value) in request.headers.into_iter().take(8) {
        exchange = exchange.with_header(name, value);
    }

    let response = transport::serve(dispatcher(), exchange);
    assert!(
        matches!(response.status, 200 | 400 | 403 | 404 | 405),
        "unexpected status {}",
        response.status
    );
    if method == "PATCH" {
        assert_eq!(response.status, 405);
    }
});

//! The hello application: services, a controller, two interceptors and an
//! advice type, driven through the transport boundary.
//!
//! Run with:
//!   cargo run --example hello

use component_dispatcher::param;
use component_dispatcher::prelude::*;
use component_dispatcher::transport::{self, Exchange};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

// =============================================================================
// Services
// =============================================================================

struct MessageService;

impl Component for MessageService {
    type Dependencies = ();
    fn create(_: ()) -> Self {
        MessageService
    }
}

impl MessageService {
    fn message(&self) -> &'static str {
        "This is a message from MessageService."
    }
}

/// Built fresh for every resolution
struct RequestTimer {
    timestamp: u128,
}

impl Component for RequestTimer {
    const SCOPE: Scope = Scope::Prototype;
    type Dependencies = ();
    fn create(_: ()) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        RequestTimer { timestamp }
    }
}

// =============================================================================
// Controller
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct UserRequest {
    name: Option<String>,
    email: Option<String>,
    age: i32,
}

impl Validate for UserRequest {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        Violations::new()
            .not_null("name", self.name.as_ref())
            .size("name", self.name.as_deref(), 2, 30)
            .email("email", self.email.as_deref())
            .finish()
    }
}

#[derive(Serialize)]
struct UserResponse<'a> {
    status: &'a str,
    message: &'a str,
    user: UserRequest,
}

struct HelloController {
    messages: Arc<MessageService>,
    timer: Arc<RequestTimer>,
}

impl Component for HelloController {
    type Dependencies = (Arc<MessageService>, Arc<RequestTimer>);
    fn create((messages, timer): Self::Dependencies) -> Self {
        HelloController { messages, timer }
    }
}

impl HelloController {
    fn create_user(&self, user: UserRequest) -> std::result::Result<ResponseEntity, HandlerError> {
        let response = UserResponse {
            status: "success",
            message: "User created successfully",
            user,
        };
        Ok(ResponseEntity::ok(Body::json(&response)?))
    }

    fn find_user(&self, id: i64) -> std::result::Result<String, HandlerError> {
        if id == 42 {
            Ok("User 42: Douglas".to_string())
        } else {
            Err(HandlerError::custom(
                "user_not_found",
                format!("User with id {} not found", id),
            ))
        }
    }
}

impl Controller for HelloController {
    fn routes(table: &mut RouteTable<Self>) {
        table
            .route("/hello", "say_hello", vec![], |c, _| Ok(c.messages.message()))
            .route("/hello/{name}", "greet_by_name", vec![param::path("name")], |_, mut args| {
                Ok(format!("Hello, {}!", args.string(0)?))
            })
            // Registered before /user/{id}, which would otherwise claim it
            .route(
                "/user/create",
                "create",
                vec![param::valid_body::<UserRequest>()],
                |c, mut args| c.create_user(args.body(0)?),
            )
            .route(
                "/user/{id}",
                "get_user_by_id",
                vec![param::path("id").typed::<i32>()],
                |_, mut args| Ok(format!("User ID: {}", args.int(0)?)),
            )
            .route(
                "/user/{id}/profile",
                "get_user_profile",
                vec![param::path("id").typed::<i32>()],
                |_, mut args| Ok(format!("Profile for user ID: {}", args.int(0)?)),
            )
            .route(
                "/users/{id}",
                "find_user",
                vec![param::path("id").typed::<i64>()],
                |c, mut args| c.find_user(args.long(0)?),
            )
            .route("/goodbye", "say_goodbye", vec![], |_, _| Ok("Goodbye, World!"))
            .route("/time", "get_request_time", vec![], |c, _| {
                Ok(format!("Request timestamp: {}", c.timer.timestamp))
            })
            .route("/admin", "admin_area", vec![], |_, _| Ok("Welcome to the admin area!"))
            .route(
                "/search",
                "search",
                vec![
                    param::query("q"),
                    param::query("page").typed::<i32>().default_value("1"),
                ],
                |_, mut args| Ok(format!("Searching '{}' page {}", args.string(0)?, args.int(1)?)),
            )
            .route(
                "/debug",
                "debug",
                vec![
                    param::header("User-Agent"),
                    param::header("X-Debug")
                        .typed::<bool>()
                        .optional()
                        .default_value("false"),
                ],
                |_, mut args| Ok(format!("UA={}, debug={}", args.string(0)?, args.bool(1)?)),
            )
            .route("/created", "created", vec![], |_, _| {
                Ok(ResponseEntity::status(201).header("X-App", "Abi").body("Created"))
            })
            .route("/error", "error", vec![], |_, _| {
                Err::<(), _>(HandlerError::illegal_argument("Invalid argument provided"))
            });
    }
}

// =============================================================================
// Interceptors
// =============================================================================

struct AuthInterceptor;

impl Component for AuthInterceptor {
    type Dependencies = ();
    fn create(_: ()) -> Self {
        AuthInterceptor
    }
}

impl HandlerInterceptor for AuthInterceptor {
    fn pre_handle(&self, ctx: &mut RequestContext) -> bool {
        !ctx.path().starts_with("/admin")
    }
}

struct LoggingInterceptor;

impl Component for LoggingInterceptor {
    type Dependencies = ();
    fn create(_: ()) -> Self {
        LoggingInterceptor
    }
}

impl HandlerInterceptor for LoggingInterceptor {
    fn pre_handle(&self, ctx: &mut RequestContext) -> bool {
        println!("  -> incoming request: {}", ctx.path());
        true
    }

    fn post_handle(&self, _ctx: &mut RequestContext, result: &HandlerResult) {
        println!("  <- response: {} {:?}", result.status, result.body);
    }
}

// =============================================================================
// Advice
// =============================================================================

struct UserNotFoundAdvice;

impl Component for UserNotFoundAdvice {
    type Dependencies = ();
    fn create(_: ()) -> Self {
        UserNotFoundAdvice
    }
}

impl ControllerAdvice for UserNotFoundAdvice {
    fn handlers(table: &mut AdviceTable<Self>) {
        table.handle(
            &[ErrorKind::Custom("user_not_found")],
            "handle_user_not_found",
            |_, err| ResponseEntity::status(404).body(err.message().unwrap_or("").to_string()),
        );
    }
}

fn call(dispatcher: &Dispatcher, exchange: Exchange) {
    println!("{} {}", exchange.method(), exchange.path());
    let response = transport::serve(dispatcher, exchange);
    println!(
        "  = {} {}\n",
        response.status,
        String::from_utf8_lossy(&response.body)
    );
}

fn main() {
    println!("=== Component Dispatcher Hello Demo ===\n");

    let dispatcher = Scanner::new()
        .component::<MessageService>()
        .component::<RequestTimer>()
        .controller::<HelloController>()
        .interceptor::<AuthInterceptor>()
        .interceptor::<LoggingInterceptor>()
        .advice::<UserNotFoundAdvice>()
        .scan()
        .expect("scan failed");

    println!("Registered routes:");
    for route in dispatcher.routes() {
        println!("  {} -> {}.{}", route.pattern(), route.owner(), route.method());
    }
    println!();

    for path in [
        "/hello",
        "/goodbye",
        "/hello/Alice",
        "/user/42",
        "/user/42/profile",
        "/unknown",
        "/time",
        "/time",
        "/admin",
        "/users/42",
        "/users/7",
        "/created",
        "/error",
    ] {
        call(&dispatcher, Exchange::new("GET", path));
    }

    call(&dispatcher, Exchange::from_target("GET", "/search?q=rust+di&page=2"));
    call(&dispatcher, Exchange::from_target("GET", "/search"));
    call(
        &dispatcher,
        Exchange::new("GET", "/debug")
            .with_header("User-Agent", "demo/1.0")
            .with_header("X-Debug", "true"),
    );
    call(
        &dispatcher,
        Exchange::new("POST", "/user/create")
            .with_body(r#"{"name":"Ana","email":"ana@example.com","age":30}"#),
    );
    call(
        &dispatcher,
        Exchange::new("POST", "/user/create").with_body(r#"{"email":"nope","age":30}"#),
    );
    call(&dispatcher, Exchange::new("DELETE", "/hello"));

    println!("=== Demo Complete ===");
}

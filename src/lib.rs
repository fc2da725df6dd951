//! # Component Dispatcher
//!
//! A small component container with constructor and field injection,
//! singleton and prototype lifecycles, and a request dispatcher on top of it:
//! path-pattern routing, declarative parameter binding, an interceptor
//! pipeline and exception resolution through advice handlers.
//!
//! ## Features
//!
//! - **Lock-free registry** - `DashMap` descriptors and per-type `OnceCell` singleton slots
//! - **Two lifecycles** - singletons built once, prototypes built per resolution
//! - **Lifecycle-aware routes** - controllers that depend on a prototype are rebuilt per request
//! - **Typed binding** - path variables, query params, headers and bodies with defaults
//! - **Interceptors** - `pre_handle` / `post_handle` / `after_completion`, in order
//! - **Advice** - error kinds mapped to responses, with a built-in status table behind them
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use component_dispatcher::prelude::*;
//! use component_dispatcher::param;
//!
//! struct MessageService;
//!
//! impl Component for MessageService {
//!     type Dependencies = ();
//!     fn create(_: ()) -> Self { MessageService }
//! }
//!
//! struct HelloController {
//!     messages: Arc<MessageService>,
//! }
//!
//! impl Component for HelloController {
//!     type Dependencies = Arc<MessageService>;
//!     fn create(messages: Arc<MessageService>) -> Self { HelloController { messages } }
//! }
//!
//! impl Controller for HelloController {
//!     fn routes(table: &mut RouteTable<Self>) {
//!         table
//!             .route("/hello", "hello", vec![], |_, _| Ok("Hello, World!"))
//!             .route("/hello/{name}", "greet", vec![param::path("name")], |_, mut args| {
//!                 Ok(format!("Hello, {}!", args.string(0)?))
//!             });
//!     }
//! }
//!
//! let dispatcher = Scanner::new()
//!     .component::<MessageService>()
//!     .controller::<HelloController>()
//!     .scan()
//!     .unwrap();
//!
//! let result = dispatcher.dispatch(&mut RequestContext::new("/hello/Alice"));
//! assert_eq!(result.status, 200);
//! assert_eq!(result.body.as_text(), Some("Hello, Alice!"));
//! ```
//!
//! ## Dispatch
//!
//! Every request goes through the same steps:
//!
//! 1. Match the path against the registered patterns (404 if none match).
//! 2. Run every interceptor's `pre_handle` (403 on the first rejection).
//! 3. Obtain the controller instance, bind the parameters, call the handler.
//! 4. Run `post_handle` on success, then `after_completion` always.
//! 5. Turn any error into a response through advice or the status table.

mod binder;
mod codec;
mod component;
mod config;
mod container;
mod controller;
mod dispatcher;
mod error;
mod http;
mod interceptor;
#[cfg(feature = "logging")]
pub mod logging;
pub mod param;
mod resolver;
mod router;
mod scanner;
pub mod transport;
mod validation;

pub use binder::{Argument, Arguments, bind};
pub use codec::{BodyCodec, JsonCodec};
pub use component::{
    Component, Dependencies, Dependency, FieldDependency, Inject, Injectable, Scope,
};
pub use config::DispatcherConfig;
pub use container::{AnyInstance, ComponentDescriptor, Container};
pub use controller::{Controller, RouteTable};
pub use dispatcher::Dispatcher;
pub use error::*;
pub use http::{Body, HandlerResult, Headers, Reply, RequestContext, ResponseEntity};
pub use interceptor::{HandlerInterceptor, InterceptorChain};
pub use param::ParamSpec;
pub use resolver::{AdviceTable, ControllerAdvice, ExceptionHandlerEntry, ExceptionResolver};
pub use router::{Route, RoutePattern, Router, Segment};
pub use scanner::Scanner;
pub use transport::{EncodedResponse, Exchange};
pub use validation::{Validate, Violations};

#[cfg(feature = "derive")]
pub use component_dispatcher_derive::Component;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Arguments, Body, Component, ConfigError, Container, Controller, ControllerAdvice,
        AdviceTable, Dispatcher, DispatcherConfig, ErrorKind, HandlerError, HandlerInterceptor,
        HandlerResult, Inject, Injectable, RequestContext, ResponseEntity, Result, RouteTable,
        Scanner, Scope, Validate, Violations,
    };
    pub use std::sync::Arc;
}

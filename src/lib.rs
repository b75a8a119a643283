//! pubwire: the server core of a lightweight RPC + publish/subscribe
//! protocol multiplexed over a single message-oriented transport.
//!
//! Clients connect over a WebSocket-class transport, invoke named
//! server-side procedures identified by path patterns, and receive
//! asynchronously published messages on paths the server has subscribed
//! them to. The crate provides the textual framing codec, the route
//! dispatch pipeline with its ordered middleware chains, the subscription
//! registry, and the connection lifecycle.
//!
//! ## Wire format
//!
//! Every frame is one UTF-8 text message:
//!
//! ```text
//! <type-digit>[ "$" <id> ][ "~" <percent-encoded-path> ] "|" [ <json-body> ]
//! ```
//!
//! A new connection is greeted with `0|3` (welcome, protocol version 3).
//! An invoke like `1$27~/hello|"hi"` is answered on the same id with a
//! result (`2$27|"hi"`) or an error (`3$27|{"status":404,...}`); publishes
//! (`4~/topic|...`) flow one way, server to client. See [`Frame`] for the
//! details and [`FrameError`] for the validation rules.
//!
//! ## Basic usage
//!
//! The [`Server`] type is the main type provided by this crate. Routes are
//! registered as ordered middleware chains; each layer receives an
//! [`InvokeContext`] and a [`Next`] continuation.
//!
//! ```no_run
//! use pubwire::{InvokeContext, InvokeError, Next, Server, Value};
//! use serde_json::json;
//!
//! # fn test_fn() -> Result<Server, pubwire::RegistrationError> {
//! let server = Server::new();
//!
//! server.register_route("/hello", |_ctx: InvokeContext, _next: Next| async move {
//!     Ok(Some(json!("hi")))
//! })?;
//!
//! // `:name` captures a segment, `*` captures the rest.
//! server.register_route("/files/:name/*", |ctx: InvokeContext, _next: Next| async move {
//!     if ctx.splats.iter().any(|s| s.contains("..")) {
//!         return Err(InvokeError::new(400, "Bad Request").into());
//!     }
//!     Ok(Some(Value::from(ctx.params["name"].clone())))
//! })?;
//!
//! // Layers run left to right; each decides whether to call `next`.
//! server.register_route("/guarded", (
//!     |ctx: InvokeContext, next: Next| async move {
//!         if ctx.body.is_none() {
//!             return Err(InvokeError::new(401, "Unauthorized").into());
//!         }
//!         next.run(ctx).await
//!     },
//!     |ctx: InvokeContext, _next: Next| async move { Ok(ctx.body) },
//! ))?;
//! # Ok(server)
//! # }
//! ```
//!
//! ## Serving and publishing
//!
//! The [`pubsub`] module serves a [`Server`] over a transport; WebSockets
//! are built in via [`pubsub::Connect`] on [`std::net::SocketAddr`].
//! Subscriptions are managed server-side: handlers (or any other code
//! holding the [`Server`] handle) subscribe clients to paths, and
//! [`Server::publish`] fans a payload out to every current subscriber.
//!
//! ```no_run
//! # use pubwire::{pubsub::Connect, Server};
//! # use serde_json::json;
//! # async fn _main(server: Server) -> Result<(), Box<dyn std::error::Error>> {
//! let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 3000));
//! // The shutdown object will stop the server when dropped.
//! let shutdown = addr.serve(server.clone()).await?;
//!
//! server.publish("/ticker", Some(json!({"seq": 1})));
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! Lifecycle and failure signals are typed broadcast events: see
//! [`ServerEvent`] for the server-level signals (connections, parser
//! errors, 500-converted handler failures) and [`ClientEvent`] for
//! per-client close/error notifications.

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod client;
pub use client::{Client, ClientEvent, ReadyState};

mod error;
pub use error::RegistrationError;

mod events;
pub use events::{ServerEvent, SharedError};

pub(crate) mod metrics;

pub mod pubsub;

mod registry;
pub use registry::InitialData;

mod router;

mod routes;
pub use routes::{
    HandlerFuture, HandlerResult, InvokeContext, Middleware, MiddlewareStack, Next,
};

mod server;
pub use server::{ErrorConverter, IdGenerator, Server, ServerBuilder};

mod tasks;
pub(crate) use tasks::TaskSet;

mod types;
pub use types::{
    ErrorBody, Frame, FrameError, HandlerError, InvokeError, PROTOCOL_VERSION,
};

/// Re-export of the `serde_json` crate, and its [`Value`] type, which
/// carries every frame body.
pub use serde_json::{self, Value};

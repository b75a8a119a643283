//! Serving utilities for [`Server`]s.
//!
//! This module provides everything needed to serve a [`Server`] over a
//! message-oriented transport. Built-in support is provided for WebSockets,
//! and a trait system is provided for custom transports.
//!
//! ## Usage
//!
//! Typically users call [`Connect::serve`] on a connect object such as a
//! [`SocketAddr`]. This creates a [`Listener`] and spawns an accept loop;
//! each accepted connection is enrolled with the server, which performs the
//! welcome handshake and runs the connection's task pair. The returned
//! [`ServerShutdown`] cancels everything when dropped.
//!
//! ## Internal structure
//!
//! There are three kinds of task:
//! - `ListenerTask` — accepts new connections. One per served listener.
//! - `ReadTask` — decodes inbound messages and feeds the dispatcher. One
//!   per connection.
//! - `WriteTask` — drains the client's outbound frame queue into the
//!   transport sink. One per connection.
//!
//! ## Outbound buffering
//!
//! Every reply and publish for a client passes through that client's
//! bounded outbound queue, sized by [`Connect::outbound_buffer_size`]. A
//! client that stops reading fills its queue, and further frames for it
//! are dropped rather than stalling the server; sizing the buffer is
//! therefore a per-deployment decision.
//!
//! ## Custom transports
//!
//! Implement [`Listener`] for a transport that accepts connections and
//! exposes them as a sink/stream pair of discrete UTF-8 messages, and
//! [`Connect`] for whatever configuration object builds that listener.
//! Transport-engine options (TLS, socket tuning, and the like) belong on
//! the connect object and pass through untouched.
//!
//! [`Server`]: crate::Server
//! [`SocketAddr`]: std::net::SocketAddr

mod shared;
pub(crate) use shared::{ReadTask, WriteTask};
pub use shared::DEFAULT_OUTBOUND_BUFFER_PER_CLIENT;

mod shutdown;
pub use shutdown::ServerShutdown;

mod r#trait;
pub use r#trait::{Connect, FrameSink, FrameStream, In, Listener, Out};

mod ws;
pub use ws::WsTextStream;

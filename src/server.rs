use crate::{
    client::ReadyState,
    error::RegistrationError,
    events::{EventBus, ServerEvent},
    metrics,
    pubsub::{In, Listener, Out, ReadTask, WriteTask},
    registry::{InitialData, SubscriptionRegistry},
    router::Router,
    routes::{InvokeContext, MiddlewareStack, PathPattern, Route},
    tasks::TaskSet,
    types::{ErrorBody, Frame, HandlerError},
    Client,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::{collections::HashMap, env, fmt, sync::Arc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, trace};
use uuid::Uuid;

/// Boxed error produced by a failing converter.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Conversion of handler failures into sanitized `Error` reply payloads.
///
/// The converter sees the original failure and the invoking client, and
/// returns the JSON body of the `Error` reply. A converter that itself
/// fails falls back to a generic 500 and raises the server's error signal.
pub type ErrorConverter = Arc<dyn Fn(&HandlerError, &Client) -> Result<Value, BoxError> + Send + Sync>;

/// Generator for connection ids: tokens of at most 32 characters from
/// `[A-Za-z0-9-]`. Uniqueness only needs to hold among live connections;
/// the server retries on collision.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// The server core: connection map, route table, subscription registry,
/// and the invoke dispatch pipeline.
///
/// `Server` is a cheap cloneable handle. Routes can be registered at any
/// time, including after serving has begun; registration order decides
/// resolution order.
///
/// ```no_run
/// use pubwire::{pubsub::Connect, InvokeContext, Next, Server, Value};
///
/// # async fn _main() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::new();
/// server.register_route("/echo/:word", |ctx: InvokeContext, _next: Next| async move {
///     Ok(ctx.params.get("word").cloned().map(Value::from))
/// })?;
///
/// let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 3000));
/// let shutdown = addr.serve(server).await?;
/// shutdown.wait().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    /// Clients map and subscription registry, guarded together so the
    /// bidirectional invariant holds at every observable point. Never held
    /// across an await.
    state: Mutex<ServerState>,
    /// Ordered route table. Append-only.
    router: RwLock<Router>,
    events: EventBus,
    id_gen: IdGenerator,
    error_converter: ErrorConverter,
    tasks: TaskSet,
}

#[derive(Default)]
struct ServerState {
    clients: HashMap<String, Client>,
    registry: SubscriptionRegistry,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").finish_non_exhaustive()
    }
}

impl Server {
    /// A server with the default id generator and error converter.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building a server with custom options.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Register `pattern` with an ordered middleware chain: a single
    /// handler, a tuple of layers, or a `Vec` of boxed layers.
    pub fn register_route<S>(&self, pattern: &str, handlers: S) -> Result<(), RegistrationError>
    where
        S: MiddlewareStack,
    {
        let chain = handlers.into_stack();
        if chain.is_empty() {
            return Err(RegistrationError::EmptyHandlerChain(
                pattern.to_owned().into(),
            ));
        }
        let compiled =
            PathPattern::parse(pattern).map_err(|source| RegistrationError::InvalidPattern {
                pattern: pattern.to_owned().into(),
                source,
            })?;
        self.inner.router.write().push(compiled, Route::new(chain));
        Ok(())
    }

    /// Subscribe to server-level signals.
    pub fn events(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    /// Look up a live client by id.
    pub fn client(&self, id: &str) -> Option<Client> {
        self.inner.state.lock().clients.get(id).cloned()
    }

    /// Number of live client connections.
    pub fn client_count(&self) -> usize {
        self.inner.state.lock().clients.len()
    }

    /// Close one client's connection from the server side. Returns whether
    /// the client was live.
    pub fn disconnect_client(&self, id: &str) -> bool {
        match self.client(id) {
            Some(client) => {
                client.begin_close();
                true
            }
            None => false,
        }
    }

    /// Subscribe `client` to `path`.
    ///
    /// A no-op when the client is already subscribed, including the initial
    /// data. [`InitialData::Ready`] is sent immediately, to this client
    /// only; [`InitialData::Deferred`] resolves in the background and the
    /// send is skipped when the client has unsubscribed in the meantime or
    /// the future resolves to `None`.
    pub fn subscribe(&self, client: &Client, path: &str, initial: Option<InitialData>) {
        let added = self.inner.state.lock().registry.insert(client.id(), path);
        if !added {
            trace!(client = client.id(), path, "already subscribed");
            return;
        }
        debug!(client = client.id(), path, "subscribed");
        match initial {
            None => {}
            Some(InitialData::Ready(value)) => {
                client.send_frame(Frame::publish(path, Some(value)).encode());
            }
            Some(InitialData::Deferred(fut)) => {
                let server = self.clone();
                let client = client.clone();
                let path = path.to_owned();
                self.inner.tasks.spawn(async move {
                    let Some(value) = fut.await else { return };
                    // membership may have changed while the value resolved
                    if !server.inner.state.lock().registry.contains(client.id(), &path) {
                        return;
                    }
                    client.send_frame(Frame::publish(path, Some(value)).encode());
                });
            }
        }
    }

    /// Remove one subscription. Returns whether a change occurred.
    pub fn unsubscribe(&self, client: &Client, path: &str) -> bool {
        let removed = self.inner.state.lock().registry.remove(client.id(), path);
        if removed {
            debug!(client = client.id(), path, "unsubscribed");
        }
        removed
    }

    /// Remove every subscriber from `path`. Returns whether a change
    /// occurred.
    pub fn unsubscribe_all(&self, path: &str) -> bool {
        let removed = self.inner.state.lock().registry.remove_path(path);
        if removed {
            debug!(path, "cleared subscribers");
        }
        removed
    }

    /// Publish `body` to every client currently subscribed to `path`. The
    /// frame is encoded once; fan-out order across clients is unspecified.
    pub fn publish(&self, path: &str, body: Option<Value>) {
        let targets: Vec<Client> = {
            let state = self.inner.state.lock();
            let Some(ids) = state.registry.subscribers(path) else {
                return;
            };
            ids.iter()
                .filter_map(|id| state.clients.get(id).cloned())
                .collect()
        };
        if targets.is_empty() {
            return;
        }
        let frame = Frame::publish(path, body).encode();
        metrics::record_publish(targets.len());
        trace!(path, subscribers = targets.len(), "publishing");
        for client in &targets {
            client.send_frame(frame.clone());
        }
    }

    /// Shut the server down: close every client connection, clear the
    /// connection map and registry, and cancel all server tasks.
    pub async fn close(&self) {
        let clients: Vec<Client> = self.inner.state.lock().clients.values().cloned().collect();
        for client in &clients {
            client.begin_close();
        }
        for client in &clients {
            self.disconnect(client, "server closed", None);
        }
        self.inner.tasks.shutdown().await;
    }

    pub(crate) fn tasks(&self) -> &TaskSet {
        &self.inner.tasks
    }

    /// Enroll an accepted transport connection: assign an id, send the
    /// welcome frame, announce the connection, and spawn the read/write
    /// task pair.
    pub(crate) fn accept<T: Listener>(&self, sink: Out<T>, frames: In<T>, outbound_buffer: usize) {
        let (tx, rx) = mpsc::channel(outbound_buffer);
        let client = {
            let mut state = self.inner.state.lock();
            let mut id = (self.inner.id_gen)();
            while state.clients.contains_key(&id) {
                id = (self.inner.id_gen)();
            }
            let client = Client::new(id, tx);
            state.clients.insert(client.id().to_owned(), client.clone());
            client
        };

        // queued before anything else can address this client, so it is
        // the first frame on the wire
        client.send_frame(Frame::welcome().encode());
        client.set_ready_state(ReadyState::Open);
        metrics::record_connection();
        debug!(client = client.id(), "accepted connection");
        self.inner.events.emit(ServerEvent::Connection(client.clone()));

        let conn_tasks = self.inner.tasks.child();
        conn_tasks.spawn(
            WriteTask::<T> {
                client: client.clone(),
                items: rx,
                sink,
            }
            .task_future(),
        );
        conn_tasks.spawn(
            ReadTask::<T> {
                server: self.clone(),
                client,
                frames,
            }
            .task_future(),
        );
    }

    /// Handle one decoded-or-not inbound message from a client.
    pub(crate) fn handle_message(&self, client: &Client, raw: String) {
        match Frame::decode(&raw) {
            Ok(Frame::Invoke { id, path, body }) => self.dispatch(client, id, path, body),
            Ok(frame) => {
                // server role: only invokes are meaningful inbound
                trace!(client = client.id(), ?frame, "ignoring non-invoke frame");
            }
            Err(err) => {
                debug!(client = client.id(), %err, "failed to decode inbound frame");
                metrics::record_parser_error();
                self.inner.events.emit(ServerEvent::ParserError {
                    client: client.clone(),
                    raw,
                });
                client.begin_close();
            }
        }
    }

    /// Resolve and run the route for one invoke, replying on the same id.
    fn dispatch(&self, client: &Client, id: String, path: String, body: Option<Value>) {
        metrics::record_invoke();
        let resolved = {
            let router = self.inner.router.read();
            router
                .resolve(&path)
                .map(|r| (r.pattern.to_owned(), r.matched, r.route.clone()))
        };
        let Some((pattern, matched, route)) = resolved else {
            trace!(client = client.id(), path, "invoke matched no route");
            metrics::record_invoke_error(404);
            client.send_frame(Frame::error(id, Some(ErrorBody::not_found().into_value())).encode());
            return;
        };

        let invoke = Frame::invoke(id.clone(), path, body.clone());
        let ctx = InvokeContext {
            server: self.clone(),
            client: client.clone(),
            path: pattern,
            params: matched.params,
            splats: matched.splats,
            body,
        };
        let server = self.clone();
        let client = client.clone();
        self.inner.tasks.spawn(async move {
            let outcome = route.oneshot(ctx).await;
            server.finish_invoke(&client, id, invoke, outcome);
        });
    }

    /// Turn a settled middleware chain into the reply frame, running the
    /// error converter on failures.
    fn finish_invoke(
        &self,
        client: &Client,
        id: String,
        invoke: Frame,
        outcome: Result<Option<Value>, HandlerError>,
    ) {
        match outcome {
            Ok(body) => client.send_frame(Frame::result(id, body).encode()),
            Err(err) => {
                let converted = (self.inner.error_converter)(&err, client).unwrap_or_else(
                    |convert_err| {
                        error!(%convert_err, "invoke error converter failed");
                        self.inner
                            .events
                            .emit(ServerEvent::Error(Arc::from(convert_err)));
                        ErrorBody::internal_error().into_value()
                    },
                );
                let status = converted.get("status").and_then(Value::as_u64);
                if status == Some(500) {
                    self.inner.events.emit(ServerEvent::InvokeError {
                        error: Arc::new(err),
                        client: client.clone(),
                        invoke,
                    });
                }
                metrics::record_invoke_error(status.unwrap_or(0) as u16);
                client.send_frame(Frame::error(id, Some(converted)).encode());
            }
        }
    }

    /// Tear a client down: drop it from the clients map and the registry in
    /// one step, then emit its close signal.
    pub(crate) fn disconnect(&self, client: &Client, reason: &str, error: Option<String>) {
        let removed = {
            let mut state = self.inner.state.lock();
            state.registry.remove_client(client.id());
            state.clients.remove(client.id()).is_some()
        };
        client.set_ready_state(ReadyState::Closed);
        if removed {
            metrics::record_disconnect();
            debug!(client = client.id(), reason, "client disconnected");
            client.emit(crate::ClientEvent::Close {
                reason: reason.to_owned(),
                error,
            });
        }
    }
}

/// Builder for [`Server`] construction options.
#[derive(Clone)]
pub struct ServerBuilder {
    id_gen: IdGenerator,
    error_converter: ErrorConverter,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            id_gen: Arc::new(default_id),
            error_converter: Arc::new(default_error_converter),
        }
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder").finish_non_exhaustive()
    }
}

impl ServerBuilder {
    /// Override the conversion of handler failures into `Error` reply
    /// payloads.
    pub fn invoke_error_converter<F>(mut self, convert: F) -> Self
    where
        F: Fn(&HandlerError, &Client) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.error_converter = Arc::new(convert);
        self
    }

    /// Override the connection id generator.
    pub fn id_generator<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_gen = Arc::new(generate);
        self
    }

    /// Build the server.
    pub fn build(self) -> Server {
        Server {
            inner: Arc::new(ServerInner {
                state: Mutex::new(ServerState::default()),
                router: RwLock::new(Router::default()),
                events: EventBus::new(),
                id_gen: self.id_gen,
                error_converter: self.error_converter,
                tasks: TaskSet::default(),
            }),
        }
    }
}

/// Default id generator: 32 hex characters of randomness.
fn default_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Default conversion of handler failures into `Error` reply payloads.
///
/// Invoke errors with an explicit status pass through verbatim. Anything
/// else becomes a 500; outside production the message and the error chain
/// are preserved in the payload for debugging.
fn default_error_converter(err: &HandlerError, _client: &Client) -> Result<Value, BoxError> {
    match err {
        HandlerError::Invoke(invoke) => Ok(invoke.clone().into_error_body().into_value()),
        other => {
            let mut reply = ErrorBody::internal_error();
            if development_mode() {
                reply.message = other.to_string().into();
                reply.body = Some(Value::String(format!("{other:?}")));
            }
            Ok(reply.into_value())
        }
    }
}

/// Development mode is any environment where `PUBWIRE_ENV` is not set to
/// `production`.
fn development_mode() -> bool {
    env::var("PUBWIRE_ENV").map(|v| v != "production").unwrap_or(true)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{routes::Middleware, InvokeError, Next};
    use serde_json::json;

    #[test]
    fn default_converter_passes_invoke_errors_through() {
        let client = Client::detached("c");
        let err = HandlerError::from(InvokeError::new(527, "Custom Error"));
        let converted = default_error_converter(&err, &client).unwrap();
        assert_eq!(
            converted,
            json!({"status": 527, "message": "Custom Error"})
        );
    }

    #[test]
    fn default_converter_sanitizes_unexpected_errors_to_500() {
        let client = Client::detached("c");
        let err = HandlerError::other("boom");
        let converted = default_error_converter(&err, &client).unwrap();
        assert_eq!(converted["status"], json!(500));
    }

    #[test]
    fn default_ids_fit_the_wire_constraints() {
        let id = default_id();
        assert!(id.len() <= 32);
        assert!(id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-'));
        assert_ne!(default_id(), default_id());
    }

    #[test]
    fn registration_rejects_an_empty_chain() {
        let server = Server::new();
        let err = server
            .register_route("/x", Vec::<Arc<dyn Middleware>>::new())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::EmptyHandlerChain(_)));
    }

    #[test]
    fn registration_accepts_tuples_of_layers() {
        let server = Server::new();
        server
            .register_route(
                "/x",
                (
                    |ctx: InvokeContext, next: Next| next.run(ctx),
                    |_ctx: InvokeContext, _next: Next| async move { Ok(None) },
                ),
            )
            .unwrap();
    }
}

use crate::{Client, Server};
use serde_json::Value;
use std::collections::HashMap;

/// Context handed to each layer of a route's middleware chain.
///
/// Layers receive the context by value and hand a context, possibly a
/// modified one, to [`Next::run`]. Replacing fields is how a layer passes
/// information down the chain; there is no shared mutation.
///
/// [`Next::run`]: crate::Next::run
#[derive(Debug, Clone)]
pub struct InvokeContext {
    /// Handle to the server that dispatched the invocation.
    pub server: Server,
    /// The invoking client.
    pub client: Client,
    /// The route pattern that matched, not the concrete request path.
    pub path: String,
    /// Captured `:name` parameters.
    pub params: HashMap<String, String>,
    /// Captured `*` wildcard segments, in pattern order.
    pub splats: Vec<String>,
    /// The invoke payload, if any.
    pub body: Option<Value>,
}

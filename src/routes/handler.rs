use crate::{routes::InvokeContext, HandlerError};
use serde_json::Value;
use std::{fmt, future::Future, pin::Pin, sync::Arc};

/// Outcome of one middleware layer, and of a whole chain: an optional
/// result value for the `Result` reply, or a failure to be converted into
/// an `Error` reply.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

/// Boxed future resolving to a [`HandlerResult`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// One layer of a route's middleware chain.
///
/// Blanket-implemented for async functions and closures of the shape
/// `(InvokeContext, Next) -> HandlerResult`. A layer may:
///
/// - await [`Next::run`] and post-process its result,
/// - skip `next` entirely, ending the chain early with its own result,
/// - pass a modified [`InvokeContext`] forward.
///
/// Errors propagate outward unchanged; work already done by earlier layers
/// is not unwound.
pub trait Middleware: Send + Sync + 'static {
    /// Run this layer.
    fn call(&self, ctx: InvokeContext, next: Next) -> HandlerFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(InvokeContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: InvokeContext, next: Next) -> HandlerFuture {
        Box::pin(self(ctx, next))
    }
}

/// Continuation handed to each middleware layer.
///
/// [`Next::run`] executes the remaining layers. Past the last layer, the
/// terminal continuation resolves to `Ok(None)`.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("layers", &self.chain.len())
            .finish()
    }
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn Middleware>]>) -> Self {
        Self { chain, index: 0 }
    }

    /// Invoke the rest of the chain with the given context.
    pub async fn run(self, ctx: InvokeContext) -> HandlerResult {
        match self.chain.get(self.index) {
            Some(layer) => {
                let layer = Arc::clone(layer);
                let next = Self {
                    chain: self.chain,
                    index: self.index + 1,
                };
                layer.call(ctx, next).await
            }
            None => Ok(None),
        }
    }
}

/// Conversion into an ordered middleware chain.
///
/// Implemented for a single layer, for tuples of up to five layers (applied
/// left to right), and for `Vec<Arc<dyn Middleware>>` when the chain is
/// assembled dynamically.
pub trait MiddlewareStack {
    /// Produce the ordered chain.
    fn into_stack(self) -> Vec<Arc<dyn Middleware>>;
}

impl<M: Middleware> MiddlewareStack for M {
    fn into_stack(self) -> Vec<Arc<dyn Middleware>> {
        vec![Arc::new(self)]
    }
}

impl MiddlewareStack for Vec<Arc<dyn Middleware>> {
    fn into_stack(self) -> Vec<Arc<dyn Middleware>> {
        self
    }
}

macro_rules! impl_middleware_stack {
    ($($layer:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($layer: Middleware),+> MiddlewareStack for ($($layer,)+) {
            fn into_stack(self) -> Vec<Arc<dyn Middleware>> {
                let ($($layer,)+) = self;
                vec![$(Arc::new($layer) as Arc<dyn Middleware>),+]
            }
        }
    };
}

impl_middleware_stack!(M1, M2);
impl_middleware_stack!(M1, M2, M3);
impl_middleware_stack!(M1, M2, M3, M4);
impl_middleware_stack!(M1, M2, M3, M4, M5);

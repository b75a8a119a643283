mod ctx;
pub use ctx::InvokeContext;

mod handler;
pub use handler::{HandlerFuture, HandlerResult, Middleware, MiddlewareStack, Next};

mod pattern;
pub(crate) use pattern::{PathMatch, PathPattern};

use crate::HandlerError;
use serde_json::Value;
use std::{fmt, future::Future, sync::Arc};
use tower::{util::BoxCloneSyncService, ServiceExt};

/// A composed middleware chain for one route pattern.
///
/// A route is a [`BoxCloneSyncService`] from [`InvokeContext`] to the
/// chain's optional result value. Chain failures surface as the service
/// error and are converted into `Error` replies by the dispatcher.
pub(crate) struct Route(BoxCloneSyncService<InvokeContext, Option<Value>, HandlerError>);

impl Route {
    /// Compose an ordered middleware chain into a single route service.
    pub(crate) fn new(chain: Vec<Arc<dyn Middleware>>) -> Self {
        let chain: Arc<[Arc<dyn Middleware>]> = chain.into();
        Self(BoxCloneSyncService::new(tower::service_fn(
            move |ctx: InvokeContext| Next::new(Arc::clone(&chain)).run(ctx),
        )))
    }

    /// One-shot future for a single invocation.
    pub(crate) fn oneshot(
        &self,
        ctx: InvokeContext,
    ) -> impl Future<Output = Result<Option<Value>, HandlerError>> {
        self.0.clone().oneshot(ctx)
    }
}

impl Clone for Route {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").finish_non_exhaustive()
    }
}

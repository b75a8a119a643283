use pubwire::{InvokeContext, InvokeError, Next, Server};
use serde_json::json;

mod ws_client;
pub use ws_client::connect;

/// Instantiate a server with the routes used across the scenario tests.
pub fn test_server() -> Server {
    let server = Server::new();

    server
        .register_route("/hello", |_ctx: InvokeContext, _next: Next| async move {
            Ok(Some(json!("hi")))
        })
        .unwrap();

    server
        .register_route(
            "/hello/:who/*",
            |ctx: InvokeContext, _next: Next| async move {
                Ok(Some(json!({
                    "pattern": ctx.path,
                    "who": ctx.params["who"],
                    "splats": ctx.splats,
                })))
            },
        )
        .unwrap();

    server
        .register_route(
            "/fail/custom",
            |_ctx: InvokeContext, _next: Next| async move {
                Err(InvokeError::new(527, "Custom Error").into())
            },
        )
        .unwrap();

    server
        .register_route(
            "/fail/generic",
            |_ctx: InvokeContext, _next: Next| async move {
                Err(pubwire::HandlerError::other("handler exploded"))
            },
        )
        .unwrap();

    server
        .register_route(
            "/chain",
            (
                |mut ctx: InvokeContext, next: Next| {
                    ctx.body = Some(json!({"stamped": true, "body": ctx.body}));
                    next.run(ctx)
                },
                |ctx: InvokeContext, _next: Next| async move { Ok(ctx.body) },
            ),
        )
        .unwrap();

    server
}

use metrics::{counter, gauge};
use std::sync::LazyLock;

/// Metric name for counting accepted connections.
pub(crate) const CONNECTIONS: &str = "pubwire.server.connections";
const CONNECTIONS_HELP: &str = "Number of client connections accepted.";

/// Metric name for tracking live connections.
pub(crate) const ACTIVE_CONNECTIONS: &str = "pubwire.server.active_connections";
const ACTIVE_CONNECTIONS_HELP: &str = "Number of currently connected clients.";

/// Metric name for counting inbound parser errors.
pub(crate) const PARSER_ERRORS: &str = "pubwire.server.parser_errors";
const PARSER_ERRORS_HELP: &str =
    "Number of inbound frames that failed decoding. Each closes its connection.";

/// Metric name for counting dispatched invokes.
pub(crate) const INVOKES: &str = "pubwire.server.invokes";
const INVOKES_HELP: &str = "Number of invoke frames dispatched.";

/// Metric name for counting error replies.
pub(crate) const INVOKE_ERRORS: &str = "pubwire.server.invoke_errors";
const INVOKE_ERRORS_HELP: &str =
    "Number of invokes answered with an error reply, labelled by status.";

/// Metric name for counting publish calls.
pub(crate) const PUBLISHES: &str = "pubwire.server.publishes";
const PUBLISHES_HELP: &str = "Number of publish calls with at least one subscriber.";

/// Metric name for counting fanned-out publish frames.
pub(crate) const PUBLISH_DELIVERIES: &str = "pubwire.server.publish_deliveries";
const PUBLISH_DELIVERIES_HELP: &str = "Number of publish frames queued to subscribers.";

static DESCRIBE: LazyLock<()> = LazyLock::new(|| {
    metrics::describe_counter!(CONNECTIONS, metrics::Unit::Count, CONNECTIONS_HELP);
    metrics::describe_gauge!(
        ACTIVE_CONNECTIONS,
        metrics::Unit::Count,
        ACTIVE_CONNECTIONS_HELP
    );
    metrics::describe_counter!(PARSER_ERRORS, metrics::Unit::Count, PARSER_ERRORS_HELP);
    metrics::describe_counter!(INVOKES, metrics::Unit::Count, INVOKES_HELP);
    metrics::describe_counter!(INVOKE_ERRORS, metrics::Unit::Count, INVOKE_ERRORS_HELP);
    metrics::describe_counter!(PUBLISHES, metrics::Unit::Count, PUBLISHES_HELP);
    metrics::describe_counter!(
        PUBLISH_DELIVERIES,
        metrics::Unit::Count,
        PUBLISH_DELIVERIES_HELP
    );
});

/// Record an accepted connection.
pub(crate) fn record_connection() {
    let _ = &DESCRIBE;
    counter!(CONNECTIONS).increment(1);
    gauge!(ACTIVE_CONNECTIONS).increment(1);
}

/// Record a disconnected client.
pub(crate) fn record_disconnect() {
    let _ = &DESCRIBE;
    gauge!(ACTIVE_CONNECTIONS).decrement(1);
}

/// Record an inbound frame that failed decoding.
pub(crate) fn record_parser_error() {
    let _ = &DESCRIBE;
    counter!(PARSER_ERRORS).increment(1);
}

/// Record a dispatched invoke.
pub(crate) fn record_invoke() {
    let _ = &DESCRIBE;
    counter!(INVOKES).increment(1);
}

/// Record an error reply with the status it carried.
pub(crate) fn record_invoke_error(status: u16) {
    let _ = &DESCRIBE;
    counter!(INVOKE_ERRORS, "status" => status.to_string()).increment(1);
}

/// Record one publish fan-out of `deliveries` frames.
pub(crate) fn record_publish(deliveries: usize) {
    let _ = &DESCRIBE;
    counter!(PUBLISHES).increment(1);
    counter!(PUBLISH_DELIVERIES).increment(deliveries as u64);
}

//! Metrics/tracing hooks.
//!
//! Key/value pairs go out as debug events under a `featcraft` span; the
//! binary decides where they land via its subscriber.

pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::debug_span!("featcraft", event);
    let _entered = span.enter();
    for (k, v) in key_values {
        tracing::debug!(%event, key = %k, value = %v, "metric");
    }
}

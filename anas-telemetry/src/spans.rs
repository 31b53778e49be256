//! Span helpers for live call operations
//!
//! Provides pre-configured spans for instrumenting calls, transport
//! handshakes and teardown.

use tracing::Span;

/// Create a span covering one live call.
///
/// # Arguments
/// * `session_id` - Unique ID of the call session
/// * `voice` - Voice profile chosen at connect time
///
/// # Example
/// ```
/// use anas_telemetry::call_span;
/// let span = call_span("3f1c", "Kore");
/// let _enter = span.enter();
/// ```
pub fn call_span(session_id: &str, voice: &str) -> Span {
    tracing::info_span!("call", session.id = session_id, call.voice = voice)
}

/// Create a span for the transport handshake.
///
/// # Example
/// ```
/// use anas_telemetry::transport_connect_span;
/// let span = transport_connect_span("gemini", "models/gemini-live");
/// let _enter = span.enter();
/// ```
pub fn transport_connect_span(provider: &str, model: &str) -> Span {
    tracing::info_span!("transport.connect", transport.provider = provider, model.name = model)
}

/// Create a span for call teardown.
pub fn teardown_span(reason: &str) -> Span {
    tracing::debug_span!("call.teardown", teardown.reason = reason)
}

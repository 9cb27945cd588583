pub mod request_id;

pub use request_id::{RIDLayer, RequestId};

/// callbacks for [`tower_http::trace::TraceLayer`]. every request gets a span
/// tagged with its id, the response status is filled in once known
pub mod trace {
    use std::time::Duration;

    use axum::http::{Request, Response};
    use tower_http::classify::ServerErrorsFailureClass;
    use tracing::Span;

    use super::RequestId;

    pub fn make_span_with<B>(request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            id = RequestId::of(request),
            method = %request.method(),
            uri = %request.uri(),
            status = tracing::field::Empty
        )
    }

    pub fn on_request<B>(_request: &Request<B>, _span: &Span) {}

    pub fn on_response<B>(response: &Response<B>, latency: Duration, span: &Span) {
        span.record("status", response.status().as_u16());

        tracing::info!(?latency, "finished");
    }

    pub fn on_failure(error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
        tracing::error!(?latency, "failed: {error}");
    }
}

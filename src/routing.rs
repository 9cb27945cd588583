use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::net::layer::{self, RIDLayer};
use crate::state::ArcShared;
use crate::webdav;

mod api;

pub fn routes(state: &ArcShared) -> Router {
    Router::new()
        .nest("/api", api::routes())
        // everything outside of /api belongs to the webdav mount
        .fallback(webdav::handle)
        .layer(ServiceBuilder::new()
            .layer(RIDLayer::new())
            .layer(TraceLayer::new_for_http()
                .make_span_with(layer::trace::make_span_with)
                .on_request(layer::trace::on_request)
                .on_response(layer::trace::on_response)
                .on_failure(layer::trace::on_failure)))
        .with_state(state.clone())
}

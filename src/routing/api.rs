use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post, put, delete};

use crate::net::error::{self, GeneralKind};
use crate::state::ArcShared;

mod fs;
mod trash;
mod storage;

async fn ping() -> (StatusCode, &'static str) {
    (StatusCode::OK, "pong")
}

async fn not_found() -> error::Error {
    error::Error::api(GeneralKind::NotFound)
}

pub fn routes() -> Router<ArcShared> {
    Router::new()
        .route(
            "/files",
            get(fs::list)
        )
        .route(
            "/files/upload",
            post(fs::upload)
        )
        .route(
            "/files/folder",
            post(fs::create_folder)
        )
        .route(
            "/files/search",
            get(fs::search)
        )
        .route(
            "/files/:id",
            get(fs::get)
                .delete(trash::purge)
        )
        .route(
            "/files/:id/contents",
            get(fs::contents)
        )
        .route(
            "/files/:id/download",
            get(fs::download)
        )
        .route(
            "/files/:id/versions",
            get(fs::versions)
        )
        .route(
            "/files/:id/rename",
            put(fs::rename)
        )
        .route(
            "/files/:id/move",
            put(fs::move_to)
        )
        .route(
            "/files/:id/copy",
            post(fs::copy)
        )
        .route(
            "/files/:id/trash",
            delete(trash::trash)
        )
        .route(
            "/files/:id/restore",
            post(trash::restore)
        )
        .route(
            "/trash",
            get(trash::list)
                .delete(trash::empty)
        )
        .route(
            "/storage/stats",
            get(storage::stats)
        )
        .route("/ping", get(ping))
        .fallback(not_found)
}

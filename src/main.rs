use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use tracing_subscriber::{FmtSubscriber, EnvFilter};
use futures::StreamExt;
use futures::stream::FuturesUnordered;

mod error;
mod path;
mod sql;
mod net;
mod config;
mod store;
mod blob;
mod quota;
mod fs;
mod activity;
mod sec;
mod state;
mod routing;
mod webdav;

fn main() {
    use tokio::runtime::Builder;

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .expect("failed to initialize global tracing subscriber");

    let rt = match Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .max_blocking_threads(4)
        .build() {
        Ok(rt) => rt,
        Err(err) => {
            panic!("failed to start tokio runtime. {}", err);
        }
    };

    tracing::event!(
        tracing::Level::INFO,
        "started tokio runtime"
    );

    if let Err(err) = rt.block_on(init()) {
        tracing::error!("{err}");
    }
}

async fn init() -> error::Result<()> {
    let config = config::get_config()?;
    let state = Arc::new(state::Shared::from_config(&config)?);

    tracing::info!(
        data = %state.namespace().blobs().root().display(),
        webdav = state.webdav_prefix(),
        "storage ready"
    );

    let router = routing::routes(&state);
    let mut servers = FuturesUnordered::new();

    for (key, listener) in config.settings.listeners {
        servers.push(tokio::spawn(serve(key, listener.addr, router.clone())));
    }

    while servers.next().await.is_some() {}

    Ok(())
}

/// runs a single listener until it fails. a listener that cannot bind is
/// logged and skipped so the others keep serving
async fn serve(key: String, addr: SocketAddr, router: Router) {
    let tcp = match std::net::TcpListener::bind(addr) {
        Ok(tcp) => tcp,
        Err(err) => {
            tracing::error!(listener = %key, "failed to bind {addr}: {err}");

            return;
        }
    };

    if let Ok(local) = tcp.local_addr() {
        tracing::info!(listener = %key, "accepting connections on {local}");
    }

    if let Err(err) = axum_server::from_tcp(tcp)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!(listener = %key, "server stopped: {err}");
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use axum::http::Request;
use tower::{Layer, Service};

/// sequence number handed to every request for log correlation. numbering
/// starts at 1 so 0 can stand in for requests that never passed the layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(u64);

impl RequestId {
    pub fn of<B>(req: &Request<B>) -> u64 {
        req.extensions()
            .get::<RequestId>()
            .map(|rid| rid.0)
            .unwrap_or(0)
    }
}

/// stamps a [`RequestId`] onto every request it forwards
#[derive(Debug, Clone)]
pub struct RIDService<S> {
    inner: S,
    next: Arc<AtomicU64>,
}

impl<S, B> Service<Request<B>> for RIDService<S>
where
    S: Service<Request<B>>
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let rid = RequestId(self.next.fetch_add(1, Ordering::Relaxed));

        request.extensions_mut().insert(rid);

        self.inner.call(request)
    }
}

/// every service produced by one layer shares the same sequence
#[derive(Debug, Clone)]
pub struct RIDLayer {
    next: Arc<AtomicU64>,
}

impl RIDLayer {
    pub fn new() -> Self {
        RIDLayer {
            next: Arc::new(AtomicU64::new(1))
        }
    }
}

impl<S> Layer<S> for RIDLayer {
    type Service = RIDService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RIDService {
            inner,
            next: Arc::clone(&self.next),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::convert::Infallible;
    use tower::ServiceExt;

    #[tokio::test]
    async fn ids_increase_per_request() {
        let svc = RIDLayer::new().layer(tower::service_fn(|req: Request<()>| async move {
            Ok::<_, Infallible>(RequestId::of(&req))
        }));

        let first = svc.clone().oneshot(Request::new(())).await.unwrap();
        let second = svc.oneshot(Request::new(())).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(RequestId::of(&Request::new(())), 0);
    }
}

//! Tower integration: run every request to an inner service under a [`Retryer`].
//!
//! Each attempt clones the inner service and the request, waits for the clone to become ready
//! and calls it. The inner service's error is converted into the retryer's `E`, so the
//! retryer's rejection conditions see it like any other operation error.
//!
//! ```rust
//! use retrying::{Retryer, RetryError};
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("unavailable")]
//! struct Unavailable;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let retryer = Retryer::<String, Unavailable>::builder().retry_if_failure().build().unwrap();
//! let svc = ServiceBuilder::new()
//!     .layer(retryer.into_layer())
//!     .service(service_fn(|name: &'static str| async move {
//!         Ok::<_, Unavailable>(format!("hello {name}"))
//!     }));
//! assert_eq!(svc.oneshot("bob").await.unwrap(), "hello bob");
//! # });
//! ```

use crate::error::RetryError;
use crate::retry::Retryer;
use crate::time_limit::{AttemptTimeLimiter, NoTimeLimit};
use futures::future::{self, BoxFuture};
use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Tower-native retry layer.
pub struct RetryLayer<V, E, L = NoTimeLimit> {
    retryer: Retryer<V, E, L>,
}

impl<V, E, L> RetryLayer<V, E, L> {
    pub fn new(retryer: Retryer<V, E, L>) -> Self {
        Self { retryer }
    }
}

impl<V, E, L> Clone for RetryLayer<V, E, L> {
    fn clone(&self) -> Self {
        Self { retryer: self.retryer.clone() }
    }
}

impl<V, E, L: fmt::Debug> fmt::Debug for RetryLayer<V, E, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryLayer").field("retryer", &self.retryer).finish()
    }
}

impl<V, E, L> Retryer<V, E, L> {
    /// Turn this retryer into a tower layer.
    pub fn into_layer(self) -> RetryLayer<V, E, L> {
        RetryLayer::new(self)
    }
}

/// Retry service produced by `RetryLayer`.
pub struct RetryService<S, V, E, L = NoTimeLimit> {
    inner: S,
    retryer: Retryer<V, E, L>,
    _outcome: PhantomData<fn() -> (V, E)>,
}

impl<S: Clone, V, E, L> Clone for RetryService<S, V, E, L> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), retryer: self.retryer.clone(), _outcome: PhantomData }
    }
}

impl<S: fmt::Debug, V, E, L: fmt::Debug> fmt::Debug for RetryService<S, V, E, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryService")
            .field("inner", &self.inner)
            .field("retryer", &self.retryer)
            .finish()
    }
}

impl<S, V, E, L, Request> Service<Request> for RetryService<S, V, E, L>
where
    Request: Clone + Send + 'static,
    S: Service<Request, Response = V> + Clone + Send + 'static,
    S::Error: Into<E>,
    S::Future: Send + 'static,
    V: Send + 'static,
    E: StdError + Send + Sync + 'static,
    L: AttemptTimeLimiter<'static, V, E> + 'static,
{
    type Response = V;
    type Error = RetryError<V, E>;
    type Future = BoxFuture<'static, Result<V, RetryError<V, E>>>;

    /// Always ready: every attempt readies its own clone of the inner service.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let retryer = self.retryer.clone();
        let inner = self.inner.clone();
        Box::pin(async move {
            retryer
                .call(move || {
                    let mut svc = inner.clone();
                    let req = req.clone();
                    async move {
                        // S::Error need not be Send; convert it before the next await
                        let ready: Result<(), E> =
                            future::poll_fn(|cx| svc.poll_ready(cx)).await.map_err(Into::into);
                        if let Err(e) = ready {
                            return Err(e);
                        }
                        svc.call(req).await.map_err(Into::<E>::into)
                    }
                })
                .await
        })
    }
}

impl<S, V, E, L> Layer<S> for RetryLayer<V, E, L> {
    type Service = RetryService<S, V, E, L>;

    fn layer(&self, service: S) -> Self::Service {
        RetryService { inner: service, retryer: self.retryer.clone(), _outcome: PhantomData }
    }
}

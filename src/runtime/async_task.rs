//! Task and stream handles for remote operations and shard execution.
//!
//! Every GitHub call and every shard runs on its own tokio task and reports
//! back over a channel. A task that panics drops its sender, so the awaiting
//! side observes a receive error instead of tearing down the whole run.

use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// Pinned, sendable future producing a batch of items.
type BatchFuture<T, E> = Pin<Box<dyn Future<Output = Result<Vec<T>, E>> + Send>>;

/// Deferred constructor for a [`BatchFuture`].
type BatchFactory<T, E> = Box<dyn FnOnce() -> BatchFuture<T, E> + Send>;

// ============================================================================
// AsyncTask - one result
// ============================================================================

/// Handle to a spawned unit of work producing a single value.
///
/// Awaiting yields `Err(RecvError)` when the task died before sending.
pub struct AsyncTask<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> AsyncTask<T>
where
    T: Send + 'static,
{
    #[inline]
    #[must_use]
    pub fn new(rx: oneshot::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Run blocking work (git clones, filesystem walks) on the blocking pool.
    #[inline]
    pub fn spawn<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let _ = tx.send(f());
        });
        Self::new(rx)
    }

    /// Run an async operation on the runtime.
    #[inline]
    pub fn spawn_async<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn(async move {
            let _ = tx.send(future.await);
        });
        Self::new(rx)
    }
}

impl<T> Future for AsyncTask<T> {
    type Output = Result<T, oneshot::error::RecvError>;

    #[inline]
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx)
    }
}

// ============================================================================
// AsyncStream - many results
// ============================================================================

/// Handle to a spawned producer of many values, e.g. one page walk.
pub struct AsyncStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> AsyncStream<T> {
    #[inline]
    #[must_use]
    pub fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx }
    }

    /// Stream a prepared vector. Mostly useful for fakes in tests.
    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self
    where
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::task::spawn(async move {
            for item in items {
                if tx.send(item).is_err() {
                    break;
                }
            }
        });
        Self::new(rx)
    }
}

impl<T, E> AsyncStream<Result<T, E>> {
    /// Drain the stream, stopping at the first error.
    pub async fn try_collect_all(mut self) -> Result<Vec<T>, E> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T> Stream for AsyncStream<T> {
    type Item = T;

    #[inline]
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// EmitterBuilder - paginated batch to stream
// ============================================================================

/// Turns a paginated listing (fetched as one batch) into an [`AsyncStream`].
pub struct EmitterBuilder<T, E> {
    factory: BatchFactory<T, E>,
}

impl<T, E> EmitterBuilder<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    #[must_use]
    pub fn new(factory: BatchFactory<T, E>) -> Self {
        Self { factory }
    }

    /// Spawn the batch and forward its items.
    ///
    /// `keep` drops items the caller is not interested in before they are
    /// sent; a failed batch is reported once through `on_error` and then
    /// forwarded as the only stream item.
    pub fn emit<F, G>(self, keep: F, on_error: G) -> AsyncStream<Result<T, E>>
    where
        F: Fn(&T) -> bool + Send + 'static,
        G: Fn(&E) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            match (self.factory)().await {
                Ok(items) => {
                    for item in items.into_iter().filter(|item| keep(item)) {
                        if tx.send(Ok(item)).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    on_error(&e);
                    let _ = tx.send(Err(e));
                }
            }
        });

        AsyncStream::new(rx)
    }
}

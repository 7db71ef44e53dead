//! Cancellable operation handles
//!
//! Every long-running operation returns a [`Progress`]. The operation runs
//! on its own task; awaiting the handle yields its single result. Calling
//! [`Progress::cancel`] drops the in-flight future (which aborts any
//! outstanding HTTP request) and makes the handle resolve to
//! [`SyncError::Cancelled`], even if the operation had already finished.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::errors::SyncError;

/// Handle to a running operation
///
/// Resolves exactly once, to the operation's result or to
/// [`SyncError::Cancelled`].
#[derive(Debug)]
pub struct Progress<T> {
    cancel_token: CancellationToken,
    handle: JoinHandle<Result<T, SyncError>>,
    completed: Arc<AtomicBool>,
}

impl<T: Send + 'static> Progress<T> {
    /// Spawns `operation` on the current Tokio runtime
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<F>(operation: F) -> Self
    where
        F: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let completed = Arc::new(AtomicBool::new(false));

        let token = cancel_token.clone();
        let flag = Arc::clone(&completed);
        let handle = tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Operation cancelled before completion");
                    Err(SyncError::Cancelled)
                }
                result = operation => result,
            };
            flag.store(true, Ordering::Release);
            result
        });

        Self {
            cancel_token,
            handle,
            completed,
        }
    }
}

impl<T> Progress<T> {
    /// Requests cancellation; calling it more than once has no further effect
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Returns true once the operation has produced a result
    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

impl<T> Future for Progress<T> {
    type Output = Result<T, SyncError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let joined = match Pin::new(&mut this.handle).poll(cx) {
            Poll::Ready(joined) => joined,
            Poll::Pending => return Poll::Pending,
        };

        if this.cancel_token.is_cancelled() {
            return Poll::Ready(Err(SyncError::Cancelled));
        }

        match joined {
            Ok(result) => Poll::Ready(result),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Poll::Ready(Err(SyncError::Cancelled)),
        }
    }
}

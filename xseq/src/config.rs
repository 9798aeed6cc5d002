//! Scheduling configuration carried by configured sequences.

use std::future::Future;
use std::pin::pin;

use futures::future::poll_fn;
use log::{trace, warn};
use tokio::runtime::Handle;

use crate::error::Result;

/// Where the producer side of an enumeration runs.
#[derive(Debug, Clone, Default)]
pub enum ContinuationContext {
    /// The producer is polled inline on the consumer's task.
    #[default]
    Synchronous,

    /// The producer runs as a task on the ambient tokio runtime.
    Background,

    /// The producer runs as a task on the given runtime.
    Explicit(Handle),
}

/// Continuation options forwarded to every await of a configured sequence.
#[derive(Debug, Clone, Default)]
pub struct ContinuationOptions {
    pub context: ContinuationContext,

    /// Re-schedule the continuation even when the awaited operation completed
    /// without suspending.
    pub force_async: bool,
}

impl ContinuationOptions {
    pub fn new() -> Self {
        Self {
            context: ContinuationContext::Synchronous,
            force_async: false,
        }
    }

    pub fn with_context(mut self, context: ContinuationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_force_async(mut self, force_async: bool) -> Self {
        self.force_async = force_async;
        self
    }

    /// Runtime the producer should be spawned on, or `None` to poll it inline.
    pub(crate) fn spawn_handle(&self) -> Option<Handle> {
        match &self.context {
            ContinuationContext::Synchronous => None,
            ContinuationContext::Background => match Handle::try_current() {
                Ok(handle) => Some(handle),
                Err(_) => {
                    warn!("no tokio runtime for background producer; running inline");
                    None
                }
            },
            ContinuationContext::Explicit(handle) => Some(handle.clone()),
        }
    }

    /// Awaits `fut` on the configured context.
    ///
    /// `Background` and `Explicit` run `fut` as a task on their runtime and
    /// await its completion; a panic inside it surfaces as
    /// [`Error::Panicked`](crate::Error::Panicked). `Synchronous` polls it in
    /// place, honouring `force_async`.
    pub async fn run<F, R>(&self, fut: F) -> Result<R>
    where
        F: Future<Output = Result<R>> + Send + 'static,
        R: Send + 'static,
    {
        match self.spawn_handle() {
            Some(handle) => {
                trace!("running continuation on configured runtime");
                handle.spawn(fut).await?
            }
            None => self.resume(fut).await,
        }
    }

    /// Awaits a future that borrows the caller, then applies `force_async`.
    ///
    /// With `force_async` set, a future that was ready on its first poll still
    /// yields back to the scheduler before the caller continues.
    pub async fn resume<F: Future>(&self, fut: F) -> F::Output {
        let mut fut = pin!(fut);
        let mut suspended = false;
        let output = poll_fn(|cx| {
            let poll = fut.as_mut().poll(cx);
            if poll.is_pending() {
                suspended = true;
            }
            poll
        })
        .await;

        if self.force_async && !suspended {
            tokio::task::yield_now().await;
        }
        output
    }
}

impl From<ContinuationContext> for ContinuationOptions {
    fn from(context: ContinuationContext) -> Self {
        Self::new().with_context(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synchronous_never_spawns() {
        let options = ContinuationOptions::default();
        assert!(options.spawn_handle().is_none());
        assert!(!options.force_async);
    }

    #[test]
    fn test_background_without_runtime_runs_inline() {
        let options = ContinuationOptions::from(ContinuationContext::Background);
        assert!(options.spawn_handle().is_none());
    }

    #[tokio::test]
    async fn test_background_uses_ambient_runtime() {
        let options = ContinuationOptions::new().with_context(ContinuationContext::Background);
        assert!(options.spawn_handle().is_some());
    }

    #[tokio::test]
    async fn test_resume_returns_output() {
        let options = ContinuationOptions::new().with_force_async(true);
        assert_eq!(options.resume(async { 7 }).await, 7);
    }

    #[tokio::test]
    async fn test_synchronous_run_stays_on_caller() {
        let caller = std::thread::current().id();
        let ran_on = ContinuationOptions::new()
            .run(async move { Ok(std::thread::current().id()) })
            .await
            .unwrap();
        assert_eq!(ran_on, caller);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_explicit_run_uses_runtime_threads() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("xseq-explicit")
            .enable_all()
            .build()
            .unwrap();
        let options = ContinuationOptions::from(ContinuationContext::Explicit(runtime.handle().clone()));
        let name = options
            .run(async { Ok(std::thread::current().name().map(str::to_owned)) })
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("xseq-explicit"));
        runtime.shutdown_background();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_continuation_is_reported() {
        let options = ContinuationOptions::from(ContinuationContext::Background);
        let err = options
            .run(async {
                if true {
                    panic!("selector blew up");
                }
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Panicked);
        assert!(err.to_string().contains("selector blew up"));
    }
}

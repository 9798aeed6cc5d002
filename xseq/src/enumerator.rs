//! Consumer-side handle of an enumeration.
//!
//! An [`AsyncEnumerator`] owns the rendezvous channel and the lifetime of
//! the producer coroutine. With synchronous continuations the producer
//! future is polled inline from [`AsyncEnumerator::move_next`], so it only
//! ever runs while the consumer is waiting; with a background context it is
//! spawned as a tokio task and coordinated purely through the channel.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};
use log::{debug, trace, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cancel::EnumerationToken;
use crate::channel::{AsyncStreamWriter, ChannelState, RendezvousChannel};
use crate::config::ContinuationOptions;
use crate::enumerable::Generator;
use crate::error::{panic_message, Error, Result};

enum Producer<T> {
    NotStarted(Generator<T>),
    Inline(BoxFuture<'static, Result<()>>),
    Spawned(JoinHandle<()>),
    Finished,
}

/// Marks the channel canceled if a spawned producer is dropped before it
/// reports back, as happens when its runtime shuts down.
struct FinishGuard<T> {
    channel: Arc<RendezvousChannel<T>>,
    armed: bool,
}

impl<T> FinishGuard<T> {
    fn finish(mut self, result: Result<()>) {
        self.armed = false;
        self.channel.finish(result);
    }
}

impl<T> Drop for FinishGuard<T> {
    fn drop(&mut self) {
        if self.armed {
            warn!("spawned producer dropped before completing");
            self.channel.finish(Err(Error::Canceled));
        }
    }
}

/// Pull-style cursor over an async-enumerable sequence.
///
/// Not safe for concurrent use: `move_next` takes `&mut self`. Every exit
/// path should end in [`dispose`](Self::dispose); dropping the enumerator
/// without it still cancels the producer, but cannot wait for its cleanup.
pub struct AsyncEnumerator<T> {
    channel: Arc<RendezvousChannel<T>>,
    producer: Producer<T>,
    token: EnumerationToken,
    spawn_on: Option<Handle>,
    options: ContinuationOptions,
    current: Option<T>,
    disposed: bool,
}

impl<T: Send + 'static> AsyncEnumerator<T> {
    pub(crate) fn new(
        generator: Generator<T>,
        token: &CancellationToken,
        linked: Option<CancellationToken>,
        options: ContinuationOptions,
    ) -> Self {
        Self {
            channel: Arc::new(RendezvousChannel::new()),
            producer: Producer::NotStarted(generator),
            token: EnumerationToken::new(token, linked),
            spawn_on: options.spawn_handle(),
            options,
            current: None,
            disposed: false,
        }
    }

    /// Advances to the next element.
    ///
    /// Resolves to `Ok(true)` when [`current`](Self::current) holds a new
    /// element and `Ok(false)` once the sequence is exhausted. A canceled
    /// enumeration fails with [`Error::Canceled`]; a faulted one repeats the
    /// producer's error on every call.
    pub fn move_next(&mut self) -> MoveNext<'_, T> {
        MoveNext {
            enumerator: self,
            requested: false,
            cancelled: None,
        }
    }

    /// Element produced by the last successful `move_next`.
    pub fn current(&self) -> Result<&T> {
        self.current
            .as_ref()
            .ok_or(Error::InvalidOperation("no current element"))
    }

    /// Moves the current element out of the enumerator.
    pub fn take_current(&mut self) -> Result<T> {
        self.current
            .take()
            .ok_or(Error::InvalidOperation("no current element"))
    }

    /// Returns the current channel state.
    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn continuation_options(&self) -> &ContinuationOptions {
        &self.options
    }

    /// Tears the enumeration down and waits for the producer to unwind.
    ///
    /// A producer suspended at a yield is resumed with [`Error::Canceled`] so
    /// its cleanup runs. An error raised by that cleanup is returned once;
    /// later calls are no-ops.
    pub async fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.current = None;
        self.token.cancel();
        self.channel.cancel();

        match std::mem::replace(&mut self.producer, Producer::Finished) {
            Producer::NotStarted(_) | Producer::Finished => {}
            Producer::Inline(fut) => {
                debug!("dispose: unwinding inline producer");
                let result = fut.await;
                self.channel.finish(result);
            }
            Producer::Spawned(handle) => {
                debug!("dispose: waiting for spawned producer");
                if let Err(err) = handle.await {
                    warn!("producer task did not complete: {}", err);
                }
            }
        }

        match self.channel.take_cleanup_error() {
            Some(err) => {
                warn!("producer cleanup failed during dispose: {}", err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn start(&mut self) {
        let generator = match std::mem::replace(&mut self.producer, Producer::Finished) {
            Producer::NotStarted(generator) => generator,
            other => {
                self.producer = other;
                return;
            }
        };

        let token = self.token.producer_token();
        let writer = AsyncStreamWriter::new(self.channel.clone(), token.clone());
        let fut = (*generator)(writer, token);

        self.producer = match &self.spawn_on {
            None => {
                debug!("starting producer inline");
                Producer::Inline(fut)
            }
            Some(handle) => {
                debug!("spawning producer");
                let guard = FinishGuard {
                    channel: self.channel.clone(),
                    armed: true,
                };
                Producer::Spawned(handle.spawn(async move {
                    let result = match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(result) => result,
                        Err(payload) => Err(Error::Panicked(panic_message(payload.as_ref()))),
                    };
                    guard.finish(result);
                }))
            }
        };
    }

    fn settle(&mut self, taken: Result<Option<T>>) -> Result<bool> {
        match taken {
            Ok(Some(value)) => {
                self.current = Some(value);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn poll_move_next(
        &mut self,
        requested: &mut bool,
        cancelled: &mut Option<BoxFuture<'static, ()>>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<bool>> {
        if self.disposed {
            return Poll::Ready(Err(Error::InvalidOperation(
                "move_next called on a disposed enumerator",
            )));
        }

        if !*requested {
            *requested = true;
            self.current = None;
            if self.token.is_cancelled() {
                self.channel.cancel();
            } else if self.channel.begin_next() {
                self.start();
            }
        }

        loop {
            if let Some(taken) = self.channel.poll_take(cx.waker()) {
                return Poll::Ready(self.settle(taken));
            }

            // Inline producers run on this task until they yield or finish.
            let step = match &mut self.producer {
                Producer::Inline(fut) => Some(fut.as_mut().poll(cx)),
                _ => None,
            };
            match step {
                Some(Poll::Ready(result)) => {
                    trace!("inline producer finished");
                    self.producer = Producer::Finished;
                    self.channel.finish(result);
                    continue;
                }
                Some(Poll::Pending) => {
                    if let Some(taken) = self.channel.poll_take(cx.waker()) {
                        return Poll::Ready(self.settle(taken));
                    }
                }
                None => {}
            }

            let wait = cancelled.get_or_insert_with(|| self.token.cancelled());
            if wait.as_mut().poll(cx).is_ready() {
                debug!("enumeration canceled while waiting for the producer");
                self.channel.cancel();
                continue;
            }
            return Poll::Pending;
        }
    }
}

impl<T> Drop for AsyncEnumerator<T> {
    fn drop(&mut self) {
        if !self.disposed {
            self.token.cancel();
            self.channel.cancel();
        }
    }
}

/// Future returned by [`AsyncEnumerator::move_next`].
///
/// Dropping it before it resolves is allowed; the next `move_next` picks up
/// the same pending request.
#[must_use = "futures do nothing unless polled"]
pub struct MoveNext<'a, T> {
    enumerator: &'a mut AsyncEnumerator<T>,
    requested: bool,
    cancelled: Option<BoxFuture<'static, ()>>,
}

impl<T: Send + 'static> Future for MoveNext<'_, T> {
    type Output = Result<bool>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.enumerator
            .poll_move_next(&mut this.requested, &mut this.cancelled, cx)
    }
}

//! Producer-side handle of the rendezvous channel.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use super::RendezvousChannel;

/// Handle a generator uses to emit values.
///
/// Exactly one writer exists per enumeration. Its methods take `&mut self`,
/// so a generator cannot start a second yield before the first resolves.
#[derive(Debug)]
pub struct AsyncStreamWriter<T> {
    channel: Arc<RendezvousChannel<T>>,
    token: CancellationToken,
}

impl<T> AsyncStreamWriter<T> {
    pub(crate) fn new(channel: Arc<RendezvousChannel<T>>, token: CancellationToken) -> Self {
        Self { channel, token }
    }

    /// Hands `value` to the consumer.
    ///
    /// Resolves once the consumer has taken the value and asked for the next
    /// one. Fails with [`Error::Canceled`] when the enumeration is canceled
    /// or disposed; the generator should return that error so its own
    /// cleanup runs.
    pub fn yield_async(&mut self, value: T) -> YieldAsync<'_, T> {
        YieldAsync {
            writer: self,
            value: Some(value),
        }
    }

    /// Token of the enumeration this writer belongs to.
    pub fn cancelation_token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Future returned by [`AsyncStreamWriter::yield_async`].
#[must_use = "yielded values are only delivered when the future is awaited"]
#[derive(Debug)]
pub struct YieldAsync<'a, T> {
    writer: &'a AsyncStreamWriter<T>,
    value: Option<T>,
}

// The value is moved into the channel, never pinned.
impl<T> Unpin for YieldAsync<'_, T> {}

impl<T> Future for YieldAsync<'_, T> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.writer.token.is_cancelled() {
            this.value = None;
            return Poll::Ready(Err(Error::Canceled));
        }
        this.writer.channel.poll_yield(&mut this.value, cx.waker())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;
    use futures::task::noop_waker;

    #[test]
    fn test_yield_suspends_until_next_request() {
        let channel = Arc::new(RendezvousChannel::new());
        let mut writer = AsyncStreamWriter::new(channel.clone(), CancellationToken::new());
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        channel.begin_next();
        let mut fut = writer.yield_async(5);
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        assert_eq!(channel.state(), ChannelState::ValueReady);

        assert!(matches!(channel.poll_take(&waker), Some(Ok(Some(5)))));
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());

        channel.begin_next();
        assert!(matches!(Pin::new(&mut fut).poll(&mut cx), Poll::Ready(Ok(()))));
    }

    #[test]
    fn test_yield_fails_once_token_cancelled() {
        let channel = Arc::new(RendezvousChannel::new());
        let token = CancellationToken::new();
        let mut writer = AsyncStreamWriter::new(channel.clone(), token.clone());
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        channel.begin_next();
        assert!(!writer.cancelation_token().is_cancelled());
        token.cancel();
        assert!(writer.cancelation_token().is_cancelled());
        let mut fut = writer.yield_async(1);
        assert!(matches!(Pin::new(&mut fut).poll(&mut cx), Poll::Ready(Err(Error::Canceled))));
        assert_eq!(channel.state(), ChannelState::Running);
    }
}

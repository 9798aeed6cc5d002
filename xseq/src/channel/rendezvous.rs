//! Single-slot rendezvous between one producer and one consumer.
//!
//! Every transition happens under a short-lived lock; no lock is held
//! across an `.await`. Wakers are swapped in under the lock and woken
//! after the transition is recorded.

use std::task::{Poll, Waker};

use log::trace;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use super::ChannelState;

/// Internal phase; carries the fault so that every later `move_next` can
/// report it.
#[derive(Debug)]
enum Phase {
    Idle,
    Running,
    ValueReady,
    ProducerWaitingForConsumer,
    Completed,
    Faulted(Error),
    Canceled,
}

impl Phase {
    fn tag(&self) -> ChannelState {
        match self {
            Phase::Idle => ChannelState::Idle,
            Phase::Running => ChannelState::Running,
            Phase::ValueReady => ChannelState::ValueReady,
            Phase::ProducerWaitingForConsumer => ChannelState::ProducerWaitingForConsumer,
            Phase::Completed => ChannelState::Completed,
            Phase::Faulted(_) => ChannelState::Faulted,
            Phase::Canceled => ChannelState::Canceled,
        }
    }
}

#[derive(Debug)]
struct Inner<T> {
    phase: Phase,

    /// At most one value in flight.
    slot: Option<T>,

    producer_waker: Option<Waker>,

    consumer_waker: Option<Waker>,

    /// Error returned by the producer after the channel was canceled.
    cleanup_error: Option<Error>,
}

/// Outcome of a consumer take.
pub(crate) type Taken<T> = Result<Option<T>>;

/// Rendezvous channel with capacity for exactly one value.
///
/// The producer blocks in [`poll_yield`](Self::poll_yield) until the consumer
/// has taken its value and asked for the next one, so execution strictly
/// alternates between the two sides.
#[derive(Debug)]
pub struct RendezvousChannel<T> {
    inner: Mutex<Inner<T>>,
}

fn register(slot: &mut Option<Waker>, waker: &Waker) {
    match slot {
        Some(current) if current.will_wake(waker) => {}
        _ => *slot = Some(waker.clone()),
    }
}

impl<T> RendezvousChannel<T> {
    /// Creates an idle channel.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                slot: None,
                producer_waker: None,
                consumer_waker: None,
                cleanup_error: None,
            }),
        }
    }

    /// Returns the current channel state.
    pub fn state(&self) -> ChannelState {
        self.inner.lock().phase.tag()
    }

    /// Consumer side: asks for the next value.
    ///
    /// Returns true when the producer has never run and must be started by
    /// the caller.
    pub(crate) fn begin_next(&self) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.phase.tag() {
            ChannelState::Idle => {
                trace!("channel: Idle -> Running (start producer)");
                inner.phase = Phase::Running;
                true
            }
            ChannelState::ProducerWaitingForConsumer => {
                trace!("channel: ProducerWaitingForConsumer -> Running");
                inner.phase = Phase::Running;
                let waker = inner.producer_waker.take();
                drop(guard);
                if let Some(waker) = waker {
                    waker.wake();
                }
                false
            }
            _ => false,
        }
    }

    /// Consumer side: takes the pending value or the terminal outcome.
    ///
    /// Returns `None` after registering `waker` when neither is available.
    pub(crate) fn poll_take(&self, waker: &Waker) -> Option<Taken<T>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Phase::Canceled = inner.phase {
            inner.slot = None;
            return Some(Err(Error::Canceled));
        }

        // A value written before the producer finished is still delivered.
        if let Some(value) = inner.slot.take() {
            if let Phase::ValueReady = inner.phase {
                trace!("channel: ValueReady -> ProducerWaitingForConsumer");
                inner.phase = Phase::ProducerWaitingForConsumer;
            }
            return Some(Ok(Some(value)));
        }

        match &inner.phase {
            Phase::Completed => Some(Ok(None)),
            Phase::Faulted(err) => Some(Err(err.clone())),
            _ => {
                register(&mut inner.consumer_waker, waker);
                None
            }
        }
    }

    /// Producer side: offers `value` and waits until the consumer has taken
    /// it and asked for the next one.
    ///
    /// `value` is `Some` until it has been placed in the slot.
    pub(crate) fn poll_yield(&self, value: &mut Option<T>, waker: &Waker) -> Poll<Result<()>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.phase.tag() {
            ChannelState::Completed | ChannelState::Faulted | ChannelState::Canceled => {
                *value = None;
                Poll::Ready(Err(Error::Canceled))
            }
            ChannelState::Idle | ChannelState::Running if value.is_none() => Poll::Ready(Ok(())),
            ChannelState::Idle | ChannelState::Running if inner.slot.is_none() => {
                trace!("channel: Running -> ValueReady");
                inner.slot = value.take();
                inner.phase = Phase::ValueReady;
                register(&mut inner.producer_waker, waker);
                let consumer = inner.consumer_waker.take();
                drop(guard);
                if let Some(consumer) = consumer {
                    consumer.wake();
                }
                Poll::Pending
            }
            // An earlier value is still unconsumed; wait for the next request.
            _ => {
                register(&mut inner.producer_waker, waker);
                Poll::Pending
            }
        }
    }

    /// Moves the channel to `Canceled` unless it already finished.
    ///
    /// Any unconsumed value is dropped. Returns true if the state changed.
    pub(crate) fn cancel(&self) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let state = inner.phase.tag();
        if state.is_terminal() {
            return false;
        }
        trace!("channel: {:?} -> Canceled", state);
        inner.phase = Phase::Canceled;
        let slot = inner.slot.take();
        let producer = inner.producer_waker.take();
        let consumer = inner.consumer_waker.take();
        drop(guard);

        drop(slot);
        if let Some(waker) = producer {
            waker.wake();
        }
        if let Some(waker) = consumer {
            waker.wake();
        }
        true
    }

    /// Records how the producer coroutine ended.
    pub(crate) fn finish(&self, result: Result<()>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match (inner.phase.tag(), result) {
            (ChannelState::Canceled, Err(err)) if !err.is_canceled() => {
                inner.cleanup_error = Some(err);
            }
            (ChannelState::Canceled | ChannelState::Completed | ChannelState::Faulted, _) => {}
            (_, Ok(())) => {
                trace!("channel: producer completed");
                inner.phase = Phase::Completed;
            }
            (_, Err(Error::Canceled)) => {
                trace!("channel: producer observed cancellation");
                inner.phase = Phase::Canceled;
                inner.slot = None;
            }
            (_, Err(err)) => {
                trace!("channel: producer faulted: {}", err);
                inner.phase = Phase::Faulted(err);
            }
        }
        let consumer = inner.consumer_waker.take();
        drop(guard);
        if let Some(waker) = consumer {
            waker.wake();
        }
    }

    /// Takes the error the producer's cleanup raised after cancellation.
    pub(crate) fn take_cleanup_error(&self) -> Option<Error> {
        self.inner.lock().cleanup_error.take()
    }
}

impl<T> Default for RendezvousChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker;

    #[test]
    fn test_value_handoff_alternates() {
        let channel = RendezvousChannel::new();
        let waker = noop_waker();

        assert!(channel.begin_next());
        assert_eq!(channel.state(), ChannelState::Running);

        let mut value = Some(1);
        assert!(channel.poll_yield(&mut value, &waker).is_pending());
        assert!(value.is_none());
        assert_eq!(channel.state(), ChannelState::ValueReady);

        let taken = channel.poll_take(&waker);
        assert!(matches!(taken, Some(Ok(Some(1)))));
        assert_eq!(channel.state(), ChannelState::ProducerWaitingForConsumer);

        // Producer stays suspended until the consumer asks again.
        assert!(channel.poll_yield(&mut value, &waker).is_pending());
        assert!(!channel.begin_next());
        assert!(matches!(channel.poll_yield(&mut value, &waker), Poll::Ready(Ok(()))));
    }

    #[test]
    fn test_second_value_waits_for_first() {
        let channel = RendezvousChannel::new();
        let waker = noop_waker();
        channel.begin_next();

        let mut first = Some("a");
        assert!(channel.poll_yield(&mut first, &waker).is_pending());

        // A second offer while the first is unconsumed must not overwrite it.
        let mut second = Some("b");
        assert!(channel.poll_yield(&mut second, &waker).is_pending());
        assert_eq!(second, Some("b"));

        assert!(matches!(channel.poll_take(&waker), Some(Ok(Some("a")))));
        channel.begin_next();
        assert!(channel.poll_yield(&mut second, &waker).is_pending());
        assert!(matches!(channel.poll_take(&waker), Some(Ok(Some("b")))));
    }

    #[test]
    fn test_take_before_value_registers() {
        let channel: RendezvousChannel<u8> = RendezvousChannel::new();
        channel.begin_next();
        assert!(channel.poll_take(&noop_waker()).is_none());
    }

    #[test]
    fn test_completion_and_fault_are_sticky() {
        let waker = noop_waker();

        let channel: RendezvousChannel<u8> = RendezvousChannel::new();
        channel.begin_next();
        channel.finish(Ok(()));
        assert!(matches!(channel.poll_take(&waker), Some(Ok(None))));
        assert!(matches!(channel.poll_take(&waker), Some(Ok(None))));
        assert!(!channel.cancel());

        let channel: RendezvousChannel<u8> = RendezvousChannel::new();
        channel.begin_next();
        channel.finish(Err(Error::fault(anyhow::anyhow!("bad"))));
        assert_eq!(channel.state(), ChannelState::Faulted);
        for _ in 0..2 {
            match channel.poll_take(&waker) {
                Some(Err(err)) => assert_eq!(err.to_string(), "bad"),
                other => panic!("unexpected {:?}", other.map(|r| r.is_ok())),
            }
        }
    }

    #[test]
    fn test_cancel_drops_pending_value_and_fails_yield() {
        let channel = RendezvousChannel::new();
        let waker = noop_waker();
        channel.begin_next();

        let mut value = Some(String::from("lost"));
        assert!(channel.poll_yield(&mut value, &waker).is_pending());
        assert!(channel.cancel());

        assert!(matches!(channel.poll_take(&waker), Some(Err(Error::Canceled))));
        assert!(matches!(channel.poll_yield(&mut value, &waker), Poll::Ready(Err(Error::Canceled))));
    }

    #[test]
    fn test_error_after_cancel_is_cleanup_error() {
        let channel: RendezvousChannel<u8> = RendezvousChannel::new();
        channel.begin_next();
        channel.cancel();
        channel.finish(Err(Error::fault(anyhow::anyhow!("cleanup failed"))));

        assert_eq!(channel.state(), ChannelState::Canceled);
        let err = channel.take_cleanup_error().expect("cleanup error");
        assert_eq!(err.to_string(), "cleanup failed");
        assert!(channel.take_cleanup_error().is_none());
    }
}

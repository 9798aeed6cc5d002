//! Producer/consumer bridge for async-enumerable sequences.
//!
//! This module provides the single-slot rendezvous channel shared by
//! one producer coroutine and one consumer, and the writer handle the
//! producer uses to hand values across.

mod rendezvous;
mod writer;

pub use rendezvous::RendezvousChannel;
pub use writer::{AsyncStreamWriter, YieldAsync};

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Producer not started yet.
    Idle,

    /// Producer is running towards its next yield.
    Running,

    /// A value sits in the slot, not yet taken by the consumer.
    ValueReady,

    /// The consumer holds the last value; the producer waits for the next
    /// `move_next`.
    ProducerWaitingForConsumer,

    /// Producer returned normally.
    Completed,

    /// Producer failed.
    Faulted,

    /// Enumeration was canceled or disposed.
    Canceled,
}

impl ChannelState {
    /// Returns true once no further values can be written.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChannelState::Completed | ChannelState::Faulted | ChannelState::Canceled
        )
    }

    /// State of the producer coroutine as seen through the channel.
    pub fn producer_state(self) -> ProducerState {
        match self {
            ChannelState::Idle => ProducerState::NotStarted,
            ChannelState::Running => ProducerState::Running,
            ChannelState::ValueReady | ChannelState::ProducerWaitingForConsumer => {
                ProducerState::SuspendedAtYield
            }
            ChannelState::Completed => ProducerState::Completed,
            ChannelState::Faulted => ProducerState::Faulted,
            ChannelState::Canceled => ProducerState::Canceled,
        }
    }
}

/// Producer coroutine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    NotStarted,
    Running,
    SuspendedAtYield,
    Completed,
    Faulted,
    Canceled,
}

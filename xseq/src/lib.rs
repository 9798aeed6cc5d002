//! # xseq - Pull-based asynchronous sequences
//!
//! xseq runs generator functions as lazily pulled sequences. A producer
//! emits values with [`AsyncStreamWriter::yield_async`]; a consumer pulls
//! them with [`AsyncEnumerator::move_next`]. The two sides strictly
//! alternate over a single-slot rendezvous channel, so the producer never
//! runs ahead of its consumer.
//!
//! - **Rendezvous channel**: one value in flight, producer suspended until it is taken
//! - **Cooperative cancellation**: tokens and disposal unwind the producer's cleanup
//! - **Continuation options**: inline polling, a background task, or an explicit runtime
//! - **Query operators**: `aggregate_by`, `select_many`, `to_dictionary_async` and friends
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Operator Layer                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ AggregateBy │ │ SelectMany  │ │ ToDictionary    │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Sequence Layer                        │
//! │  ┌──────────────────┐ ┌──────────────────────────────┐ │
//! │  │ AsyncEnumerable  │ │ ConfiguredAsyncEnumerable    │ │
//! │  └──────────────────┘ └──────────────────────────────┘ │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Enumerator Layer                      │
//! │  ┌─────────────────────────────────────────────────┐   │
//! │  │   AsyncEnumerator (drives or spawns producer)    │   │
//! │  └─────────────────────────────────────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Channel Layer                         │
//! │  ┌──────────────────┐ ┌──────────────────────────────┐ │
//! │  │ RendezvousChannel│ │ AsyncStreamWriter            │ │
//! │  └──────────────────┘ └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use xseq::{AsyncEnumerable, AsyncSequenceExt};
//!
//! let words = AsyncEnumerable::create(|mut writer, _token| async move {
//!     for word in ["red", "green", "red"] {
//!         writer.yield_async(word).await?;
//!     }
//!     Ok(())
//! });
//!
//! let counts = words
//!     .aggregate_by(|w| *w, 0, |n, _| n + 1)
//!     .to_dictionary_with_elements_async(|(w, _)| *w, |(_, n)| n)
//!     .await?;
//! assert_eq!(counts["red"], 2);
//! ```

#![deny(unsafe_code)]

mod cancel;
pub mod channel;
pub mod config;
pub mod configured;
pub mod enumerable;
pub mod enumerator;
pub mod error;
pub mod operators;
pub mod sequence;

pub use channel::{AsyncStreamWriter, ChannelState, ProducerState, RendezvousChannel, YieldAsync};
pub use config::{ContinuationContext, ContinuationOptions};
pub use configured::{ConfiguredAsyncEnumerable, ConfiguredAsyncEnumerator};
pub use enumerable::AsyncEnumerable;
pub use enumerator::{AsyncEnumerator, MoveNext};
pub use error::{Error, ErrorKind, Result};
pub use operators::{AsyncSequenceExt, ToAsyncEnumerable};
pub use sequence::{AsyncSequence, SequenceEnumerator};
pub use tokio_util::sync::CancellationToken;

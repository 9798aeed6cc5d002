//! Traits shared by plain and configured sequences.
//!
//! The operator layer is written once against these traits.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::config::ContinuationOptions;
use crate::configured::{ConfiguredAsyncEnumerable, ConfiguredAsyncEnumerator};
use crate::enumerable::AsyncEnumerable;
use crate::enumerator::AsyncEnumerator;
use crate::error::Result;

/// Cursor over one enumeration.
pub trait SequenceEnumerator<T>: Send {
    fn move_next(&mut self) -> impl Future<Output = Result<bool>> + Send + '_;

    fn current(&self) -> Result<&T>;

    fn take_current(&mut self) -> Result<T>;

    fn dispose(&mut self) -> impl Future<Output = Result<()>> + Send + '_;

    /// Options selector awaits should re-apply.
    fn continuation_options(&self) -> ContinuationOptions;
}

/// A re-enumerable asynchronous sequence.
pub trait AsyncSequence<T: Send + 'static>: Clone + Send + Sync + 'static {
    type Enumerator: SequenceEnumerator<T>;

    fn get_async_enumerator(&self, token: CancellationToken) -> Self::Enumerator;

    /// Token bound to every enumeration, if any.
    fn cancelation_token(&self) -> Option<CancellationToken>;
}

impl<T: Send + 'static> SequenceEnumerator<T> for AsyncEnumerator<T> {
    fn move_next(&mut self) -> impl Future<Output = Result<bool>> + Send + '_ {
        AsyncEnumerator::move_next(self)
    }

    fn current(&self) -> Result<&T> {
        AsyncEnumerator::current(self)
    }

    fn take_current(&mut self) -> Result<T> {
        AsyncEnumerator::take_current(self)
    }

    fn dispose(&mut self) -> impl Future<Output = Result<()>> + Send + '_ {
        AsyncEnumerator::dispose(self)
    }

    fn continuation_options(&self) -> ContinuationOptions {
        AsyncEnumerator::continuation_options(self).clone()
    }
}

impl<T: Send + 'static> SequenceEnumerator<T> for ConfiguredAsyncEnumerator<T> {
    fn move_next(&mut self) -> impl Future<Output = Result<bool>> + Send + '_ {
        ConfiguredAsyncEnumerator::move_next(self)
    }

    fn current(&self) -> Result<&T> {
        ConfiguredAsyncEnumerator::current(self)
    }

    fn take_current(&mut self) -> Result<T> {
        ConfiguredAsyncEnumerator::take_current(self)
    }

    fn dispose(&mut self) -> impl Future<Output = Result<()>> + Send + '_ {
        ConfiguredAsyncEnumerator::dispose(self)
    }

    fn continuation_options(&self) -> ContinuationOptions {
        ConfiguredAsyncEnumerator::continuation_options(self).clone()
    }
}

impl<T: Send + 'static> AsyncSequence<T> for AsyncEnumerable<T> {
    type Enumerator = AsyncEnumerator<T>;

    fn get_async_enumerator(&self, token: CancellationToken) -> Self::Enumerator {
        AsyncEnumerable::get_async_enumerator(self, token)
    }

    fn cancelation_token(&self) -> Option<CancellationToken> {
        None
    }
}

impl<T: Send + 'static> AsyncSequence<T> for ConfiguredAsyncEnumerable<T> {
    type Enumerator = ConfiguredAsyncEnumerator<T>;

    fn get_async_enumerator(&self, token: CancellationToken) -> Self::Enumerator {
        self.open(&token)
    }

    fn cancelation_token(&self) -> Option<CancellationToken> {
        ConfiguredAsyncEnumerable::cancelation_token(self).cloned()
    }
}

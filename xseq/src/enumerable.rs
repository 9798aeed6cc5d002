//! Async-enumerable sequences built from generator functions.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, Stream, StreamExt};
use log::warn;
use tokio_util::sync::CancellationToken;

use crate::channel::AsyncStreamWriter;
use crate::config::ContinuationOptions;
use crate::configured::ConfiguredAsyncEnumerable;
use crate::enumerator::AsyncEnumerator;
use crate::error::Result;

/// Shared generator: one call per enumeration.
pub(crate) type Generator<T> = Arc<
    dyn Fn(AsyncStreamWriter<T>, CancellationToken) -> BoxFuture<'static, Result<()>>
        + Send
        + Sync,
>;

/// A lazily produced sequence.
///
/// Cloning is cheap and every call to
/// [`get_async_enumerator`](Self::get_async_enumerator) runs the generator
/// afresh.
///
/// # Example
///
/// ```rust,ignore
/// use xseq::AsyncEnumerable;
///
/// let numbers = AsyncEnumerable::create(|mut writer, _token| async move {
///     for i in 0..3 {
///         writer.yield_async(i).await?;
///     }
///     Ok(())
/// });
///
/// let mut e = numbers.get_async_enumerator(CancellationToken::new());
/// while e.move_next().await? {
///     println!("{}", e.current()?);
/// }
/// e.dispose().await?;
/// ```
pub struct AsyncEnumerable<T> {
    generator: Generator<T>,
}

impl<T> Clone for AsyncEnumerable<T> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
        }
    }
}

impl<T: Send + 'static> AsyncEnumerable<T> {
    /// Wraps a generator function.
    ///
    /// The generator receives the writer used to emit values and the token
    /// of the enumeration. Returning `Ok(())` completes the sequence; any
    /// other error faults it.
    pub fn create<F, Fut>(generator: F) -> Self
    where
        F: Fn(AsyncStreamWriter<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            generator: Arc::new(move |writer, token| generator(writer, token).boxed()),
        }
    }

    /// Like [`create`](Self::create), threading an explicit state value into
    /// each run instead of capturing it.
    pub fn create_with_state<S, F, Fut>(state: S, generator: F) -> Self
    where
        S: Clone + Send + Sync + 'static,
        F: Fn(S, AsyncStreamWriter<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::create(move |writer, token| generator(state.clone(), writer, token))
    }

    /// A sequence with no elements.
    pub fn empty() -> Self {
        Self::create(|_writer, _token| async { Ok(()) })
    }

    /// Adapts a stream factory; each enumeration drains a fresh stream.
    pub fn from_stream_fn<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        Self::create(move |mut writer, _token| {
            let mut stream = Box::pin(factory());
            async move {
                while let Some(item) = stream.next().await {
                    writer.yield_async(item).await?;
                }
                Ok(())
            }
        })
    }

    pub fn get_async_enumerator(&self, token: CancellationToken) -> AsyncEnumerator<T> {
        AsyncEnumerator::new(
            self.generator.clone(),
            &token,
            None,
            ContinuationOptions::default(),
        )
    }

    /// Binds a cancellation token to every enumeration of this sequence.
    pub fn with_cancelation(&self, token: CancellationToken) -> ConfiguredAsyncEnumerable<T> {
        ConfiguredAsyncEnumerable::new(self.clone(), ContinuationOptions::default(), Some(token))
    }

    /// Applies continuation options to every enumeration of this sequence.
    pub fn configure_await(
        &self,
        options: impl Into<ContinuationOptions>,
    ) -> ConfiguredAsyncEnumerable<T> {
        ConfiguredAsyncEnumerable::new(self.clone(), options.into(), None)
    }

    /// Adapts the sequence to a [`Stream`], disposing the enumerator when
    /// the stream ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send {
        let enumerator = self.get_async_enumerator(CancellationToken::new());
        stream::unfold(Some(enumerator), |state| async move {
            let mut enumerator = state?;
            match enumerator.move_next().await {
                Ok(true) => match enumerator.take_current() {
                    Ok(value) => Some((Ok(value), Some(enumerator))),
                    Err(err) => Some((Err(err), None)),
                },
                Ok(false) => match enumerator.dispose().await {
                    Ok(()) => None,
                    Err(err) => Some((Err(err), None)),
                },
                Err(err) => {
                    if let Err(cleanup) = enumerator.dispose().await {
                        warn!("dispose after fault failed: {}", cleanup);
                    }
                    Some((Err(err), None))
                }
            }
        })
    }

    pub(crate) fn generator(&self) -> Generator<T> {
        self.generator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_each_enumeration_reruns_generator() {
        let source = AsyncEnumerable::create(|mut writer, _token| async move {
            writer.yield_async("a").await?;
            writer.yield_async("b").await
        });

        for _ in 0..2 {
            let values: Vec<_> = source.clone().into_stream().try_collect().await.unwrap();
            assert_eq!(values, vec!["a", "b"]);
        }
    }

    #[tokio::test]
    async fn test_create_with_state() {
        let source = AsyncEnumerable::create_with_state(3usize, |count, mut writer, _token| async move {
            for i in 0..count {
                writer.yield_async(i * 2).await?;
            }
            Ok(())
        });
        let values: Vec<_> = source.into_stream().try_collect().await.unwrap();
        assert_eq!(values, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_empty() {
        let mut e = AsyncEnumerable::<u8>::empty().get_async_enumerator(CancellationToken::new());
        assert!(!e.move_next().await.unwrap());
        e.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_from_stream_fn() {
        let source = AsyncEnumerable::from_stream_fn(|| stream::iter(vec![1, 2, 3]));
        let values: Vec<_> = source.into_stream().try_collect().await.unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_into_stream_ends_with_fault() {
        let source = AsyncEnumerable::create(|mut writer, _token| async move {
            writer.yield_async(1).await?;
            Err(Error::fault(anyhow::anyhow!("late failure")))
        });
        let items: Vec<Result<i32>> = source.into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(*items[0].as_ref().unwrap(), 1);
        assert_eq!(items[1].as_ref().unwrap_err().to_string(), "late failure");
    }
}

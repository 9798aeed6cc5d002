//! Query operators over [`AsyncSequence`]s.
//!
//! Every operator drives its source through a [`SequenceEnumerator`] and
//! disposes it on every exit path. Synchronous selectors are lifted into
//! ready futures so each operator has a single async implementation.
//!
//! Selector futures run on the source's [`ContinuationContext`]. Terminal
//! operators (`to_dictionary_*`, `to_vec_async`, `for_each_async`) take no
//! token of their own; bind one to the source with
//! [`with_cancelation`](AsyncEnumerable::with_cancelation).
//!
//! [`ContinuationContext`]: crate::ContinuationContext

mod aggregate_by;
mod select_many;
mod to_async_enumerable;
mod to_dictionary;

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use futures::future::ready;
use log::warn;
use tokio_util::sync::CancellationToken;

use crate::enumerable::AsyncEnumerable;
use crate::error::{Error, Result};
use crate::sequence::{AsyncSequence, SequenceEnumerator};

pub use to_async_enumerable::ToAsyncEnumerable;

/// Combines the outcome of a drain loop with the outcome of disposing its
/// enumerator. The loop's error wins; a dispose failure behind it is logged.
pub(crate) fn finally<R>(result: Result<R>, disposed: Result<()>) -> Result<R> {
    match (result, disposed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(dispose_err)) => {
            warn!("dispose failed after {}: {}", err, dispose_err);
            Err(err)
        }
    }
}

/// Operators available on every [`AsyncSequence`].
pub trait AsyncSequenceExt<T: Send + 'static>: AsyncSequence<T> {
    /// Groups elements by key and folds each group, starting from a clone of
    /// `seed`.
    fn aggregate_by<K, A, KS, F>(&self, key_selector: KS, seed: A, func: F) -> AsyncEnumerable<(K, A)>
    where
        K: Hash + Eq + Send + 'static,
        A: Clone + Send + Sync + 'static,
        KS: Fn(&T) -> K + Send + Sync + 'static,
        F: Fn(A, T) -> A + Send + Sync + 'static,
    {
        aggregate_by::aggregate(
            self.clone(),
            move |item: &T| ready(Ok(key_selector(item))),
            move |_: &K| seed.clone(),
            move |acc, item| ready(Ok(func(acc, item))),
        )
    }

    /// Like [`aggregate_by`](Self::aggregate_by) with a seed computed from
    /// each new key.
    fn aggregate_by_with_seed<K, A, KS, SS, F>(
        &self,
        key_selector: KS,
        seed_selector: SS,
        func: F,
    ) -> AsyncEnumerable<(K, A)>
    where
        K: Hash + Eq + Send + 'static,
        A: Send + 'static,
        KS: Fn(&T) -> K + Send + Sync + 'static,
        SS: Fn(&K) -> A + Send + Sync + 'static,
        F: Fn(A, T) -> A + Send + Sync + 'static,
    {
        aggregate_by::aggregate(
            self.clone(),
            move |item: &T| ready(Ok(key_selector(item))),
            seed_selector,
            move |acc, item| ready(Ok(func(acc, item))),
        )
    }

    fn aggregate_by_async<K, A, KS, KFut, F, AFut>(
        &self,
        key_selector: KS,
        seed: A,
        func: F,
    ) -> AsyncEnumerable<(K, A)>
    where
        K: Hash + Eq + Send + 'static,
        A: Clone + Send + Sync + 'static,
        KS: Fn(&T) -> KFut + Send + Sync + 'static,
        KFut: Future<Output = Result<K>> + Send + 'static,
        F: Fn(A, T) -> AFut + Send + Sync + 'static,
        AFut: Future<Output = Result<A>> + Send + 'static,
    {
        aggregate_by::aggregate(self.clone(), key_selector, move |_: &K| seed.clone(), func)
    }

    /// Flattens the inner sequence `selector` returns for each element.
    fn select_many<U, I, CS>(&self, selector: CS) -> AsyncEnumerable<U>
    where
        U: Send + 'static,
        I: AsyncSequence<U>,
        CS: Fn(&T) -> I + Send + Sync + 'static,
    {
        select_many::flatten(
            self.clone(),
            move |item: &T| ready(Ok(selector(item))),
            |_: &T, value: U| value,
        )
    }

    /// Flattens and projects each `(outer, inner)` pair.
    fn select_many_with<U, I, CS, R, RS>(&self, selector: CS, result_selector: RS) -> AsyncEnumerable<R>
    where
        U: Send + 'static,
        I: AsyncSequence<U>,
        CS: Fn(&T) -> I + Send + Sync + 'static,
        R: Send + 'static,
        RS: Fn(&T, U) -> R + Send + Sync + 'static,
    {
        select_many::flatten(
            self.clone(),
            move |item: &T| ready(Ok(selector(item))),
            result_selector,
        )
    }

    fn select_many_async<U, I, CS, CFut>(&self, selector: CS) -> AsyncEnumerable<U>
    where
        U: Send + 'static,
        I: AsyncSequence<U>,
        CS: Fn(&T) -> CFut + Send + Sync + 'static,
        CFut: Future<Output = Result<I>> + Send + 'static,
    {
        select_many::flatten(self.clone(), selector, |_: &T, value: U| value)
    }

    /// Collects the sequence into a map keyed by `key_selector`.
    ///
    /// Fails with [`Error::DuplicateKey`] on the first repeated key.
    fn to_dictionary_async<K, KS>(&self, key_selector: KS) -> impl Future<Output = Result<HashMap<K, T>>> + Send
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        KS: Fn(&T) -> K + Send + Sync,
    {
        to_dictionary::collect(
            self.clone(),
            move |item: &T| ready(Ok(key_selector(item))),
            |item: T| ready(Ok(item)),
        )
    }

    fn to_dictionary_with_elements_async<K, V, KS, VS>(
        &self,
        key_selector: KS,
        element_selector: VS,
    ) -> impl Future<Output = Result<HashMap<K, V>>> + Send
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        V: Send + Sync + 'static,
        KS: Fn(&T) -> K + Send + Sync,
        VS: Fn(T) -> V + Send + Sync,
    {
        to_dictionary::collect(
            self.clone(),
            move |item: &T| ready(Ok(key_selector(item))),
            move |item: T| ready(Ok(element_selector(item))),
        )
    }

    fn to_dictionary_async_with<K, V, KS, KFut, VS, VFut>(
        &self,
        key_selector: KS,
        element_selector: VS,
    ) -> impl Future<Output = Result<HashMap<K, V>>> + Send
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        V: Send + Sync + 'static,
        KS: Fn(&T) -> KFut + Send + Sync,
        KFut: Future<Output = Result<K>> + Send + 'static,
        VS: Fn(T) -> VFut + Send + Sync,
        VFut: Future<Output = Result<V>> + Send + 'static,
    {
        to_dictionary::collect(self.clone(), key_selector, element_selector)
    }

    /// Drains the sequence into a `Vec`.
    fn to_vec_async(&self) -> impl Future<Output = Result<Vec<T>>> + Send {
        let source = self.clone();
        async move {
            let mut enumerator = source.get_async_enumerator(CancellationToken::new());
            let collected = async {
                let mut items = Vec::new();
                while enumerator.move_next().await? {
                    items.push(enumerator.take_current()?);
                }
                Ok::<_, Error>(items)
            }
            .await;
            finally(collected, enumerator.dispose().await)
        }
    }

    /// Awaits `f` for every element in order, stopping at the first error.
    fn for_each_async<F, Fut>(&self, mut f: F) -> impl Future<Output = Result<()>> + Send
    where
        F: FnMut(T) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let source = self.clone();
        async move {
            let mut enumerator = source.get_async_enumerator(CancellationToken::new());
            let options = enumerator.continuation_options();
            let visited = async {
                while enumerator.move_next().await? {
                    let item = enumerator.take_current()?;
                    options.run(f(item)).await?;
                }
                Ok::<_, Error>(())
            }
            .await;
            finally(visited, enumerator.dispose().await)
        }
    }
}

impl<T: Send + 'static, S: AsyncSequence<T>> AsyncSequenceExt<T> for S {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::config::ContinuationOptions;
    use crate::error::ErrorKind;
    use crate::test_util::DropCounter;

    #[test]
    fn test_finally_prefers_loop_error() {
        let loop_err: Result<()> = Err(Error::DuplicateKey("k".into()));
        let err = finally(loop_err, Err(Error::Canceled)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);

        let err = finally(Ok(1), Err(Error::Canceled)).unwrap_err();
        assert!(err.is_canceled());
        assert_eq!(finally(Ok(1), Ok(())).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_to_vec_over_configured_source() {
        let items = (1..=4)
            .to_async_enumerable()
            .configure_await(ContinuationOptions::new().with_force_async(true))
            .to_vec_async()
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_for_each_stops_at_error_and_disposes() {
        let drops = Arc::new(AtomicUsize::new(0));
        let counter = drops.clone();
        let source = AsyncEnumerable::create(move |mut writer, _token| {
            let guard = DropCounter::new(counter.clone());
            async move {
                let _guard = guard;
                for i in 0..10 {
                    writer.yield_async(i).await?;
                }
                Ok(())
            }
        });

        let mut seen = Vec::new();
        let result = source
            .for_each_async(|n| {
                seen.push(n);
                async move {
                    if n == 3 {
                        Err(Error::fault(anyhow::anyhow!("stop at {n}")))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "stop at 3");
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_operators_compose() {
        let counts = vec!["ab", "c", "de"]
            .to_async_enumerable()
            .select_many(|s| s.chars().collect::<Vec<_>>().to_async_enumerable())
            .aggregate_by(|c| c.is_ascii_lowercase(), 0usize, |acc, _| acc + 1)
            .to_dictionary_with_elements_async(|(k, _)| *k, |(_, n)| n)
            .await
            .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&true], 5);
    }
}

//! Keyed aggregation over a whole sequence.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::enumerable::AsyncEnumerable;
use crate::error::{Error, Result};
use crate::sequence::{AsyncSequence, SequenceEnumerator};
use super::finally;

/// Drains `source`, folding every element into the accumulator of its key,
/// then yields one `(key, accumulator)` pair per distinct key in the order
/// the keys were first seen.
pub(crate) fn aggregate<T, S, K, A, KS, KFut, SS, F, AFut>(
    source: S,
    key_selector: KS,
    seed: SS,
    func: F,
) -> AsyncEnumerable<(K, A)>
where
    T: Send + 'static,
    S: AsyncSequence<T>,
    K: Hash + Eq + Send + 'static,
    A: Send + 'static,
    KS: Fn(&T) -> KFut + Send + Sync + 'static,
    KFut: Future<Output = Result<K>> + Send + 'static,
    SS: Fn(&K) -> A + Send + Sync + 'static,
    F: Fn(A, T) -> AFut + Send + Sync + 'static,
    AFut: Future<Output = Result<A>> + Send + 'static,
{
    let key_selector = Arc::new(key_selector);
    let seed = Arc::new(seed);
    let func = Arc::new(func);

    AsyncEnumerable::create(move |mut writer, token| {
        let source = source.clone();
        let key_selector = key_selector.clone();
        let seed = seed.clone();
        let func = func.clone();

        async move {
            let mut enumerator = source.get_async_enumerator(token);
            let options = enumerator.continuation_options();
            let drained = async {
                let mut groups: IndexMap<K, Option<A>> = IndexMap::new();
                while enumerator.move_next().await? {
                    let item = enumerator.take_current()?;
                    let key = options.run(key_selector(&item)).await?;
                    let slot = match groups.entry(key) {
                        Entry::Occupied(entry) => entry.into_mut(),
                        Entry::Vacant(entry) => {
                            let initial = seed(entry.key());
                            entry.insert(Some(initial))
                        }
                    };
                    let acc = slot
                        .take()
                        .ok_or(Error::InvalidOperation("accumulator missing"))?;
                    *slot = Some(options.run(func(acc, item)).await?);
                }
                Ok::<_, Error>(groups)
            }
            .await;
            let groups = finally(drained, enumerator.dispose().await)?;

            for (key, acc) in groups {
                if let Some(acc) = acc {
                    writer.yield_async((key, acc)).await?;
                }
            }
            Ok(())
        }
    })
}

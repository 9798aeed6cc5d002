//! Draining a sequence into a dictionary.

use std::collections::hash_map::{Entry, HashMap};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::sequence::{AsyncSequence, SequenceEnumerator};
use super::finally;

/// Drains `source` into a map keyed by `key_selector`.
///
/// A repeated key fails with [`Error::DuplicateKey`] at the insertion that
/// collides; the partial map is discarded and the enumerator disposed.
pub(crate) async fn collect<T, S, K, V, KS, KFut, VS, VFut>(
    source: S,
    key_selector: KS,
    element_selector: VS,
) -> Result<HashMap<K, V>>
where
    T: Send + 'static,
    S: AsyncSequence<T>,
    K: Hash + Eq + Debug + Send + 'static,
    V: Send + 'static,
    KS: Fn(&T) -> KFut,
    KFut: Future<Output = Result<K>> + Send + 'static,
    VS: Fn(T) -> VFut,
    VFut: Future<Output = Result<V>> + Send + 'static,
{
    let mut enumerator = source.get_async_enumerator(CancellationToken::new());
    let options = enumerator.continuation_options();
    let collected = async {
        let mut map = HashMap::new();
        while enumerator.move_next().await? {
            let item = enumerator.take_current()?;
            let key = options.run(key_selector(&item)).await?;
            let value = options.run(element_selector(item)).await?;
            match map.entry(key) {
                Entry::Occupied(entry) => {
                    return Err(Error::DuplicateKey(format!("{:?}", entry.key())));
                }
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }
        Ok(map)
    }
    .await;
    finally(collected, enumerator.dispose().await)
}

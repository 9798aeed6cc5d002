//! Flattening projection.

use std::future::Future;
use std::sync::Arc;

use crate::enumerable::AsyncEnumerable;
use crate::error::{Error, Result};
use crate::sequence::{AsyncSequence, SequenceEnumerator};
use super::finally;

/// Projects every outer element to an inner sequence and yields
/// `result_selector(outer, inner)` for each inner element.
///
/// Each inner sequence is drained and disposed before the outer sequence
/// advances.
pub(crate) fn flatten<T, S, U, I, CS, CFut, R, RS>(
    source: S,
    collection_selector: CS,
    result_selector: RS,
) -> AsyncEnumerable<R>
where
    T: Send + 'static,
    S: AsyncSequence<T>,
    U: Send + 'static,
    I: AsyncSequence<U>,
    CS: Fn(&T) -> CFut + Send + Sync + 'static,
    CFut: Future<Output = Result<I>> + Send + 'static,
    R: Send + 'static,
    RS: Fn(&T, U) -> R + Send + Sync + 'static,
{
    let collection_selector = Arc::new(collection_selector);
    let result_selector = Arc::new(result_selector);

    AsyncEnumerable::create(move |mut writer, token| {
        let source = source.clone();
        let collection_selector = collection_selector.clone();
        let result_selector = result_selector.clone();

        async move {
            let mut outer = source.get_async_enumerator(token.clone());
            let options = outer.continuation_options();
            let flattened = async {
                while outer.move_next().await? {
                    let item = outer.take_current()?;
                    let collection = options.run(collection_selector(&item)).await?;

                    let mut inner = collection.get_async_enumerator(token.clone());
                    // `item` stays owned by this frame; only the result
                    // selector borrows it, between awaits.
                    let drained = loop {
                        match inner.move_next().await {
                            Ok(true) => {}
                            Ok(false) => break Ok(()),
                            Err(err) => break Err(err),
                        }
                        let value = match inner.take_current() {
                            Ok(value) => value,
                            Err(err) => break Err(err),
                        };
                        if let Err(err) = writer.yield_async(result_selector(&item, value)).await {
                            break Err(err);
                        }
                    };
                    finally(drained, inner.dispose().await)?;
                }
                Ok::<_, Error>(())
            }
            .await;
            finally(flattened, outer.dispose().await)
        }
    })
}

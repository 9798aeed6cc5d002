use crate::enumerable::AsyncEnumerable;

/// Adapts an in-memory collection into an [`AsyncEnumerable`].
///
/// Each enumeration iterates a fresh clone of the collection, so the
/// resulting sequence can be enumerated any number of times.
pub trait ToAsyncEnumerable {
    type Item;

    fn to_async_enumerable(self) -> AsyncEnumerable<Self::Item>;
}

impl<I> ToAsyncEnumerable for I
where
    I: IntoIterator + Clone + Send + Sync + 'static,
    I::Item: Send + 'static,
    I::IntoIter: Send,
{
    type Item = I::Item;

    fn to_async_enumerable(self) -> AsyncEnumerable<I::Item> {
        AsyncEnumerable::create(move |mut writer, _token| {
            let items = self.clone().into_iter();
            async move {
                for item in items {
                    writer.yield_async(item).await?;
                }
                Ok(())
            }
        })
    }
}

impl<T> FromIterator<T> for AsyncEnumerable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Buffers the items; every enumeration replays them.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().to_async_enumerable()
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::channel::ChannelState;

    #[tokio::test]
    async fn test_yields_collection_in_order() {
        let source = vec!["a", "b", "c"].to_async_enumerable();
        let items: Vec<&str> = source.into_stream().try_collect().await.unwrap();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_reenumerable() {
        let source = (0..3).to_async_enumerable();
        for _ in 0..2 {
            let items: Vec<i32> = source.clone().into_stream().try_collect().await.unwrap();
            assert_eq!(items, vec![0, 1, 2]);
        }
    }

    #[tokio::test]
    async fn test_collect_into_sequence() {
        let source: AsyncEnumerable<String> = ["x", "y"].iter().map(|s| s.to_uppercase()).collect();
        let items: Vec<String> = source.into_stream().try_collect().await.unwrap();
        assert_eq!(items, vec!["X", "Y"]);
    }

    #[tokio::test]
    async fn test_empty_collection_completes() {
        let mut e = Vec::<u8>::new()
            .to_async_enumerable()
            .get_async_enumerator(CancellationToken::new());
        assert!(!e.move_next().await.unwrap());
        assert_eq!(e.state(), ChannelState::Completed);
        e.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_mid_collection() {
        let token = CancellationToken::new();
        let mut e = (0..100).to_async_enumerable().get_async_enumerator(token.clone());
        assert!(e.move_next().await.unwrap());
        assert!(e.move_next().await.unwrap());
        token.cancel();
        assert!(e.move_next().await.unwrap_err().is_canceled());
        e.dispose().await.unwrap();
    }
}

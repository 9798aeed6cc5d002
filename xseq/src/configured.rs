//! Sequences carrying continuation options and a bound cancellation token.

use tokio_util::sync::CancellationToken;

use crate::config::ContinuationOptions;
use crate::enumerable::AsyncEnumerable;
use crate::enumerator::AsyncEnumerator;
use crate::error::Result;

/// Decorates an [`AsyncEnumerable`] with scheduling options and an optional
/// cancellation token applied to every enumeration.
pub struct ConfiguredAsyncEnumerable<T> {
    source: AsyncEnumerable<T>,
    options: ContinuationOptions,
    token: Option<CancellationToken>,
}

impl<T> Clone for ConfiguredAsyncEnumerable<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            options: self.options.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T: Send + 'static> ConfiguredAsyncEnumerable<T> {
    pub(crate) fn new(
        source: AsyncEnumerable<T>,
        options: ContinuationOptions,
        token: Option<CancellationToken>,
    ) -> Self {
        Self {
            source,
            options,
            token,
        }
    }

    pub fn with_cancelation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn configure_await(mut self, options: impl Into<ContinuationOptions>) -> Self {
        self.options = options.into();
        self
    }

    /// Options downstream awaits should re-apply.
    pub fn continuation_options(&self) -> &ContinuationOptions {
        &self.options
    }

    pub fn cancelation_token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    /// Opens an enumerator observing the bound token.
    pub fn get_async_enumerator(&self) -> ConfiguredAsyncEnumerator<T> {
        self.open(&CancellationToken::new())
    }

    /// Opens an enumerator observing both `token` and the bound token.
    pub(crate) fn open(&self, token: &CancellationToken) -> ConfiguredAsyncEnumerator<T> {
        ConfiguredAsyncEnumerator {
            inner: AsyncEnumerator::new(
                self.source.generator(),
                token,
                self.token.clone(),
                self.options.clone(),
            ),
            options: self.options.clone(),
        }
    }
}

/// Enumerator of a [`ConfiguredAsyncEnumerable`].
///
/// Each `move_next` and `dispose` resumes according to the sequence's
/// [`ContinuationOptions`].
pub struct ConfiguredAsyncEnumerator<T> {
    inner: AsyncEnumerator<T>,
    options: ContinuationOptions,
}

impl<T: Send + 'static> ConfiguredAsyncEnumerator<T> {
    pub async fn move_next(&mut self) -> Result<bool> {
        self.options.resume(self.inner.move_next()).await
    }

    pub fn current(&self) -> Result<&T> {
        self.inner.current()
    }

    pub fn take_current(&mut self) -> Result<T> {
        self.inner.take_current()
    }

    pub async fn dispose(&mut self) -> Result<()> {
        self.options.resume(self.inner.dispose()).await
    }

    pub fn continuation_options(&self) -> &ContinuationOptions {
        &self.options
    }

    /// The wrapped enumerator.
    pub fn inner(&self) -> &AsyncEnumerator<T> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;
    use crate::config::ContinuationContext;

    fn letters() -> AsyncEnumerable<char> {
        AsyncEnumerable::create(|mut writer, _token| async move {
            for c in ['x', 'y', 'z'] {
                writer.yield_async(c).await?;
            }
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_force_async_keeps_values() {
        let configured = letters().configure_await(ContinuationOptions::new().with_force_async(true));
        assert!(configured.continuation_options().force_async);

        let mut e = configured.get_async_enumerator();
        let mut seen = String::new();
        while e.move_next().await.unwrap() {
            seen.push(e.take_current().unwrap());
        }
        assert_eq!(seen, "xyz");
        e.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_bound_token_cancels_enumeration() {
        let token = CancellationToken::new();
        let configured = letters().with_cancelation(token.clone());
        assert!(configured.cancelation_token().is_some());
        let mut e = configured.get_async_enumerator();
        assert!(e.move_next().await.unwrap());
        token.cancel();
        assert!(e.move_next().await.unwrap_err().is_canceled());
        assert_eq!(e.inner().state(), ChannelState::Canceled);
        e.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_links_caller_token() {
        let configured = letters().with_cancelation(CancellationToken::new());
        let caller = CancellationToken::new();
        caller.cancel();
        let mut e = configured.open(&caller);
        assert!(e.move_next().await.unwrap_err().is_canceled());
        e.dispose().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_explicit_runtime_runs_producer() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let options = ContinuationOptions::new()
            .with_context(ContinuationContext::Explicit(runtime.handle().clone()));
        let mut e = letters().configure_await(options).get_async_enumerator();
        let mut seen = String::new();
        while e.move_next().await.unwrap() {
            seen.push(*e.current().unwrap());
        }
        assert_eq!(seen, "xyz");
        e.dispose().await.unwrap();
        runtime.shutdown_background();
    }
}

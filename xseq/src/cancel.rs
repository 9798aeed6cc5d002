//! Cancellation wiring for a single enumeration.

use futures::future::{self, BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

/// Token set observed by one enumeration.
///
/// `token` is a child of the caller's token, so cancelling the caller cancels
/// the enumeration while disposing the enumeration never cancels the caller.
/// `linked` is an extra parent, typically the token a configured sequence was
/// built with; it is folded into `token` the first time it is observed.
#[derive(Debug, Clone)]
pub(crate) struct EnumerationToken {
    token: CancellationToken,
    linked: Option<CancellationToken>,
}

impl EnumerationToken {
    pub(crate) fn new(parent: &CancellationToken, linked: Option<CancellationToken>) -> Self {
        let token = parent.child_token();
        if linked.as_ref().is_some_and(CancellationToken::is_cancelled) {
            token.cancel();
        }
        Self { token, linked }
    }

    /// Token handed to the producer.
    pub(crate) fn producer_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        match &self.linked {
            Some(linked) if linked.is_cancelled() => {
                self.token.cancel();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Resolves once any token in the set is cancelled.
    pub(crate) fn cancelled(&self) -> BoxFuture<'static, ()> {
        let own = self.token.clone().cancelled_owned();
        match self.linked.clone() {
            None => own.boxed(),
            Some(linked) => {
                let token = self.token.clone();
                future::select(Box::pin(own), Box::pin(linked.cancelled_owned()))
                    .map(move |_| token.cancel())
                    .boxed()
            }
        }
    }
}

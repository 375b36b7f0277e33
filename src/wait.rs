//! A single-resolution asynchronous condition wait.

use futures::future::{select, Either};
use futures::Future;
use futures_util::stream::{Stream, StreamExt};

/// Re-evaluates `check` on every wakeup until it yields a value or
/// `deadline` completes.
///
/// `check` runs once up front, then once per item of `wakeups`. The first
/// `Some` wins and is returned; `check` is never called again afterwards.
/// When the deadline fires first, or the wakeup stream ends, the result is
/// `None`. On return both `wakeups` and `deadline` have been dropped, which
/// is what tears down whatever drives them (observers, intervals, timers).
pub async fn until<T, C, S, D>(mut check: C, wakeups: S, deadline: D) -> Option<T>
where
    C: FnMut() -> Option<T>,
    S: Stream<Item = ()> + Unpin,
    D: Future<Output = ()> + Unpin,
{
    if let Some(found) = check() {
        return Some(found);
    }
    let probe = async move {
        let mut wakeups = wakeups;
        while wakeups.next().await.is_some() {
            if let Some(found) = check() {
                return Some(found);
            }
        }
        None
    };
    match select(Box::pin(probe), deadline).await {
        Either::Left((found, _deadline)) => found,
        Either::Right(((), _probe)) => None,
    }
}

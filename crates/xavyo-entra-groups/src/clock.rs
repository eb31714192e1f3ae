//! Cancellable waits shared by the retry and poll loops.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for `delay` unless `cancel` fires first.
///
/// Returns `false` if the wait was cut short by cancellation.
pub(crate) async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

// ── Reactive status stream ──
//
// Subscription type handed out by `DeviceSession::subscribe`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::RobotStatus;

/// A subscription to one device's status.
///
/// Provides point-in-time snapshot access and change notification, either
/// through [`changed`](Self::changed) or by converting into a `Stream`.
/// Dropping it unsubscribes.
pub struct StatusStream {
    current: Arc<RobotStatus>,
    receiver: watch::Receiver<Arc<RobotStatus>>,
}

impl StatusStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<RobotStatus>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// The snapshot seen last.
    pub fn current(&self) -> &Arc<RobotStatus> {
        &self.current
    }

    /// The latest snapshot (may have changed since the last `changed`).
    pub fn latest(&self) -> Arc<RobotStatus> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the device session
    /// is gone.
    pub async fn changed(&mut self) -> Option<Arc<RobotStatus>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` of snapshots, starting with the current one.
    pub fn into_stream(self) -> StatusWatchStream {
        StatusWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StatusWatchStream {
    inner: WatchStream<Arc<RobotStatus>>,
}

impl Stream for StatusWatchStream {
    type Item = Arc<RobotStatus>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

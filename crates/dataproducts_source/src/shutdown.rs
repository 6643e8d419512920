//! Close request and completion signals shared by a cursor and its teardown task.

use tokio::sync::watch;

/// A pair of one-way latches: "close now" and "has closed".
#[derive(Debug)]
pub(crate) struct ShutdownSignal {
    close_now: watch::Sender<bool>,
    has_closed: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        let (close_now, _) = watch::channel(false);
        let (has_closed, _) = watch::channel(false);
        Self {
            close_now,
            has_closed,
        }
    }

    pub(crate) fn request_close(&self) {
        self.close_now.send_replace(true);
    }

    pub(crate) fn is_close_requested(&self) -> bool {
        *self.close_now.borrow()
    }

    /// Resolves once a close has been requested.
    pub(crate) async fn close_requested(&self) {
        let mut rx = self.close_now.subscribe();
        let _ = rx.wait_for(|requested| *requested).await;
    }

    pub(crate) fn mark_closed(&self) {
        self.has_closed.send_replace(true);
    }

    /// Resolves once teardown has completed.
    pub(crate) async fn closed(&self) {
        let mut rx = self.has_closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

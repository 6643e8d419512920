//! Streaming query cursor.

use crate::config::SourceConfig;
use crate::driver::{RowSource, SourceFactory};
use crate::shutdown::ShutdownSignal;
use crate::{Result, SourceError};
use dataproducts_validator::DataRow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Lifecycle of a [`QueryCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Created, `connect` not yet called
    Unconnected,
    /// Query running, rows available
    Streaming,
    /// Result set exhausted or failed
    Drained,
    /// Resources released
    Closed,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CursorState::Unconnected => "unconnected",
            CursorState::Streaming => "streaming",
            CursorState::Drained => "drained",
            CursorState::Closed => "closed",
        };
        f.write_str(name)
    }
}

struct Inner {
    state: CursorState,
    source: Option<Box<dyn RowSource>>,
}

/// Runs one static query and yields its rows as attribute maps.
///
/// All operations serialize on one async mutex, so teardown happens exactly
/// once. A close request interrupts a `read` that is waiting on the database.
pub struct QueryCursor {
    factory: Arc<dyn SourceFactory>,
    inner: Arc<Mutex<Inner>>,
    signal: Arc<ShutdownSignal>,
}

impl QueryCursor {
    /// Creates a cursor for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Configuration`] if the configuration is invalid.
    pub fn new(config: SourceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_factory(Arc::new(config)))
    }

    /// Creates a cursor over a custom source factory.
    pub fn with_factory(factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            factory,
            inner: Arc::new(Mutex::new(Inner {
                state: CursorState::Unconnected,
                source: None,
            })),
            signal: Arc::new(ShutdownSignal::new()),
        }
    }

    /// Returns the current state.
    pub async fn state(&self) -> CursorState {
        self.inner.lock().await.state
    }

    /// Opens the connection and starts the query.
    ///
    /// A no-op if already connected.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connection`] after close, or any driver error
    /// raised while connecting or starting the query.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CursorState::Streaming | CursorState::Drained => return Ok(()),
            CursorState::Closed => {
                return Err(SourceError::Connection("cursor is closed".to_string()));
            }
            CursorState::Unconnected => {}
        }
        if self.signal.is_close_requested() {
            return Err(SourceError::Connection("cursor is closing".to_string()));
        }

        info!("Connecting {} query cursor", self.factory.describe());
        let source = self.factory.open().await?;
        inner.source = Some(source);
        inner.state = CursorState::Streaming;
        drop(inner);

        self.spawn_teardown();
        Ok(())
    }

    /// Reads the next row.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NotConnected`] before connect, after close, or when a
    ///   close request interrupts the read
    /// - [`SourceError::EndOfInput`] once every row has been read
    /// - any driver error, after which the cursor stops streaming
    pub async fn read(&self) -> Result<DataRow> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CursorState::Unconnected | CursorState::Closed => {
                return Err(SourceError::NotConnected);
            }
            CursorState::Drained => return Err(SourceError::EndOfInput),
            CursorState::Streaming => {}
        }

        let Some(source) = inner.source.as_mut() else {
            return Err(SourceError::NotConnected);
        };

        let next = tokio::select! {
            biased;
            _ = self.signal.close_requested() => return Err(SourceError::NotConnected),
            next = source.next_row() => next,
        };

        match next {
            Some(Ok(row)) => Ok(row),
            Some(Err(e)) => {
                warn!("Query cursor failed: {e}");
                release(&mut inner, CursorState::Drained).await;
                Err(e)
            }
            None => {
                debug!("Query cursor drained");
                release(&mut inner, CursorState::Drained).await;
                Err(SourceError::EndOfInput)
            }
        }
    }

    /// Closes the cursor, releasing the stream and connection exactly once.
    ///
    /// Waits until release completes or `cancel` resolves, whichever comes
    /// first. When `cancel` wins this returns [`SourceError::Cancelled`] and
    /// release continues in the background. Calling it again is harmless.
    pub async fn close<F>(&self, cancel: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.signal.request_close();

        let release = async {
            {
                let mut inner = self.inner.lock().await;
                if inner.state == CursorState::Unconnected {
                    inner.state = CursorState::Closed;
                    self.signal.mark_closed();
                }
            }
            self.signal.closed().await;
        };

        tokio::select! {
            biased;
            _ = release => {
                debug!("Query cursor close completed");
                Ok(())
            }
            _ = cancel => Err(SourceError::Cancelled),
        }
    }

    // Waits for a close request, then releases whatever the cursor still
    // holds. Runs detached so a close outlives a cancelled caller.
    fn spawn_teardown(&self) {
        let inner = Arc::clone(&self.inner);
        let signal = Arc::clone(&self.signal);
        tokio::spawn(async move {
            signal.close_requested().await;
            let mut guard = inner.lock().await;
            release(&mut guard, CursorState::Closed).await;
            drop(guard);
            signal.mark_closed();
            info!("Query cursor closed");
        });
    }
}

impl Drop for QueryCursor {
    fn drop(&mut self) {
        self.signal.request_close();
    }
}

impl fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCursor")
            .field("source", &self.factory.describe())
            .finish_non_exhaustive()
    }
}

async fn release(inner: &mut Inner, next: CursorState) {
    inner.state = next;
    if let Some(source) = inner.source.take() {
        if let Err(e) = source.close().await {
            warn!("Failed to release query source: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dataproducts_validator::DataValue;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        released: AtomicUsize,
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Rows(usize),
        FailAfter(usize),
        Hang,
        StuckClose,
    }

    struct MockFactory {
        behavior: Behavior,
        counters: Arc<Counters>,
    }

    struct MockSource {
        rows: VecDeque<Result<DataRow>>,
        hang: bool,
        stuck_close: bool,
        counters: Arc<Counters>,
    }

    fn row(n: usize) -> DataRow {
        DataRow::from([("n".to_string(), DataValue::Int(n as i64))])
    }

    #[async_trait]
    impl SourceFactory for MockFactory {
        async fn open(&self) -> Result<Box<dyn RowSource>> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            let mut rows: VecDeque<Result<DataRow>> = VecDeque::new();
            match self.behavior {
                Behavior::Rows(n) => rows.extend((0..n).map(|i| Ok(row(i)))),
                Behavior::StuckClose => rows.push_back(Ok(row(0))),
                Behavior::FailAfter(n) => {
                    rows.extend((0..n).map(|i| Ok(row(i))));
                    rows.push_back(Err(SourceError::Decode {
                        column: "n".to_string(),
                        message: "boom".to_string(),
                    }));
                    rows.push_back(Ok(row(99)));
                }
                Behavior::Hang => {}
            }
            Ok(Box::new(MockSource {
                rows,
                hang: matches!(self.behavior, Behavior::Hang),
                stuck_close: matches!(self.behavior, Behavior::StuckClose),
                counters: Arc::clone(&self.counters),
            }))
        }

        fn describe(&self) -> String {
            "mock".to_string()
        }
    }

    #[async_trait]
    impl RowSource for MockSource {
        async fn next_row(&mut self) -> Option<Result<DataRow>> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.rows.pop_front()
        }

        async fn close(self: Box<Self>) -> Result<()> {
            if self.stuck_close {
                std::future::pending::<()>().await;
            }
            self.counters.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn cursor(behavior: Behavior) -> (QueryCursor, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let factory = MockFactory {
            behavior,
            counters: Arc::clone(&counters),
        };
        (QueryCursor::with_factory(Arc::new(factory)), counters)
    }

    #[tokio::test]
    async fn test_read_before_connect() {
        let (cursor, counters) = cursor(Behavior::Rows(1));
        assert!(matches!(cursor.read().await, Err(SourceError::NotConnected)));
        assert_eq!(cursor.state().await, CursorState::Unconnected);
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (cursor, counters) = cursor(Behavior::Rows(1));
        cursor.connect().await.unwrap();
        cursor.connect().await.unwrap();
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(cursor.state().await, CursorState::Streaming);
    }

    #[tokio::test]
    async fn test_drain_repeats_end_of_input() {
        let (cursor, counters) = cursor(Behavior::Rows(2));
        cursor.connect().await.unwrap();

        assert_eq!(cursor.read().await.unwrap(), row(0));
        assert_eq!(cursor.read().await.unwrap(), row(1));
        assert!(cursor.read().await.unwrap_err().is_end_of_input());
        assert!(cursor.read().await.unwrap_err().is_end_of_input());
        assert_eq!(cursor.state().await, CursorState::Drained);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);

        cursor.close(std::future::pending()).await.unwrap();
        assert_eq!(cursor.state().await, CursorState::Closed);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_stops_streaming() {
        let (cursor, counters) = cursor(Behavior::FailAfter(1));
        cursor.connect().await.unwrap();

        assert_eq!(cursor.read().await.unwrap(), row(0));
        assert!(matches!(
            cursor.read().await,
            Err(SourceError::Decode { .. })
        ));
        assert!(cursor.read().await.unwrap_err().is_end_of_input());
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_releases_once() {
        let (cursor, counters) = cursor(Behavior::Rows(3));
        cursor.connect().await.unwrap();
        cursor.read().await.unwrap();

        cursor.close(std::future::pending()).await.unwrap();
        cursor.close(std::future::pending()).await.unwrap();

        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
        assert_eq!(cursor.state().await, CursorState::Closed);
        assert!(matches!(cursor.read().await, Err(SourceError::NotConnected)));
        assert!(matches!(
            cursor.connect().await,
            Err(SourceError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_close_unconnected() {
        let (cursor, counters) = cursor(Behavior::Rows(1));
        cursor.close(async {}).await.unwrap();
        assert_eq!(cursor.state().await, CursorState::Closed);
        assert!(cursor.connect().await.is_err());
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_interrupts_pending_read() {
        let (cursor, counters) = cursor(Behavior::Hang);
        let cursor = Arc::new(cursor);
        cursor.connect().await.unwrap();

        let reader = {
            let cursor = Arc::clone(&cursor);
            tokio::spawn(async move { cursor.read().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        cursor.close(std::future::pending()).await.unwrap();
        assert!(matches!(
            reader.await.unwrap(),
            Err(SourceError::NotConnected)
        ));
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_cancelled() {
        let (cursor, counters) = cursor(Behavior::StuckClose);
        cursor.connect().await.unwrap();

        let result = cursor.close(tokio::time::sleep(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(SourceError::Cancelled)));
        assert_eq!(counters.released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_requests_teardown() {
        let (cursor, counters) = cursor(Behavior::Rows(2));
        cursor.connect().await.unwrap();
        drop(cursor);

        for _ in 0..50 {
            if counters.released.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("source was not released after drop");
    }
}

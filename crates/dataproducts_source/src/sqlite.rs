//! SQLite row source.
//!
//! rusqlite is synchronous, so the query runs on a blocking thread and hands
//! rows over a bounded channel. The worker stops as soon as the receiver is
//! dropped.

use crate::driver::RowSource;
use crate::{Result, SourceError};
use async_trait::async_trait;
use dataproducts_validator::{DataRow, DataValue};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

pub(crate) struct SqliteSource {
    rows: mpsc::Receiver<Result<DataRow>>,
    worker: JoinHandle<()>,
}

impl SqliteSource {
    pub(crate) async fn open(dsn: &str, query: &str) -> Result<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (row_tx, rows) = mpsc::channel(1);
        let dsn = dsn.to_string();
        let query = query.to_string();

        let worker =
            tokio::task::spawn_blocking(move || run_query(&dsn, &query, ready_tx, row_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self { rows, worker }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SourceError::Connection(
                "SQLite worker exited before the query started".to_string(),
            )),
        }
    }
}

#[async_trait]
impl RowSource for SqliteSource {
    async fn next_row(&mut self) -> Option<Result<DataRow>> {
        self.rows.recv().await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let SqliteSource { rows, worker } = *self;
        drop(rows);
        worker
            .await
            .map_err(|e| SourceError::Connection(format!("SQLite worker failed: {e}")))
    }
}

fn run_query(
    dsn: &str,
    query: &str,
    ready: oneshot::Sender<Result<()>>,
    rows: mpsc::Sender<Result<DataRow>>,
) {
    let conn = match Connection::open(dsn) {
        Ok(conn) => conn,
        Err(e) => {
            let _ = ready.send(Err(SourceError::Connection(format!(
                "SQLite open failed: {e}"
            ))));
            return;
        }
    };

    let mut stmt = match conn.prepare(query) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut cursor = match stmt.query([]) {
        Ok(cursor) => cursor,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }
    debug!("SQLite query started ({} columns)", names.len());

    loop {
        let item = match cursor.next() {
            Ok(Some(row)) => decode_row(row, &names),
            Ok(None) => break,
            Err(e) => Err(e.into()),
        };
        let failed = item.is_err();
        if rows.blocking_send(item).is_err() || failed {
            break;
        }
    }
    debug!("SQLite worker finished");
}

fn decode_row(row: &rusqlite::Row<'_>, names: &[String]) -> Result<DataRow> {
    let mut out = DataRow::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        let value = match row.get_ref(idx)? {
            ValueRef::Null => DataValue::Null,
            ValueRef::Integer(v) => DataValue::Int(v),
            ValueRef::Real(v) => DataValue::Float(v),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                DataValue::String(String::from_utf8_lossy(bytes).into_owned())
            }
        };
        out.insert(name.clone(), value);
    }
    Ok(out)
}

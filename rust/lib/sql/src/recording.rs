use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Value};

/// Whether a logged statement read or wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Exec,
}

/// A statement as it reached the backend.
#[derive(Debug, Clone)]
pub struct LoggedStatement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
}

/// RecordingStore wraps another SQLStore and keeps every statement it
/// forwards, in order. Used to audit which statements an operation
/// issued (and to assert that some operations issue none).
pub struct RecordingStore<S: SQLStore> {
    inner: S,
    log: Mutex<Vec<LoggedStatement>>,
}

impl<S: SQLStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
        }
    }

    fn log(&self) -> MutexGuard<'_, Vec<LoggedStatement>> {
        // A panicking test thread must not hide the statements logged so far.
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, kind: StatementKind, sql: &str, params: &[Value]) {
        debug!("RecordingStore: {:?} {} ({} params)", kind, sql, params.len());
        self.log().push(LoggedStatement {
            kind,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }

    /// All statements forwarded so far.
    pub fn statements(&self) -> Vec<LoggedStatement> {
        self.log().clone()
    }

    /// Only the INSERT/UPDATE/DELETE statements.
    pub fn writes(&self) -> Vec<LoggedStatement> {
        self.log()
            .iter()
            .filter(|s| s.kind == StatementKind::Exec)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log().is_empty()
    }

    pub fn clear(&self) {
        self.log().clear();
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SQLStore> SQLStore for RecordingStore<S> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        self.record(StatementKind::Query, sql, params);
        self.inner.query(sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        self.record(StatementKind::Exec, sql, params);
        self.inner.exec(sql, params)
    }

    // Batches are DDL and transaction control; they are forwarded but not logged.
    fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
        self.inner.exec_batch(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;

    #[test]
    fn records_in_order_and_splits_writes() {
        let store = RecordingStore::new(SqliteStore::open_in_memory().unwrap());
        store.exec_batch("CREATE TABLE t (x INTEGER);").unwrap();
        assert!(store.is_empty());

        store.exec("INSERT INTO t VALUES (?)", &[Value::Integer(1)]).unwrap();
        store.query("SELECT x FROM t", &[]).unwrap();

        let all = store.statements();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, StatementKind::Exec);
        assert_eq!(all[0].params, vec![Value::Integer(1)]);
        assert_eq!(all[1].sql, "SELECT x FROM t");
        assert_eq!(store.writes().len(), 1);

        store.clear();
        assert_eq!(store.len(), 0);
    }
}

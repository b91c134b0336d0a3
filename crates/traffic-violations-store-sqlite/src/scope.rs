use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::{Connection, OptionalExtension, Params, Row};
use tracing::{debug, debug_span, warn};
use traffic_violations_core::DatabaseSettings;

use crate::error::StoreError;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Opens one connection per call and runs the body inside a single
/// transaction.
///
/// The body's `Ok` commits, its `Err` rolls back, and a panic unwinds
/// through the transaction's drop which also rolls back. The connection is
/// closed on every path when it goes out of scope.
#[derive(Debug, Clone)]
pub struct ConnectionScope {
    settings: DatabaseSettings,
}

impl ConnectionScope {
    #[must_use]
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Runs `body` against a fresh connection and transaction.
    ///
    /// # Errors
    /// Returns [`StoreError::Connection`] when the database cannot be opened
    /// (the body is never entered), the body's own error after rolling back,
    /// or [`StoreError::Storage`] when beginning or committing fails.
    pub fn with_connection<T, F>(&self, operation: &'static str, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ScopeHandle<'_>) -> Result<T, StoreError>,
    {
        let scope_id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        let span = debug_span!("connection_scope", scope_id, operation);
        let _entered = span.enter();

        let mut conn = open_connection(&self.settings)?;
        let tx = conn
            .transaction()
            .map_err(StoreError::storage("begin transaction"))?;

        let outcome = body(&ScopeHandle {
            conn: &tx,
            operation,
        });

        match outcome {
            Ok(value) => {
                tx.commit().map_err(StoreError::storage("commit transaction"))?;
                debug!("scope committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed; connection closed regardless");
                } else {
                    debug!(error = %err, "scope rolled back");
                }
                Err(err)
            }
        }
    }
}

/// Narrow statement surface handed to a scope body.
pub struct ScopeHandle<'s> {
    conn: &'s Connection,
    operation: &'static str,
}

impl ScopeHandle<'_> {
    /// # Errors
    /// Returns [`StoreError::Storage`] when the statement fails.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, StoreError> {
        self.conn
            .execute(sql, params)
            .map_err(StoreError::storage(self.operation))
    }

    /// # Errors
    /// Returns [`StoreError::Storage`] when any statement in the batch fails.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn
            .execute_batch(sql)
            .map_err(StoreError::storage(self.operation))
    }

    /// # Errors
    /// Returns [`StoreError::Storage`] when preparing, stepping, or mapping a
    /// row fails.
    pub fn fetch_all<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>, StoreError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        collect_rows(self.conn, sql, params, map).map_err(StoreError::storage(self.operation))
    }

    /// First row of the result, if any.
    ///
    /// # Errors
    /// Returns [`StoreError::Storage`] when preparing, stepping, or mapping the
    /// row fails.
    pub fn fetch_one<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Option<T>, StoreError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.conn
            .prepare(sql)
            .and_then(|mut stmt| stmt.query_row(params, map).optional())
            .map_err(StoreError::storage(self.operation))
    }

    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }
}

fn open_connection(settings: &DatabaseSettings) -> Result<Connection, StoreError> {
    let connection_error = |source| StoreError::Connection {
        path: settings.path.clone(),
        source,
    };

    let conn = Connection::open(&settings.path).map_err(connection_error)?;

    // journal_mode touches the file, so an unreachable database fails here
    // rather than inside the body.
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(connection_error)?;

    Ok(conn)
}

fn collect_rows<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use rusqlite::params;

    use super::*;
    use crate::test_support::TempDb;

    fn must<T>(result: Result<T, StoreError>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err}"),
        }
    }

    fn fixture_scope(db: &TempDb) -> ConnectionScope {
        let scope = ConnectionScope::new(db.settings());
        must(scope.with_connection("create fixture table", |handle| {
            handle.execute_batch("CREATE TABLE IF NOT EXISTS items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
        }));
        scope
    }

    fn count_items(scope: &ConnectionScope) -> i64 {
        must(scope.with_connection("count items", |handle| {
            handle
                .fetch_one("SELECT COUNT(*) FROM items", [], |row| row.get(0))
                .map(Option::unwrap_or_default)
        }))
    }

    #[test]
    fn successful_body_commits() {
        let db = TempDb::new("scope-commit");
        let scope = fixture_scope(&db);

        let inserted = must(scope.with_connection("insert item", |handle| {
            handle.execute("INSERT INTO items(name) VALUES (?1)", params!["first"])?;
            Ok(handle.last_insert_rowid())
        }));

        assert_eq!(inserted, 1);
        assert_eq!(count_items(&scope), 1);
        assert!(db.path().exists());
    }

    #[test]
    fn failing_body_rolls_back_every_statement() {
        let db = TempDb::new("scope-rollback");
        let scope = fixture_scope(&db);

        let result: Result<(), StoreError> = scope.with_connection("insert then fail", |handle| {
            handle.execute("INSERT INTO items(name) VALUES (?1)", params!["kept?"])?;
            handle.execute("INSERT INTO missing_table(name) VALUES (?1)", params!["boom"])?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(count_items(&scope), 0);
    }

    #[test]
    fn panicking_body_rolls_back() {
        let db = TempDb::new("scope-panic");
        let scope = fixture_scope(&db);

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), StoreError> = scope.with_connection("insert then panic", |handle| {
                handle.execute("INSERT INTO items(name) VALUES (?1)", params!["lost"])?;
                panic!("body aborted");
            });
        }));

        assert!(unwound.is_err());
        assert_eq!(count_items(&scope), 0);
    }

    #[test]
    fn unreachable_database_never_enters_body() {
        let settings = DatabaseSettings {
            path: TempDb::unreachable_path(),
        };
        let scope = ConnectionScope::new(settings);
        let mut entered = false;

        let result = scope.with_connection("probe", |_| {
            entered = true;
            Ok(())
        });

        match result {
            Err(err) => assert!(err.is_connection(), "unexpected error kind: {err}"),
            Ok(()) => panic!("expected connection failure"),
        }
        assert!(!entered);
    }

    #[test]
    fn fetch_one_returns_none_for_empty_result() {
        let db = TempDb::new("scope-fetch-one");
        let scope = fixture_scope(&db);

        let row: Option<String> = must(scope.with_connection("fetch missing", |handle| {
            handle.fetch_one("SELECT name FROM items WHERE id = ?1", params![42], |row| {
                row.get(0)
            })
        }));

        assert!(row.is_none());
    }
}

use rusqlite::params;
use tracing::info;
use traffic_violations_core::FieldSchema;

use crate::error::StoreError;
use crate::scope::ConnectionScope;

pub const VIOLATIONS_TABLE: &str = "traffic_violations";

const SCHEMA_MIGRATION_VERSION: i64 = 1;

const SCHEMA_MIGRATIONS_DDL: &str = "
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

/// Creates the violations table if missing and checks that an existing table
/// still lists its columns in schema order.
///
/// # Errors
/// Returns [`StoreError::Connection`] when the database is unreachable,
/// [`StoreError::SchemaMismatch`] when the stored column order diverges from
/// `schema`, or [`StoreError::Storage`] when a DDL statement fails.
pub fn initialize_schema(scope: &ConnectionScope, schema: &FieldSchema) -> Result<(), StoreError> {
    let ddl = violations_table_ddl(schema);

    scope.with_connection("initialize schema", |handle| {
        handle.execute_batch(SCHEMA_MIGRATIONS_DDL)?;
        handle.execute_batch(&ddl)?;

        let found: Vec<String> = handle.fetch_all(
            &format!("PRAGMA table_info({VIOLATIONS_TABLE})"),
            [],
            |row| row.get::<_, String>(1),
        )?;
        let expected: Vec<String> = std::iter::once("id")
            .chain(schema.columns())
            .map(str::to_string)
            .collect();
        if found != expected {
            return Err(StoreError::SchemaMismatch {
                table: VIOLATIONS_TABLE,
                expected,
                found,
            });
        }

        let registered = handle.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, applied_at)
             VALUES (?1, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))",
            params![SCHEMA_MIGRATION_VERSION],
        )?;
        if registered > 0 {
            info!(version = SCHEMA_MIGRATION_VERSION, "registered violations schema");
        }

        Ok(())
    })
}

fn violations_table_ddl(schema: &FieldSchema) -> String {
    let columns = schema
        .columns()
        .iter()
        .map(|column| format!("  {column} TEXT NOT NULL"))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "CREATE TABLE IF NOT EXISTS {VIOLATIONS_TABLE} (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n{columns}\n);"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempDb;

    fn must<T>(result: Result<T, StoreError>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err}"),
        }
    }

    #[test]
    fn ddl_lists_id_then_every_column_in_order() {
        let ddl = violations_table_ddl(&FieldSchema::traffic_violation());
        let plate = ddl.find("PlateNumber").unwrap_or(usize::MAX);
        let violation_type = ddl.find("Violation_Type").unwrap_or(0);
        assert!(ddl.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(plate < violation_type);
    }

    #[test]
    fn initialization_is_idempotent() {
        let db = TempDb::new("schema-idempotent");
        let scope = ConnectionScope::new(db.settings());
        let schema = FieldSchema::traffic_violation();

        must(initialize_schema(&scope, &schema));
        must(initialize_schema(&scope, &schema));

        let versions: Vec<i64> = must(scope.with_connection("list migrations", |handle| {
            handle.fetch_all("SELECT version FROM schema_migrations", [], |row| row.get(0))
        }));
        assert_eq!(versions, vec![SCHEMA_MIGRATION_VERSION]);
    }

    #[test]
    fn reordered_existing_table_is_rejected() {
        let db = TempDb::new("schema-mismatch");
        let scope = ConnectionScope::new(db.settings());
        must(scope.with_connection("create legacy table", |handle| {
            handle.execute_batch(
                "CREATE TABLE traffic_violations (id INTEGER PRIMARY KEY, DriverName TEXT, PlateNumber TEXT);",
            )
        }));

        match initialize_schema(&scope, &FieldSchema::traffic_violation()) {
            Err(StoreError::SchemaMismatch { found, .. }) => {
                assert_eq!(found, vec!["id", "DriverName", "PlateNumber"]);
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(()) => panic!("expected schema mismatch"),
        }
    }
}

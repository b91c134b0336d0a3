use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Row};
use tracing::{debug, warn};
use traffic_violations_core::{
    DatabaseSettings, FieldSchema, ValidatedRecord, ViolationId, ViolationRecord,
};

use crate::error::StoreError;
use crate::schema::VIOLATIONS_TABLE;
use crate::scope::ConnectionScope;

/// Labels whose columns take part in substring search.
pub const SEARCH_LABELS: [&str; 3] = ["Plate Number", "Driver Name", "Charge"];

/// Generic CRUD capability set. Each call runs inside exactly one
/// [`ConnectionScope`].
pub trait Repository {
    type Id;
    type Record;
    type Input;

    fn get_all(&self) -> Result<Vec<Self::Record>, StoreError>;

    fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Record>, StoreError>;

    /// Inserts one record and returns the identifier the store assigned.
    fn create(&self, input: &Self::Input) -> Result<Self::Id, StoreError>;

    /// Overwrites every editable field. Returns rows affected; zero means no
    /// record had `id`, which is not an error.
    fn update(&self, id: Self::Id, input: &Self::Input) -> Result<usize, StoreError>;

    /// Removes the record. Returns rows affected; zero is not an error.
    fn delete(&self, id: Self::Id) -> Result<usize, StoreError>;
}

pub trait ViolationRepository:
    Repository<Id = ViolationId, Record = ViolationRecord, Input = ValidatedRecord>
{
    /// Literal, ASCII case-insensitive substring match on plate number,
    /// driver name, or charge. An empty term matches every record.
    fn search(&self, term: &str) -> Result<Vec<ViolationRecord>, StoreError>;
}

#[derive(Debug, Clone)]
struct Statements {
    select_all: String,
    select_by_id: String,
    search: String,
    insert: String,
    update: String,
    delete: String,
}

impl Statements {
    // Only schema column names are interpolated; every value is bound.
    fn for_schema(schema: &FieldSchema) -> Self {
        let columns = schema.columns();
        let column_list = columns.join(", ");
        let select = format!("SELECT id, {column_list} FROM {VIOLATIONS_TABLE}");

        let search_predicate = SEARCH_LABELS
            .iter()
            .filter_map(|label| schema.column_for(label))
            .map(|column| format!("{column} LIKE ?1 ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");

        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            select_all: format!("{select} ORDER BY id ASC"),
            select_by_id: format!("{select} WHERE id = ?1"),
            search: format!("{select} WHERE {search_predicate} ORDER BY id ASC"),
            insert: format!(
                "INSERT INTO {VIOLATIONS_TABLE} ({column_list}) VALUES ({placeholders})"
            ),
            update: format!(
                "UPDATE {VIOLATIONS_TABLE} SET {assignments} WHERE id = ?{}",
                columns.len() + 1
            ),
            delete: format!("DELETE FROM {VIOLATIONS_TABLE} WHERE id = ?1"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteViolationRepository {
    scope: ConnectionScope,
    field_count: usize,
    statements: Statements,
}

impl SqliteViolationRepository {
    #[must_use]
    pub fn new(settings: DatabaseSettings, schema: &FieldSchema) -> Self {
        Self {
            scope: ConnectionScope::new(settings),
            field_count: schema.len(),
            statements: Statements::for_schema(schema),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }
}

impl Repository for SqliteViolationRepository {
    type Id = ViolationId;
    type Record = ViolationRecord;
    type Input = ValidatedRecord;

    fn get_all(&self) -> Result<Vec<ViolationRecord>, StoreError> {
        let field_count = self.field_count;
        let records = self
            .scope
            .with_connection("fetch violation records", |handle| {
                handle.fetch_all(&self.statements.select_all, [], |row| {
                    parse_violation_row(row, field_count)
                })
            })
            .inspect_err(|err| warn!(error = %err, "get_all failed"))?;

        debug!(count = records.len(), "fetched violation records");
        Ok(records)
    }

    fn get_by_id(&self, id: ViolationId) -> Result<Option<ViolationRecord>, StoreError> {
        let field_count = self.field_count;
        self.scope
            .with_connection("fetch violation record", |handle| {
                handle.fetch_one(&self.statements.select_by_id, params![id.0], |row| {
                    parse_violation_row(row, field_count)
                })
            })
            .inspect_err(|err| warn!(%id, error = %err, "get_by_id failed"))
    }

    fn create(&self, input: &ValidatedRecord) -> Result<ViolationId, StoreError> {
        let id = self
            .scope
            .with_connection("add violation record", |handle| {
                handle.execute(&self.statements.insert, params_from_iter(input.values()))?;
                Ok(ViolationId(handle.last_insert_rowid()))
            })
            .inspect_err(|err| warn!(error = %err, "create failed"))?;

        debug!(%id, "created violation record");
        Ok(id)
    }

    fn update(&self, id: ViolationId, input: &ValidatedRecord) -> Result<usize, StoreError> {
        let bound = input
            .values()
            .iter()
            .map(|value| SqlValue::Text(value.clone()))
            .chain(std::iter::once(SqlValue::Integer(id.0)));

        let affected = self
            .scope
            .with_connection("update violation record", |handle| {
                handle.execute(&self.statements.update, params_from_iter(bound))
            })
            .inspect_err(|err| warn!(%id, error = %err, "update failed"))?;

        debug!(%id, affected, "updated violation record");
        Ok(affected)
    }

    fn delete(&self, id: ViolationId) -> Result<usize, StoreError> {
        let affected = self
            .scope
            .with_connection("delete violation record", |handle| {
                handle.execute(&self.statements.delete, params![id.0])
            })
            .inspect_err(|err| warn!(%id, error = %err, "delete failed"))?;

        debug!(%id, affected, "deleted violation record");
        Ok(affected)
    }
}

impl ViolationRepository for SqliteViolationRepository {
    fn search(&self, term: &str) -> Result<Vec<ViolationRecord>, StoreError> {
        let pattern = format!("%{}%", escape_like(term));
        let field_count = self.field_count;
        let records = self
            .scope
            .with_connection("search violation records", |handle| {
                handle.fetch_all(&self.statements.search, params![pattern], |row| {
                    parse_violation_row(row, field_count)
                })
            })
            .inspect_err(|err| warn!(error = %err, "search failed"))?;

        debug!(count = records.len(), "searched violation records");
        Ok(records)
    }
}

fn parse_violation_row(row: &Row<'_>, field_count: usize) -> rusqlite::Result<ViolationRecord> {
    let id: i64 = row.get(0)?;
    let values = (1..=field_count)
        .map(|index| row.get::<_, String>(index))
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ViolationRecord {
        id: ViolationId(id),
        values,
    })
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

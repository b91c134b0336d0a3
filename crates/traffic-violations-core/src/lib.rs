//! Record model for traffic-violation management.
//!
//! Everything here is pure: the field schema shared by every layer, the
//! validator that gates writes, the credential check, and the configuration
//! values the outer layers construct once and pass down by reference.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Display label of the storage-assigned identifier column.
pub const ID_LABEL: &str = "ID";

/// Number of user-editable fields on a violation record.
pub const EDITABLE_FIELD_COUNT: usize = 24;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ValidationError {
    #[error("please fill in the field: {0}")]
    EmptyField(String),
    #[error("{0} must be a valid integer number")]
    InvalidInteger(String),
    #[error("{0} must be a valid number")]
    InvalidNumber(String),
    #[error("field count mismatch: expected {expected} values, got {actual}")]
    FieldCountMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
}

impl FieldKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "integer" => Some(Self::Integer),
            "decimal" => Some(Self::Decimal),
            _ => None,
        }
    }
}

/// One editable field: its display label, its storage column, and how its
/// raw value must parse.
#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
pub struct FieldSpec {
    pub label: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn text(label: &'static str, column: &'static str) -> Self {
        Self {
            label,
            column,
            kind: FieldKind::Text,
        }
    }

    const fn integer(label: &'static str, column: &'static str) -> Self {
        Self {
            label,
            column,
            kind: FieldKind::Integer,
        }
    }

    const fn decimal(label: &'static str, column: &'static str) -> Self {
        Self {
            label,
            column,
            kind: FieldKind::Decimal,
        }
    }
}

// Position is the contract: validation, storage columns and display all index
// into this table.
const TRAFFIC_VIOLATION_FIELDS: [FieldSpec; EDITABLE_FIELD_COUNT] = [
    FieldSpec::text("Plate Number", "PlateNumber"),
    FieldSpec::text("Driver Name", "DriverName"),
    FieldSpec::text("Description", "Description"),
    FieldSpec::text("Belts", "Belts"),
    FieldSpec::text("Personal Injury", "Personal_Injury"),
    FieldSpec::text("Property Damage", "Property_Damage"),
    FieldSpec::text("Commercial License", "Commercial_License"),
    FieldSpec::text("Commercial Vehicle", "Commercial_Vehicle"),
    FieldSpec::text("State", "State"),
    FieldSpec::text("Vehicle Type", "VehicleType"),
    FieldSpec::integer("Year", "Year"),
    FieldSpec::text("Make", "Make"),
    FieldSpec::text("Model", "Model"),
    FieldSpec::text("Color", "Color"),
    FieldSpec::text("Charge", "Charge"),
    FieldSpec::decimal("Penalty Amount", "PenaltyAmount"),
    FieldSpec::text("Contributed To Accident", "Contributed_To_Accident"),
    FieldSpec::text("Race", "Race"),
    FieldSpec::text("Gender", "Gender"),
    FieldSpec::text("Driver City", "Driver_City"),
    FieldSpec::text("Driver State", "Driver_State"),
    FieldSpec::text("DL State", "DL_State"),
    FieldSpec::text("Arrest Type", "Arrest_Type"),
    FieldSpec::text("Violation Type", "Violation_Type"),
];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FieldSchema {
    fields: &'static [FieldSpec],
}

impl FieldSchema {
    #[must_use]
    pub const fn traffic_violation() -> Self {
        Self {
            fields: &TRAFFIC_VIOLATION_FIELDS,
        }
    }

    /// Editable fields in schema order.
    #[must_use]
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All display labels, identifier first.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        std::iter::once(ID_LABEL)
            .chain(self.fields.iter().map(|field| field.label))
            .collect()
    }

    #[must_use]
    pub fn editable_labels(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.label).collect()
    }

    #[must_use]
    pub fn columns(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.column).collect()
    }

    #[must_use]
    pub fn integer_fields(&self) -> Vec<&'static str> {
        self.labels_of_kind(FieldKind::Integer)
    }

    #[must_use]
    pub fn decimal_fields(&self) -> Vec<&'static str> {
        self.labels_of_kind(FieldKind::Decimal)
    }

    /// Kind of the field with `label`. Labels outside the schema are text.
    #[must_use]
    pub fn kind_of(&self, label: &str) -> FieldKind {
        self.field(label).map_or(FieldKind::Text, |field| field.kind)
    }

    #[must_use]
    pub fn column_for(&self, label: &str) -> Option<&'static str> {
        self.field(label).map(|field| field.column)
    }

    #[must_use]
    pub fn position_of(&self, label: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.label == label)
    }

    fn field(&self, label: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.label == label)
    }

    fn labels_of_kind(&self, kind: FieldKind) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|field| field.kind == kind)
            .map(|field| field.label)
            .collect()
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::traffic_violation()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct ViolationId(pub i64);

impl Display for ViolationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored violation: the identifier plus the editable values in schema order.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ViolationRecord {
    pub id: ViolationId,
    pub values: Vec<String>,
}

impl ViolationRecord {
    #[must_use]
    pub fn value(&self, schema: &FieldSchema, label: &str) -> Option<&str> {
        if label == ID_LABEL {
            return None;
        }
        schema
            .position_of(label)
            .and_then(|index| self.values.get(index))
            .map(String::as_str)
    }
}

/// Trimmed values that passed [`Validator`] checks. Only the validator can
/// build one, so holding it proves the write payload is well formed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ValidatedRecord {
    values: Vec<String>,
}

impl ValidatedRecord {
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    schema: &'a FieldSchema,
}

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self { schema }
    }

    /// Validates a full editable payload against the schema's own labels.
    ///
    /// # Errors
    /// Returns [`ValidationError::FieldCountMismatch`] unless exactly one value
    /// per editable field is supplied, otherwise the first completeness or
    /// typing failure in schema order.
    pub fn validate<S: AsRef<str>>(&self, values: &[S]) -> Result<ValidatedRecord, ValidationError> {
        let labels = self.schema.editable_labels();
        self.validate_record(values, &labels)
    }

    /// Checks completeness first, then typing, each pass stopping at the first
    /// failing field.
    ///
    /// # Errors
    /// Returns [`ValidationError::FieldCountMismatch`] when `values` and
    /// `labels` are not aligned, [`ValidationError::EmptyField`] for a blank
    /// value, and [`ValidationError::InvalidInteger`] or
    /// [`ValidationError::InvalidNumber`] for a value that does not parse as
    /// its field kind requires.
    pub fn validate_record<S, L>(
        &self,
        values: &[S],
        labels: &[L],
    ) -> Result<ValidatedRecord, ValidationError>
    where
        S: AsRef<str>,
        L: AsRef<str>,
    {
        if values.len() != labels.len() {
            return Err(ValidationError::FieldCountMismatch {
                expected: labels.len(),
                actual: values.len(),
            });
        }

        let trimmed: Vec<&str> = values.iter().map(|value| value.as_ref().trim()).collect();

        for (value, label) in trimmed.iter().zip(labels) {
            if value.is_empty() {
                return Err(ValidationError::EmptyField(label.as_ref().to_string()));
            }
        }

        for (value, label) in trimmed.iter().zip(labels) {
            let label = label.as_ref();
            match self.schema.kind_of(label) {
                FieldKind::Integer if !is_integer(value) => {
                    return Err(ValidationError::InvalidInteger(label.to_string()));
                }
                FieldKind::Decimal if !is_decimal(value) => {
                    return Err(ValidationError::InvalidNumber(label.to_string()));
                }
                _ => {}
            }
        }

        Ok(ValidatedRecord {
            values: trimmed.into_iter().map(str::to_string).collect(),
        })
    }
}

// Integers are bounded to i64, the widest integer SQLite stores natively.
fn is_integer(value: &str) -> bool {
    value.parse::<i64>().is_ok()
}

// Any finite real number, in plain or scientific notation.
fn is_decimal(value: &str) -> bool {
    value.parse::<f64>().is_ok_and(f64::is_finite)
}

#[derive(Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct AuthSettings {
    pub username: String,
    pub password: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin123".to_string(),
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./traffic_violations.sqlite3"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
}

impl AppConfig {
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when the database path or either
    /// credential is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database.path MUST be provided".to_string(),
            ));
        }

        if self.auth.username.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.username MUST be provided".to_string(),
            ));
        }

        if self.auth.password.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.password MUST be provided".to_string(),
            ));
        }

        Ok(())
    }
}

/// Single credential gate. Comparison is exact and case-sensitive.
#[derive(Debug, Clone, Copy)]
pub struct AuthCheck<'a> {
    settings: &'a AuthSettings,
}

impl<'a> AuthCheck<'a> {
    #[must_use]
    pub fn new(settings: &'a AuthSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn from_config(config: &'a AppConfig) -> Self {
        Self::new(&config.auth)
    }

    #[must_use]
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        username == self.settings.username && password == self.settings.password
    }
}

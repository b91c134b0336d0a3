use tracing::info;
use traffic_violations_core::{
    AppConfig, FieldSchema, ValidatedRecord, ValidationError, Validator, ViolationId,
    ViolationRecord,
};

use crate::error::StoreError;
use crate::repository::{SqliteViolationRepository, ViolationRepository};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates raw payloads and delegates to the repository.
///
/// A payload that fails validation never reaches the repository. Read
/// operations pass repository results through unchanged.
#[derive(Debug, Clone)]
pub struct ViolationService<R> {
    schema: FieldSchema,
    repository: R,
}

impl ViolationService<SqliteViolationRepository> {
    #[must_use]
    pub fn sqlite(config: &AppConfig) -> Self {
        let schema = FieldSchema::traffic_violation();
        let repository = SqliteViolationRepository::new(config.database.clone(), &schema);
        Self::new(schema, repository)
    }
}

impl<R: ViolationRepository> ViolationService<R> {
    #[must_use]
    pub fn new(schema: FieldSchema, repository: R) -> Self {
        Self { schema, repository }
    }

    #[must_use]
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// # Errors
    /// Returns [`ServiceError::Store`] when the repository fails.
    pub fn get_all_violations(&self) -> Result<Vec<ViolationRecord>, ServiceError> {
        Ok(self.repository.get_all()?)
    }

    /// # Errors
    /// Returns [`ServiceError::Store`] when the repository fails.
    pub fn search_violations(&self, term: &str) -> Result<Vec<ViolationRecord>, ServiceError> {
        Ok(self.repository.search(term)?)
    }

    /// # Errors
    /// Returns [`ServiceError::Store`] when the repository fails.
    pub fn get_violation(&self, id: ViolationId) -> Result<Option<ViolationRecord>, ServiceError> {
        Ok(self.repository.get_by_id(id)?)
    }

    /// # Errors
    /// Returns [`ServiceError::Validation`] for a malformed payload, or
    /// [`ServiceError::Store`] when the insert fails.
    pub fn create_violation<S: AsRef<str>>(&self, raw: &[S]) -> Result<ViolationId, ServiceError> {
        let record = self.validate(raw, "create")?;
        Ok(self.repository.create(&record)?)
    }

    /// Returns rows affected; zero means no record had `id`.
    ///
    /// # Errors
    /// Returns [`ServiceError::Validation`] for a malformed payload, or
    /// [`ServiceError::Store`] when the update fails.
    pub fn update_violation<S: AsRef<str>>(
        &self,
        id: ViolationId,
        raw: &[S],
    ) -> Result<usize, ServiceError> {
        let record = self.validate(raw, "update")?;
        Ok(self.repository.update(id, &record)?)
    }

    /// Returns rows affected; zero means no record had `id`.
    ///
    /// # Errors
    /// Returns [`ServiceError::Store`] when the delete fails.
    pub fn delete_violation(&self, id: ViolationId) -> Result<usize, ServiceError> {
        Ok(self.repository.delete(id)?)
    }

    fn validate<S: AsRef<str>>(
        &self,
        raw: &[S],
        action: &'static str,
    ) -> Result<ValidatedRecord, ValidationError> {
        Validator::new(&self.schema)
            .validate(raw)
            .inspect_err(|err| info!(action, reason = %err, "rejected violation payload"))
    }
}

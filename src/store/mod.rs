mod db_setup;
mod sqlite;
#[cfg(test)]
mod tests;

use crate::error::StoreError;
use crate::model::{CanonicalRecord, RecordFilters, RecordPatch, RecordStats};

pub use sqlite::{NewUpload, SqliteRecordStore};

pub const DB_SCHEMA_VERSION: &str = "1.1.0";

/// Persistent home of canonical records. Every call stands on its own: a
/// failed insert leaves earlier inserts in place.
pub trait RecordStore {
    /// Persists `record` and returns the id the store assigned to it.
    fn insert(&mut self, record: &CanonicalRecord) -> Result<i64, StoreError>;

    /// Matching records, newest `date_created` first, then highest id.
    fn find_all(&self, filters: &RecordFilters) -> Result<Vec<CanonicalRecord>, StoreError>;

    fn find_by_id(&self, id: i64) -> Result<Option<CanonicalRecord>, StoreError>;

    /// Returns `false` when no record has `id`.
    fn update(&mut self, id: i64, patch: &RecordPatch) -> Result<bool, StoreError>;

    /// Returns `false` when no record has `id`.
    fn delete(&mut self, id: i64) -> Result<bool, StoreError>;

    fn stats(&self) -> Result<RecordStats, StoreError>;

    fn find_by_metrc_tag(&self, tag: &str) -> Result<Vec<CanonicalRecord>, StoreError> {
        let filters = RecordFilters {
            metrc_tag: Some(tag.to_string()),
            ..RecordFilters::default()
        };
        Ok(self
            .find_all(&filters)?
            .into_iter()
            .filter(|record| record.metrc_tag == tag)
            .collect())
    }
}

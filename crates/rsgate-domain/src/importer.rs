//! Batch import of externally supplied codes.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use rsgate_storage::{CodeRecord, CodeStore};

use crate::code::{canonicalize, DEFAULT_CODE_LENGTH};
use crate::error::AccessResult;

/// Counts reported by an import run.
///
/// Every input entry is accounted for: `found` splits into `invalid`
/// plus canonical entries, of which `unique_after_dedupe` remain after
/// in-memory dedupe, and those split into `already_existing` plus
/// `imported`. Partial success is never silent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Entries in the input, before any processing.
    pub found: usize,
    /// Distinct canonical codes after dropping invalid entries.
    pub unique_after_dedupe: usize,
    /// Entries that failed canonicalization.
    pub invalid: usize,
    /// Codes already present in the store, including rows that lost an
    /// insert race to a concurrent writer.
    pub already_existing: usize,
    /// Rows actually written by this run.
    pub imported: u64,
}

/// Deduplicates and inserts an externally supplied list of codes under
/// a given batch number.
///
/// Idempotent: re-running with identical input imports nothing further.
pub struct BatchImporter<S> {
    store: Arc<S>,
    code_length: usize,
}

impl<S: CodeStore> BatchImporter<S> {
    /// Creates an importer expecting the default code length.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_length(store, DEFAULT_CODE_LENGTH)
    }

    /// Creates an importer expecting codes of `code_length` characters.
    pub fn with_length(store: Arc<S>, code_length: usize) -> Self {
        Self { store, code_length }
    }

    /// Imports `raw_codes` under `batch`.
    #[instrument(skip(self, raw_codes), fields(found = raw_codes.len()))]
    pub async fn import_batch(
        &self,
        raw_codes: &[String],
        batch: i64,
    ) -> AccessResult<ImportSummary> {
        let mut summary = ImportSummary {
            found: raw_codes.len(),
            ..Default::default()
        };

        // Canonicalize and dedupe in-memory; the same code appearing
        // twice in one input file must not count as already-existing.
        let mut seen: HashSet<String> = HashSet::with_capacity(raw_codes.len());
        let mut unique: Vec<String> = Vec::with_capacity(raw_codes.len());
        for raw in raw_codes {
            match canonicalize(raw, self.code_length) {
                Ok(code) => {
                    if seen.insert(code.clone()) {
                        unique.push(code);
                    }
                }
                Err(_) => summary.invalid += 1,
            }
        }
        summary.unique_after_dedupe = unique.len();

        if unique.is_empty() {
            return Ok(summary);
        }

        let existing = self.store.exists_many(&unique).await?;
        summary.already_existing = existing.len();

        let pending: Vec<CodeRecord> = unique
            .into_iter()
            .filter(|c| !existing.contains(c))
            .map(|c| CodeRecord::new(c, batch))
            .collect();

        if !pending.is_empty() {
            let outcome = self.store.insert_many(pending).await?;
            summary.imported = outcome.inserted;
            // Rows the store's own duplicate check skipped raced against
            // a concurrent writer; they exist now either way.
            summary.already_existing += outcome.skipped.len();
        }

        info!(
            imported = summary.imported,
            already_existing = summary.already_existing,
            invalid = summary.invalid,
            "import complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rsgate_storage::MemoryCodeStore;

    fn raw(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn imports_valid_unique_codes() {
        let store = MemoryCodeStore::new_shared();
        let importer = BatchImporter::new(Arc::clone(&store));

        let summary = importer
            .import_batch(&raw(&["ab12cd", "ef34gh", "bogus", ""]), 1)
            .await
            .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                found: 4,
                unique_after_dedupe: 2,
                invalid: 2,
                already_existing: 0,
                imported: 2,
            }
        );

        let row = store.get_code("AB12CD").await.unwrap().unwrap();
        assert_eq!(row.batch, 1);
        assert!(row.used_by.is_none());
    }

    #[tokio::test]
    async fn case_variants_collapse_to_one_insert() {
        let store = MemoryCodeStore::new_shared();
        let importer = BatchImporter::new(Arc::clone(&store));

        let summary = importer
            .import_batch(&raw(&["ab12cd", "AB12CD"]), 1)
            .await
            .unwrap();

        assert_eq!(summary.found, 2);
        assert_eq!(summary.unique_after_dedupe, 1);
        assert_eq!(summary.imported, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let store = MemoryCodeStore::new_shared();
        let importer = BatchImporter::new(Arc::clone(&store));
        let input = raw(&["111111", "222222", "333333"]);

        let first = importer.import_batch(&input, 1).await.unwrap();
        assert_eq!(first.imported, 3);
        assert_eq!(first.already_existing, 0);

        let second = importer.import_batch(&input, 1).await.unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.already_existing, 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn mixed_preexisting_and_fresh() {
        let store = MemoryCodeStore::new_shared();
        let importer = BatchImporter::new(Arc::clone(&store));

        importer.import_batch(&raw(&["111111"]), 1).await.unwrap();
        let summary = importer
            .import_batch(&raw(&["111111", "222222"]), 2)
            .await
            .unwrap();

        assert_eq!(summary.imported, 1);
        assert_eq!(summary.already_existing, 1);
        // The pre-existing row keeps its original batch.
        let row = store.get_code("111111").await.unwrap().unwrap();
        assert_eq!(row.batch, 1);
    }

    #[tokio::test]
    async fn all_invalid_input_touches_nothing() {
        let store = MemoryCodeStore::new_shared();
        let importer = BatchImporter::new(Arc::clone(&store));

        let summary = importer
            .import_batch(&raw(&["", "  ", "toolongcode"]), 1)
            .await
            .unwrap();

        assert_eq!(summary.invalid, 3);
        assert_eq!(summary.unique_after_dedupe, 0);
        assert_eq!(summary.imported, 0);
        assert!(store.is_empty());
    }
}

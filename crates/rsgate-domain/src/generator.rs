//! Code generation.
//!
//! Produces store-wide-unique codes from a cryptographically secure
//! random source. Uniqueness is ultimately arbitrated by the store's
//! unique constraint: candidates rejected at insert time (a race with a
//! concurrent writer) are simply excluded and regenerated, never
//! surfaced as errors.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use tracing::{debug, instrument};

use rsgate_storage::{CodeRecord, CodeStore};

use crate::code::{DEFAULT_CODE_LENGTH, DIGIT_ALPHABET};
use crate::error::{AccessError, AccessResult};

/// Multiplier bounding total candidate draws relative to the requested
/// count. Exhausting the budget fails with `GenerationExhausted` rather
/// than looping indefinitely on a saturated code space.
const DEFAULT_ATTEMPT_MULTIPLIER: usize = 10;

/// Generator settings.
///
/// The alphabet must already be in canonical (upper-case) form, since
/// generated codes are stored as produced.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Length of each generated code.
    pub length: usize,
    /// Characters codes are sampled from.
    pub alphabet: String,
    /// Attempt budget as a multiple of the requested count.
    pub attempt_multiplier: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
            alphabet: DIGIT_ALPHABET.to_string(),
            attempt_multiplier: DEFAULT_ATTEMPT_MULTIPLIER,
        }
    }
}

/// Produces new, store-wide-unique codes.
pub struct CodeGenerator<S> {
    store: Arc<S>,
    config: GeneratorConfig,
}

impl<S: CodeStore> CodeGenerator<S> {
    /// Creates a generator with default settings (6 digits).
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, GeneratorConfig::default())
    }

    /// Creates a generator with custom settings.
    pub fn with_config(store: Arc<S>, config: GeneratorConfig) -> Self {
        Self { store, config }
    }

    /// Generates exactly `count` fresh codes tagged with `batch`,
    /// sampling from the OS random source.
    pub async fn generate(&self, count: usize, batch: i64) -> AccessResult<Vec<String>> {
        self.generate_with_rng(count, batch, &mut OsRng).await
    }

    /// Generates with a caller-supplied RNG.
    ///
    /// Production callers go through [`generate`](Self::generate); this
    /// seam exists so tests can drive collision handling with a seeded
    /// RNG.
    #[instrument(skip(self, rng))]
    pub async fn generate_with_rng<R: Rng + CryptoRng>(
        &self,
        count: usize,
        batch: i64,
        rng: &mut R,
    ) -> AccessResult<Vec<String>> {
        if count == 0 {
            return Err(AccessError::InvalidInput {
                message: "count must be positive".to_string(),
            });
        }
        if self.config.length == 0 || self.config.alphabet.is_empty() {
            return Err(AccessError::InvalidInput {
                message: "code length and alphabet must be non-empty".to_string(),
            });
        }

        let alphabet: Vec<char> = self.config.alphabet.chars().collect();
        let max_attempts = count.saturating_mul(self.config.attempt_multiplier);

        let mut attempts = 0usize;
        // Candidates already produced in this call, so self-collisions
        // never cost a store round-trip.
        let mut seen: HashSet<String> = HashSet::with_capacity(count);
        let mut secured: Vec<String> = Vec::with_capacity(count);

        while secured.len() < count {
            let need = count - secured.len();
            let mut round: Vec<String> = Vec::with_capacity(need);
            while round.len() < need {
                if attempts >= max_attempts {
                    return Err(AccessError::GenerationExhausted {
                        requested: count,
                        secured: secured.len(),
                        attempts,
                    });
                }
                attempts += 1;
                let candidate = sample_candidate(rng, &alphabet, self.config.length);
                if seen.insert(candidate.clone()) {
                    round.push(candidate);
                }
            }

            // Batch-check against the store before paying for inserts.
            // Deleted codes count as existing: their value permanently
            // occupies its slot in the code space.
            let existing = self.store.exists_many(&round).await?;
            let survivors: Vec<String> = round
                .into_iter()
                .filter(|c| !existing.contains(c))
                .collect();
            if survivors.is_empty() {
                continue;
            }

            let rows: Vec<CodeRecord> = survivors
                .iter()
                .map(|c| CodeRecord::new(c.clone(), batch))
                .collect();
            let outcome = self.store.insert_many(rows).await?;

            // Rows skipped here lost an insert race with a concurrent
            // writer; the shortfall is made up by another round.
            if !outcome.skipped.is_empty() {
                debug!(skipped = outcome.skipped.len(), "insert race, regenerating");
            }
            let skipped: HashSet<String> = outcome.skipped.into_iter().collect();
            secured.extend(survivors.into_iter().filter(|c| !skipped.contains(c)));
        }

        Ok(secured)
    }
}

fn sample_candidate<R: Rng + ?Sized>(rng: &mut R, alphabet: &[char], length: usize) -> String {
    (0..length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

//! Collision-checked identifier generation.
//!
//! Ids are [`ID_LEN`] lowercase hex characters (40 bits of randomness).
//! [`IdGenerator::generate`] draws candidates from a [`CandidateSource`]
//! and asks a caller-supplied existence predicate about each one until a
//! free id turns up or [`IdGenerator::max_attempts`] candidates have all
//! collided.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Length of every skill id, in hex characters.
pub const ID_LEN: usize = 10;

/// Colliding candidates tolerated before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 32;

/// Returns `true` if `id` is exactly [`ID_LEN`] lowercase hex characters.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Produces candidate ids. Candidates need not be unique; the generator
/// checks them.
pub trait CandidateSource: Send + Sync {
    fn candidate(&self) -> StoreResult<String>;
}

/// Candidates drawn from the system CSPRNG.
pub struct RandomHexSource {
    rng: SystemRandom,
}

impl RandomHexSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for RandomHexSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateSource for RandomHexSource {
    fn candidate(&self) -> StoreResult<String> {
        let mut bytes = [0u8; ID_LEN / 2];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| StoreError::Fatal("system random source unavailable".into()))?;
        Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }
}

/// Generates ids that do not collide with any existing one at the moment
/// of generation.
#[derive(Clone)]
pub struct IdGenerator {
    source: Arc<dyn CandidateSource>,
    max_attempts: u32,
}

impl IdGenerator {
    /// A generator backed by [`RandomHexSource`].
    pub fn new() -> Self {
        Self::with_source(Arc::new(RandomHexSource::new()))
    }

    pub fn with_source(source: Arc<dyn CandidateSource>) -> Self {
        Self {
            source,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the collision budget. Values below 1 are raised to 1.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Produce an id for which `exists` reported `false`.
    ///
    /// Errors from `exists` are returned unchanged. If every one of the
    /// allowed candidates collides, returns [`StoreError::IdExhausted`].
    pub async fn generate<F, Fut>(&self, mut exists: F) -> StoreResult<String>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = StoreResult<bool>>,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.source.candidate()?;
            if !is_valid_id(&candidate) {
                return Err(StoreError::Fatal(format!(
                    "candidate source produced malformed id: {candidate:?}"
                )));
            }
            if !exists(candidate.clone()).await? {
                debug!(id = %candidate, attempt, "generated id");
                return Ok(candidate);
            }
            warn!(id = %candidate, attempt, "id collision, retrying");
        }

        Err(StoreError::IdExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

// ── tests ────────────────────────────────────────────────────────────

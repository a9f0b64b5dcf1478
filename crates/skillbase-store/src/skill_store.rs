//! Persistence operations for [`Skill`]s.
//!
//! [`SkillStore`] validates input before touching the database, runs one
//! parameterised statement per call, and maps every row through
//! [`SkillRow::into_skill`].
//!
//! Reads come in two flavours. The `fetch*` methods return the store error
//! as-is. The `retrieve*`/`search_by_term` methods degrade a store failure
//! into a tagged [`Retrieval::Degraded`] or [`Listing::Degraded`] value,
//! which callers can collapse into "absent" or "empty" with
//! [`Retrieval::into_option`] / [`Listing::into_vec`]. Writes report
//! through [`WriteOutcome`]. [`SkillStore::exists`] never degrades: a store
//! failure there becomes [`StoreError::Fatal`].

use tracing::{debug, error, instrument, warn};

use crate::db::{Database, FOLD_CASE_FN};
use crate::error::{StoreError, StoreResult};
use crate::id_gen::{IdGenerator, is_valid_id};
use crate::skill::{SKILL_COLUMNS, Skill, SkillRow};

/// Upper bound on bound parameters per `IN (...)` statement.
pub const MAX_IDS_PER_QUERY: usize = 500;

const INSERT_SQL: &str = "INSERT INTO skills (id, name, authorized, added) VALUES (?1, ?2, ?3, ?4)";

// name and added are immutable once the row exists.
const UPSERT_SQL: &str = "INSERT INTO skills (id, name, authorized, added) VALUES (?1, ?2, ?3, ?4) \
                          ON CONFLICT(id) DO UPDATE SET authorized = excluded.authorized";

// ═══════════════════════════════════════════════════════════════════════
//  Outcomes
// ═══════════════════════════════════════════════════════════════════════

/// Result of a point lookup.
#[derive(Debug)]
pub enum Retrieval {
    Found(Skill),
    NotFound,
    /// The store failed; the lookup is treated as absent.
    Degraded(StoreError),
}

impl Retrieval {
    /// Collapse into `Option`, treating a degraded lookup as absent.
    pub fn into_option(self) -> Option<Skill> {
        match self {
            Self::Found(skill) => Some(skill),
            Self::NotFound | Self::Degraded(_) => None,
        }
    }

    /// Turn absence into [`StoreError::NotFound`] and return a degraded
    /// lookup's store error.
    pub fn require(self, id: &str) -> StoreResult<Skill> {
        match self {
            Self::Found(skill) => Ok(skill),
            Self::NotFound => Err(StoreError::NotFound {
                entity: "skill",
                id: id.to_string(),
            }),
            Self::Degraded(err) => Err(err),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Result of a multi-row read.
#[derive(Debug)]
pub enum Listing {
    Rows(Vec<Skill>),
    /// The store failed; the read is treated as empty.
    Degraded(StoreError),
}

impl Listing {
    /// Collapse into a vector, treating a degraded read as empty.
    pub fn into_vec(self) -> Vec<Skill> {
        match self {
            Self::Rows(skills) => skills,
            Self::Degraded(_) => Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Rows(_) => None,
            Self::Degraded(err) => Some(err),
        }
    }
}

/// Result of `save` or `delete`.
#[derive(Debug)]
pub enum WriteOutcome {
    /// At least one row was written or removed.
    Applied,
    /// The statement ran but matched no row.
    NoMatch,
    /// Input was refused before reaching the store.
    Rejected(String),
    /// The store failed the statement. For a fresh `save` this includes a
    /// primary-key conflict with a concurrent creator.
    Failed(StoreError),
}

impl WriteOutcome {
    /// The two-valued success flag.
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  SkillStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD and search operations on skills.
///
/// The [`Database`] is shared with the rest of the application; this
/// store never closes or reconfigures it.
#[derive(Clone)]
pub struct SkillStore {
    db: Database,
    ids: IdGenerator,
}

impl SkillStore {
    /// Create a skill store backed by `db` with the default id generator.
    pub fn new(db: Database) -> Self {
        Self::with_generator(db, IdGenerator::new())
    }

    pub fn with_generator(db: Database, ids: IdGenerator) -> Self {
        Self { db, ids }
    }

    // ── point lookup ─────────────────────────────────────────────────

    /// Look up one skill by id.
    ///
    /// An empty `id` is an error. A store failure is logged and returned
    /// as [`Retrieval::Degraded`].
    #[instrument(skip(self))]
    pub async fn retrieve(&self, id: &str) -> StoreResult<Retrieval> {
        require_non_empty("id", id)?;
        match self.fetch(id).await {
            Ok(Some(skill)) => Ok(Retrieval::Found(skill)),
            Ok(None) => Ok(Retrieval::NotFound),
            Err(err) if err.is_store_failure() => {
                warn!(%err, "retrieve degraded to not found");
                Ok(Retrieval::Degraded(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Look up one skill by id, returning store failures as errors.
    pub async fn fetch(&self, id: &str) -> StoreResult<Option<Skill>> {
        require_non_empty("id", id)?;
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    &format!("SELECT {SKILL_COLUMNS} FROM skills WHERE id = ?1"),
                    rusqlite::params![id],
                    SkillRow::from_row,
                );
                match result {
                    Ok(row) => row.into_skill().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    // ── paginated listing ────────────────────────────────────────────

    /// One page of skills ordered by id. Pages start at 1.
    ///
    /// Non-positive `page` or `per_page` is an error. A store failure is
    /// logged and returned as [`Listing::Degraded`].
    #[instrument(skip(self))]
    pub async fn retrieve_all(&self, page: i64, per_page: i64) -> StoreResult<Listing> {
        page_offset(page, per_page)?;
        degrade_listing("retrieve_all", self.fetch_page(page, per_page).await)
    }

    pub async fn fetch_page(&self, page: i64, per_page: i64) -> StoreResult<Vec<Skill>> {
        let offset = page_offset(page, per_page)?;
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SKILL_COLUMNS} FROM skills ORDER BY id ASC LIMIT ?1 OFFSET ?2"
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![per_page, offset], SkillRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(SkillRow::into_skill).collect()
            })
            .await
    }

    // ── bulk lookup ──────────────────────────────────────────────────

    /// All skills whose id is in `ids`, ordered by id. Unknown ids are
    /// skipped; an empty `ids` returns an empty listing without a query.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn retrieve_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Listing {
        match degrade_listing("retrieve_by_ids", self.fetch_many(ids).await) {
            Ok(listing) => listing,
            // fetch_many raises nothing but store failures.
            Err(err) => Listing::Degraded(err),
        }
    }

    pub async fn fetch_many<S: AsRef<str>>(&self, ids: &[S]) -> StoreResult<Vec<Skill>> {
        let mut ids: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.db
            .execute(move |conn| {
                let mut skills = Vec::with_capacity(ids.len());
                // Sorted input and per-chunk ORDER BY keep the result sorted.
                for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SKILL_COLUMNS} FROM skills WHERE id IN ({}) ORDER BY id ASC",
                        placeholders(chunk.len())
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params_from_iter(chunk.iter()), SkillRow::from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    for row in rows {
                        skills.push(row.into_skill()?);
                    }
                }
                Ok(skills)
            })
            .await
    }

    // ── search ───────────────────────────────────────────────────────

    /// Skills whose name contains `term`, ignoring case (Unicode), ordered
    /// by id. `%`, `_` and `\` in `term` match literally.
    #[instrument(skip(self))]
    pub async fn search_by_term(&self, term: &str) -> StoreResult<Listing> {
        require_non_empty("term", term)?;
        degrade_listing("search_by_term", self.fetch_matching(term).await)
    }

    pub async fn fetch_matching(&self, term: &str) -> StoreResult<Vec<Skill>> {
        require_non_empty("term", term)?;
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SKILL_COLUMNS} FROM skills \
                     WHERE {FOLD_CASE_FN}(name) LIKE ?1 ESCAPE '\\' ORDER BY id ASC"
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![pattern], SkillRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(SkillRow::into_skill).collect()
            })
            .await
    }

    // ── writes ───────────────────────────────────────────────────────

    /// Insert a new skill or update the `authorized` flag of an existing one.
    ///
    /// A skill without an id gets a freshly generated one, written back
    /// into `skill.id` once the insert succeeds. An empty name or a
    /// malformed id is an error, as is a failure to generate an id. Store
    /// failures come back as [`WriteOutcome::Failed`].
    #[instrument(skip(self, skill), fields(name = %skill.name, id = ?skill.id))]
    pub async fn save(&self, skill: &mut Skill) -> StoreResult<WriteOutcome> {
        if skill.name.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "skill name must not be empty".into(),
            ));
        }

        let (id, fresh) = match &skill.id {
            Some(id) if is_valid_id(id) => (id.clone(), false),
            Some(id) => {
                return Err(StoreError::InvalidArgument(format!(
                    "malformed skill id: {id:?}"
                )));
            }
            None => {
                let id = self
                    .ids
                    .generate(|candidate| async move { self.exists(&candidate).await })
                    .await?;
                (id, true)
            }
        };

        let outcome = self.write(&id, skill, fresh).await?;
        if outcome.succeeded() {
            skill.id = Some(id);
        }
        Ok(outcome)
    }

    /// Write `skill`'s row under `id`.
    ///
    /// A `fresh` row carries no conflict clause, so an id taken by a racing
    /// creator fails on the primary key instead of merging.
    pub(crate) async fn write(
        &self,
        id: &str,
        skill: &Skill,
        fresh: bool,
    ) -> StoreResult<WriteOutcome> {
        let sql = if fresh { INSERT_SQL } else { UPSERT_SQL };
        let row_id = id.to_string();
        let name = skill.name.clone();
        let authorized = i64::from(skill.authorized);
        let added = skill.added.to_rfc3339();

        let result = self
            .db
            .execute(move |conn| {
                conn.execute(sql, rusqlite::params![row_id, name, authorized, added])?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => {
                debug!(skill_id = %id, fresh, "skill saved");
                Ok(WriteOutcome::Applied)
            }
            Err(err) if err.is_store_failure() => {
                warn!(skill_id = %id, fresh, %err, "skill save failed");
                Ok(WriteOutcome::Failed(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Delete a skill by id.
    ///
    /// Ids that are not exactly 10 lowercase hex characters are
    /// [`WriteOutcome::Rejected`] without touching the store.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> WriteOutcome {
        if !is_valid_id(id) {
            debug!("rejected malformed id");
            return WriteOutcome::Rejected(format!("malformed skill id: {id:?}"));
        }

        let row_id = id.to_string();
        let result = self
            .db
            .execute(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM skills WHERE id = ?1", rusqlite::params![row_id])?;
                Ok(deleted)
            })
            .await;

        match result {
            Ok(0) => WriteOutcome::NoMatch,
            Ok(deleted) => {
                debug!(deleted, "skill deleted");
                WriteOutcome::Applied
            }
            Err(err) => {
                warn!(%err, "skill delete failed");
                WriteOutcome::Failed(err)
            }
        }
    }

    // ── existence ────────────────────────────────────────────────────

    /// Whether a skill with `id` is stored.
    ///
    /// Id generation relies on this answer, so a store failure is returned
    /// as [`StoreError::Fatal`] rather than as `false`.
    #[instrument(skip(self))]
    pub async fn exists(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM skills WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(|err| {
                error!(%err, "existence check failed");
                StoreError::Fatal(format!("existence check failed: {err}"))
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════

fn require_non_empty(what: &str, value: &str) -> StoreResult<()> {
    if value.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}

/// Validate pagination input and return the row offset.
fn page_offset(page: i64, per_page: i64) -> StoreResult<i64> {
    if page < 1 {
        return Err(StoreError::InvalidArgument(format!(
            "page must be a positive integer, got {page}"
        )));
    }
    if per_page < 1 {
        return Err(StoreError::InvalidArgument(format!(
            "results per page must be a positive integer, got {per_page}"
        )));
    }
    (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| StoreError::InvalidArgument("page offset overflows".into()))
}

fn degrade_listing(op: &'static str, result: StoreResult<Vec<Skill>>) -> StoreResult<Listing> {
    match result {
        Ok(skills) => Ok(Listing::Rows(skills)),
        Err(err) if err.is_store_failure() => {
            warn!(op, %err, "read degraded to empty");
            Ok(Listing::Degraded(err))
        }
        Err(err) => Err(err),
    }
}

/// `?1, ?2, ..., ?n`
fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape `LIKE` metacharacters for use with `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
#[path = "skill_store_tests.rs"]
mod tests;

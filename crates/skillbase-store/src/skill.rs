//! The `Skill` entity and its mapping from `skills` rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A named skill with an authorization flag.
///
/// `id` is `None` until the skill is first saved. `name` and `added` are
/// fixed at creation; only `authorized` changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// 10 lowercase hex characters once assigned.
    pub id: Option<String>,
    pub name: String,
    pub authorized: bool,
    pub added: DateTime<Utc>,
}

impl Skill {
    /// A new, unsaved skill stamped with the current time.
    pub fn new(name: impl Into<String>, authorized: bool) -> Self {
        Self {
            id: None,
            name: name.into(),
            authorized,
            added: Utc::now(),
        }
    }
}

/// Column list shared by every `SELECT` on `skills`, in [`SkillRow`] order.
pub(crate) const SKILL_COLUMNS: &str = "id, name, authorized, added";

/// Raw row data as stored: flag as 0/1, timestamp as RFC 3339 text.
pub(crate) struct SkillRow {
    id: String,
    name: String,
    authorized: i64,
    added: String,
}

impl SkillRow {
    /// Read a row selected with [`SKILL_COLUMNS`].
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            authorized: row.get(2)?,
            added: row.get(3)?,
        })
    }

    pub(crate) fn into_skill(self) -> StoreResult<Skill> {
        let added = DateTime::parse_from_rfc3339(&self.added)
            .map_err(|e| {
                StoreError::InvalidRow(format!(
                    "skill {}: bad added timestamp {:?}: {e}",
                    self.id, self.added
                ))
            })?
            .with_timezone(&Utc);

        let authorized = match self.authorized {
            0 => false,
            1 => true,
            other => {
                return Err(StoreError::InvalidRow(format!(
                    "skill {}: authorized must be 0 or 1, got {other}",
                    self.id
                )));
            }
        };

        Ok(Skill {
            id: Some(self.id),
            name: self.name,
            authorized,
            added,
        })
    }
}

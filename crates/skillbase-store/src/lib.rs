//! # skillbase-store
//!
//! SQLite-backed persistence for skills.
//!
//! A [`SkillStore`] runs create/update, lookup, bulk lookup, paginated
//! listing, substring search, existence checks and deletion against a
//! shared [`Database`] handle. New skills get a 10-character hex id from
//! an [`IdGenerator`], which keeps drawing candidates until the store
//! reports one as unused.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  SkillStore  (validation, SQL, mapping)  │
//! │     └── IdGenerator (collision loop)     │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL, shared handle)  │
//! │  Migrations (versioned, transactional)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use skillbase_store::{Database, Skill, SkillStore};
//!
//! let db = Database::open_and_migrate("data/skillbase.db").await?;
//! let skills = SkillStore::new(db.clone());
//!
//! let mut go = Skill::new("Go", false);
//! skills.save(&mut go).await?;
//! let found = skills.retrieve(go.id.as_deref().unwrap()).await?.into_option();
//! ```

pub mod db;
pub mod error;
pub mod id_gen;
pub mod migration;
pub mod skill;
pub mod skill_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::{Database, DatabaseOptions};
pub use error::{StoreError, StoreResult};
pub use id_gen::{CandidateSource, IdGenerator, RandomHexSource, is_valid_id};
pub use skill::Skill;
pub use skill_store::{Listing, Retrieval, SkillStore, WriteOutcome};

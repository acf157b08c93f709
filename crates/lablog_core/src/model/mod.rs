//! Lab log domain model.
//!
//! # Responsibility
//! - Define persisted records for users, reagents, processes and their links.
//! - Define insert drafts (`New*`) and partial updates (`*Patch`).
//!
//! # Invariants
//! - Records are identified by engine-assigned surrogate ids.
//! - Audit timestamps are never part of a draft or patch; the store owns them.
//! - Records reference users by id only, never by embedding.

pub mod association;
pub mod process;
pub mod reagent;
pub mod user;

/// Unix epoch milliseconds, as stored in every audit timestamp column.
pub type EpochMs = i64;

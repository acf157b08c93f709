//! Reagent model.
//!
//! # Invariants
//! - `lot` is unique across all reagents.
//! - `created_by` and `updated_by` resolve to existing users at write time.
//! - `created_at` never changes after insert; `updated_at >= created_at`.

use super::user::UserId;
use super::EpochMs;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Surrogate key of a reagent row.
pub type ReagentId = i64;

/// Persisted reagent with its audit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reagent {
    pub id: ReagentId,
    pub name: String,
    pub lot: String,
    pub created_at: EpochMs,
    pub created_by: UserId,
    pub updated_at: EpochMs,
    pub updated_by: UserId,
}

impl Display for Reagent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Reagent(id={},name={},lot={},created_at={},created_by={},updated_at={},updated_by={})",
            self.id,
            self.name,
            self.lot,
            self.created_at,
            self.created_by,
            self.updated_at,
            self.updated_by
        )
    }
}

/// Insert draft for a reagent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReagent {
    pub name: String,
    pub lot: String,
    pub created_by: UserId,
    pub updated_by: UserId,
}

impl NewReagent {
    pub fn new(
        name: impl Into<String>,
        lot: impl Into<String>,
        created_by: UserId,
        updated_by: UserId,
    ) -> Self {
        Self {
            name: name.into(),
            lot: lot.into(),
            created_by,
            updated_by,
        }
    }
}

/// Partial update for a reagent. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReagentPatch {
    pub name: Option<String>,
    pub lot: Option<String>,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
}

impl ReagentPatch {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_lot(mut self, lot: impl Into<String>) -> Self {
        self.lot = Some(lot.into());
        self
    }

    pub fn with_created_by(mut self, user_id: UserId) -> Self {
        self.created_by = Some(user_id);
        self
    }

    pub fn with_updated_by(mut self, user_id: UserId) -> Self {
        self.updated_by = Some(user_id);
        self
    }

    /// Merges supplied fields into `reagent`. Audit timestamps are not touched.
    pub fn apply_to(&self, reagent: &mut Reagent) {
        if let Some(name) = &self.name {
            reagent.name.clone_from(name);
        }
        if let Some(lot) = &self.lot {
            reagent.lot.clone_from(lot);
        }
        if let Some(created_by) = self.created_by {
            reagent.created_by = created_by;
        }
        if let Some(updated_by) = self.updated_by {
            reagent.updated_by = updated_by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Reagent, ReagentPatch};

    fn acetone() -> Reagent {
        Reagent {
            id: 1,
            name: "Acetone".to_string(),
            lot: "L1".to_string(),
            created_at: 100,
            created_by: 1,
            updated_at: 100,
            updated_by: 1,
        }
    }

    #[test]
    fn display_lists_fields_on_one_line() {
        assert_eq!(
            acetone().to_string(),
            "Reagent(id=1,name=Acetone,lot=L1,created_at=100,created_by=1,updated_at=100,updated_by=1)"
        );
    }

    #[test]
    fn patch_merges_only_supplied_fields() {
        let mut reagent = acetone();
        ReagentPatch::default()
            .with_lot("L2")
            .with_updated_by(2)
            .apply_to(&mut reagent);

        assert_eq!(reagent.name, "Acetone");
        assert_eq!(reagent.lot, "L2");
        assert_eq!(reagent.created_by, 1);
        assert_eq!(reagent.updated_by, 2);
        assert_eq!(reagent.updated_at, 100);
    }
}

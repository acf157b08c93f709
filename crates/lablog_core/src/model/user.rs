//! User model: the actor referenced by every audit field.

use super::EpochMs;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Surrogate key of a user row.
pub type UserId = i64;

/// Persisted user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Unique across all users.
    pub full_name: String,
    /// Set on insert and refreshed by every update of this user.
    pub created_at: EpochMs,
}

/// One-line form: `User(id=1,full_name=Ada,created_at=1000)`.
impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "User(id={},full_name={},created_at={})",
            self.id, self.full_name, self.created_at
        )
    }
}

/// Insert draft for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub full_name: String,
}

impl NewUser {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
        }
    }
}

/// Partial update for a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub full_name: Option<String>,
}

impl UserPatch {
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Merges supplied fields into `user`. Audit stamps are not touched.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(full_name) = &self.full_name {
            user.full_name.clone_from(full_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{User, UserPatch};

    #[test]
    fn display_lists_fields_on_one_line() {
        let user = User {
            id: 3,
            full_name: "Ada".to_string(),
            created_at: 1_000,
        };
        assert_eq!(user.to_string(), "User(id=3,full_name=Ada,created_at=1000)");
    }

    #[test]
    fn empty_patch_leaves_user_unchanged() {
        let mut user = User {
            id: 1,
            full_name: "Ada".to_string(),
            created_at: 10,
        };
        let before = user.clone();
        UserPatch::default().apply_to(&mut user);
        assert_eq!(user, before);
    }

    #[test]
    fn patch_replaces_full_name_only() {
        let mut user = User {
            id: 1,
            full_name: "Ada".to_string(),
            created_at: 10,
        };
        UserPatch::default()
            .with_full_name("Ada Lovelace")
            .apply_to(&mut user);
        assert_eq!(user.full_name, "Ada Lovelace");
        assert_eq!(user.created_at, 10);
    }
}

//! Process model: one procedural step, typed as running before or after
//! the main procedure.
//!
//! # Invariants
//! - `process_type` is exactly one of `pre` / `post`.
//! - `created_by` and `updated_by` resolve to existing users at write time.
//! - `created_at` never changes after insert; `updated_at >= created_at`.

use super::user::UserId;
use super::EpochMs;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Surrogate key of a process row.
pub type ProcessId = i64;

/// Two-value domain of `processes.process_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    Pre,
    Post,
}

impl ProcessType {
    /// Storage and wire text for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl Display for ProcessType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text outside the `pre`/`post` domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTypeParseError(pub String);

impl Display for ProcessTypeParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported process type `{}`; expected pre|post", self.0)
    }
}

impl Error for ProcessTypeParseError {}

impl FromStr for ProcessType {
    type Err = ProcessTypeParseError;

    /// Parses exact lowercase text; no trimming or case folding.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            other => Err(ProcessTypeParseError(other.to_string())),
        }
    }
}

/// Persisted process with its audit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    pub process_type: ProcessType,
    pub created_at: EpochMs,
    pub created_by: UserId,
    pub updated_at: EpochMs,
    pub updated_by: UserId,
}

impl Display for Process {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Process(id={},name={},process_type={},created_at={},created_by={},updated_at={},updated_by={})",
            self.id,
            self.name,
            self.process_type,
            self.created_at,
            self.created_by,
            self.updated_at,
            self.updated_by
        )
    }
}

/// Insert draft for a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProcess {
    pub name: String,
    pub process_type: ProcessType,
    pub created_by: UserId,
    pub updated_by: UserId,
}

impl NewProcess {
    pub fn new(
        name: impl Into<String>,
        process_type: ProcessType,
        created_by: UserId,
        updated_by: UserId,
    ) -> Self {
        Self {
            name: name.into(),
            process_type,
            created_by,
            updated_by,
        }
    }
}

/// Partial update for a process. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPatch {
    pub name: Option<String>,
    pub process_type: Option<ProcessType>,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
}

impl ProcessPatch {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_process_type(mut self, process_type: ProcessType) -> Self {
        self.process_type = Some(process_type);
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

    /// Merges supplied fields into `process`. Audit timestamps are not touched.
    pub fn apply_to(&self, process: &mut Process) {
        if let Some(name) = &self.name {
            process.name.clone_from(name);
        }
        if let Some(process_type) = self.process_type {
            process.process_type = process_type;
        }
        if let Some(created_by) = self.created_by {
            process.created_by = created_by;
        }
        if let Some(updated_by) = self.updated_by {
            process.updated_by = updated_by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Process, ProcessType, ProcessTypeParseError};

    #[test]
    fn display_lists_fields_with_type_text() {
        let process = Process {
            id: 2,
            name: "Prep".to_string(),
            process_type: ProcessType::Post,
            created_at: 10,
            created_by: 1,
            updated_at: 12,
            updated_by: 4,
        };
        assert_eq!(
            process.to_string(),
            "Process(id=2,name=Prep,process_type=post,created_at=10,created_by=1,updated_at=12,updated_by=4)"
        );
    }

    #[test]
    fn process_type_parses_exact_domain_values() {
        assert_eq!("pre".parse::<ProcessType>(), Ok(ProcessType::Pre));
        assert_eq!("post".parse::<ProcessType>(), Ok(ProcessType::Post));
    }

    #[test]
    fn process_type_rejects_values_outside_domain() {
        for raw in ["PRE", " post", "during", ""] {
            assert_eq!(
                raw.parse::<ProcessType>(),
                Err(ProcessTypeParseError(raw.to_string()))
            );
        }
    }

    #[test]
    fn process_type_text_round_trips_through_as_str() {
        for kind in [ProcessType::Pre, ProcessType::Post] {
            assert_eq!(kind.as_str().parse::<ProcessType>(), Ok(kind));
        }
    }
}

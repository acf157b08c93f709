//! Core data layer for the lab log.
//! This crate is the single source of truth for record invariants:
//! unique keys, audit references, audit stamps and reagent↔process links.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{DeletePolicy, LogSettings, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::association::ReagentProcessAssociation;
pub use model::process::{
    NewProcess, Process, ProcessId, ProcessPatch, ProcessType, ProcessTypeParseError,
};
pub use model::reagent::{NewReagent, Reagent, ReagentId, ReagentPatch};
pub use model::user::{NewUser, User, UserId, UserPatch};
pub use model::EpochMs;
pub use repo::association_repo::AssociationRepository;
pub use repo::process_repo::{ProcessListQuery, ProcessRepository};
pub use repo::reagent_repo::{ReagentListQuery, ReagentRepository};
pub use repo::user_repo::{UserListQuery, UserRepository};
pub use repo::{EntityKind, RepoError, RepoResult, SqliteLabStore};
pub use service::lab_service::{LabService, LabStore, ProcessDetail, ReagentDetail, UserFootprint};

/// Version of this crate, as reported by the CLI.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

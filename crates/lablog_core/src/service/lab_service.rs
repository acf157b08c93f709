//! Lab use-case service.
//!
//! # Responsibility
//! - Single-actor entry points for recording users, reagents and processes.
//! - Traverse relationships: reagent ↔ processes, record → audit users,
//!   user → everything they created or last edited.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or stamping.
//! - Service layer remains storage-agnostic.

use crate::model::process::{NewProcess, Process, ProcessId, ProcessPatch, ProcessType};
use crate::model::reagent::{NewReagent, Reagent, ReagentId, ReagentPatch};
use crate::model::user::{NewUser, User, UserId, UserPatch};
use crate::repo::association_repo::AssociationRepository;
use crate::repo::process_repo::{ProcessListQuery, ProcessRepository};
use crate::repo::reagent_repo::{ReagentListQuery, ReagentRepository};
use crate::repo::user_repo::UserRepository;
use crate::repo::{EntityKind, RepoError, RepoResult};
use serde::Serialize;

/// Everything a lab service needs from storage.
pub trait LabStore:
    UserRepository + ReagentRepository + ProcessRepository + AssociationRepository
{
}

impl<T> LabStore for T where
    T: UserRepository + ReagentRepository + ProcessRepository + AssociationRepository
{
}

/// A reagent with its audit users and linked processes resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReagentDetail {
    pub reagent: Reagent,
    pub created_by_user: User,
    pub updated_by_user: User,
    /// Ordered by process id.
    pub processes: Vec<Process>,
}

/// A process with its audit users and linked reagents resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDetail {
    pub process: Process,
    pub created_by_user: User,
    pub updated_by_user: User,
    /// Ordered by reagent id.
    pub reagents: Vec<Reagent>,
}

/// Records a user appears on as creator or last editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFootprint {
    pub user: User,
    pub reagents: Vec<Reagent>,
    pub processes: Vec<Process>,
}

/// Use-case facade over a lab store.
pub struct LabService<S: LabStore> {
    store: S,
}

impl<S: LabStore> LabService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read access to the wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn register_user(&mut self, full_name: impl Into<String>) -> RepoResult<User> {
        self.store.insert_user(&NewUser::new(full_name))
    }

    pub fn rename_user(&mut self, id: UserId, full_name: impl Into<String>) -> RepoResult<User> {
        let patch = UserPatch::default().with_full_name(full_name);
        self.store.update_user(id, &patch)
    }

    /// Records a reagent with `actor` as both creator and editor.
    pub fn register_reagent(
        &mut self,
        name: impl Into<String>,
        lot: impl Into<String>,
        actor: UserId,
    ) -> RepoResult<Reagent> {
        self.store
            .insert_reagent(&NewReagent::new(name, lot, actor, actor))
    }

    /// Records a process with `actor` as both creator and editor.
    ///
    /// # Errors
    /// - `ConstraintViolation` when `process_type` is not `pre` or `post`.
    pub fn register_process(
        &mut self,
        name: impl Into<String>,
        process_type: &str,
        actor: UserId,
    ) -> RepoResult<Process> {
        let process_type = process_type.parse::<ProcessType>()?;
        self.store
            .insert_process(&NewProcess::new(name, process_type, actor, actor))
    }

    /// Applies `patch` and records `editor` as the reagent's last editor.
    pub fn edit_reagent(
        &mut self,
        id: ReagentId,
        patch: ReagentPatch,
        editor: UserId,
    ) -> RepoResult<Reagent> {
        self.store.update_reagent(id, &patch.with_updated_by(editor))
    }

    /// Applies `patch` and records `editor` as the process's last editor.
    pub fn edit_process(
        &mut self,
        id: ProcessId,
        patch: ProcessPatch,
        editor: UserId,
    ) -> RepoResult<Process> {
        self.store.update_process(id, &patch.with_updated_by(editor))
    }

    pub fn attach(&mut self, reagent_id: ReagentId, process_id: ProcessId) -> RepoResult<bool> {
        self.store.link(reagent_id, process_id)
    }

    pub fn detach(&mut self, reagent_id: ReagentId, process_id: ProcessId) -> RepoResult<bool> {
        self.store.unlink(reagent_id, process_id)
    }

    pub fn reagent_detail(&self, id: ReagentId) -> RepoResult<ReagentDetail> {
        let reagent = self.store.get_reagent(id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Reagent,
            id,
        })?;
        let processes = self
            .store
            .processes_of(id)?
            .into_iter()
            .map(|process_id| -> RepoResult<Process> {
                let process = self.store.get_process(process_id)?;
                process.ok_or_else(|| dangling("process", process_id))
            })
            .collect::<RepoResult<Vec<_>>>()?;

        Ok(ReagentDetail {
            created_by_user: self.linked_user(reagent.created_by)?,
            updated_by_user: self.linked_user(reagent.updated_by)?,
            reagent,
            processes,
        })
    }

    pub fn process_detail(&self, id: ProcessId) -> RepoResult<ProcessDetail> {
        let process = self.store.get_process(id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Process,
            id,
        })?;
        let reagents = self
            .store
            .reagents_of(id)?
            .into_iter()
            .map(|reagent_id| -> RepoResult<Reagent> {
                let reagent = self.store.get_reagent(reagent_id)?;
                reagent.ok_or_else(|| dangling("reagent", reagent_id))
            })
            .collect::<RepoResult<Vec<_>>>()?;

        Ok(ProcessDetail {
            created_by_user: self.linked_user(process.created_by)?,
            updated_by_user: self.linked_user(process.updated_by)?,
            process,
            reagents,
        })
    }

    pub fn user_footprint(&self, id: UserId) -> RepoResult<UserFootprint> {
        let user = self.store.get_user(id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::User,
            id,
        })?;
        let reagents = self.store.list_reagents(&ReagentListQuery {
            touched_by: Some(id),
            ..ReagentListQuery::default()
        })?;
        let processes = self.store.list_processes(&ProcessListQuery {
            touched_by: Some(id),
            ..ProcessListQuery::default()
        })?;
        Ok(UserFootprint {
            user,
            reagents,
            processes,
        })
    }

    fn linked_user(&self, id: UserId) -> RepoResult<User> {
        self.store.get_user(id)?.ok_or_else(|| dangling("user", id))
    }
}

fn dangling(kind: &str, id: i64) -> RepoError {
    RepoError::InvalidData(format!("reference to missing {kind} {id}"))
}

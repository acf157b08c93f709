//! Reagent↔process join record.
//!
//! The pair is the whole identity: there is no surrogate id and the row
//! lives only while both endpoints exist.

use super::process::ProcessId;
use super::reagent::ReagentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReagentProcessAssociation {
    pub reagent_id: ReagentId,
    pub process_id: ProcessId,
}

//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Resolve id references into records for read-side traversal.

pub mod lab_service;

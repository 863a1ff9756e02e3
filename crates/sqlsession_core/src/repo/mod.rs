//! Repository layer over managed sessions.
//!
//! # Responsibility
//! - Define the generic entity data access contract.
//! - Keep transaction and session-state checks out of calling code.
//!
//! # Invariants
//! - Repositories never open their own connections; they go through the
//!   session manager bound to their unit of work.

mod entity_repo;

pub use entity_repo::{EntityRepository, Page, Repository, StatelessRepository};

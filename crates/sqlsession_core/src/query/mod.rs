//! Query composition: criteria, ordering and paging.
//!
//! # Responsibility
//! - Build filter criteria from typed field selectors.
//! - Render criteria to parameterized SQL.
//!
//! # Invariants
//! - Values are always bound as parameters, never interpolated.
//! - Sort precedence follows insertion order.

mod criteria;
mod sort;

pub use criteria::{Criteria, Order};
pub use sort::{Sort, SortDirection, SortList};

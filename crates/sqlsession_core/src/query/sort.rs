//! Sort specifications.
//!
//! # Responsibility
//! - Describe ordering by a validated field and direction.
//!
//! # Invariants
//! - Sorts apply in list order; the first is the primary key.
//! - Only `Desc` renders descending.

use super::{Criteria, Order};
use crate::error::PersistResult;
use crate::mapping::{Entity, Field};
use std::fmt::{Debug, Formatter};

/// Sort direction of one property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A property and its sort direction.
pub struct Sort<T> {
    pub field: Field<T>,
    pub direction: SortDirection,
}

impl<T: Entity> Sort<T> {
    pub fn new(field: Field<T>, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn asc(field: Field<T>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: Field<T>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Resolves `property` against `T` and builds the sort.
    pub fn by(property: &str, direction: SortDirection) -> PersistResult<Self> {
        Ok(Self::new(Field::new(property)?, direction))
    }

    fn order(&self) -> Order {
        Order {
            column: self.field.name(),
            ascending: self.direction != SortDirection::Desc,
        }
    }
}

impl<T> Clone for Sort<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Sort<T> {}

impl<T> Debug for Sort<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sort")
            .field("field", &self.field)
            .field("direction", &self.direction)
            .finish()
    }
}

/// Ordered sort specifications; the first entry is the primary key.
///
/// Duplicates are kept and rendered as redundant ordering terms.
pub struct SortList<T> {
    sorts: Vec<Sort<T>>,
}

impl<T: Entity> SortList<T> {
    pub fn new(sorts: impl IntoIterator<Item = Sort<T>>) -> Self {
        Self {
            sorts: sorts.into_iter().collect(),
        }
    }

    /// Returns a new list with `sort` appended as the lowest-precedence key.
    pub fn then(mut self, sort: Sort<T>) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn len(&self) -> usize {
        self.sorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sort<T>> {
        self.sorts.iter()
    }

    /// Appends one order clause per sort, in list order.
    pub(crate) fn apply_to(&self, criteria: &mut Criteria<T>) {
        for sort in &self.sorts {
            criteria.add_order(sort.order());
        }
    }
}

impl<T> Clone for SortList<T> {
    fn clone(&self) -> Self {
        Self {
            sorts: self.sorts.clone(),
        }
    }
}

impl<T> Debug for SortList<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sorts.iter()).finish()
    }
}

impl<T: Entity> From<Sort<T>> for SortList<T> {
    fn from(sort: Sort<T>) -> Self {
        Self { sorts: vec![sort] }
    }
}

use super::Entity;
use crate::error::{PersistError, PersistResult};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// A property of `T`, validated against its mapping at construction.
///
/// Names match case-insensitively; the stored name is the mapped spelling.
pub struct Field<T> {
    name: &'static str,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Field<T> {
    pub fn new(name: &str) -> PersistResult<Self> {
        let wanted = name.trim();
        std::iter::once(T::ID_COLUMN)
            .chain(T::COLUMNS.iter().copied())
            .find(|column| column.eq_ignore_ascii_case(wanted))
            .map(|column| Self {
                name: column,
                _entity: PhantomData,
            })
            .ok_or_else(|| PersistError::UnknownField {
                entity: T::TABLE,
                field: wanted.to_string(),
            })
    }

    /// The identity field of `T`.
    pub fn id() -> Self {
        Self {
            name: T::ID_COLUMN,
            _entity: PhantomData,
        }
    }

    /// Parses a comma-separated list, skipping blank entries.
    pub fn list(names: &str) -> PersistResult<Vec<Self>> {
        names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Self::new)
            .collect()
    }
}

impl<T> Field<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for Field<T> {}

impl<T> Debug for Field<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

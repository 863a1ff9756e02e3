//! Typed query criteria.
//!
//! # Responsibility
//! - Collect restrictions, ordering and paging for one entity type.
//! - Render them as SQL with positional parameters.
//!
//! # Invariants
//! - Values are always bound, never interpolated into SQL text.
//! - A count clone carries no ordering and no paging.

use crate::mapping::{quote_ident, Entity, Field};
use rusqlite::types::Value;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Restriction {
    Compare {
        column: &'static str,
        op: CompareOp,
        value: Value,
    },
    Like {
        column: &'static str,
        pattern: String,
    },
    IsNull(&'static str),
    IsNotNull(&'static str),
    In {
        column: &'static str,
        values: Vec<Value>,
    },
}

/// One ordering term of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

/// Filter, ordering and paging over entity `T`.
///
/// Restrictions are combined with `AND`. An empty criteria matches every row.
pub struct Criteria<T> {
    restrictions: Vec<Restriction>,
    orders: Vec<Order>,
    first_result: Option<u64>,
    max_results: Option<u64>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Criteria<T> {
    /// Criteria matching every row of `T`.
    pub fn new() -> Self {
        Self {
            restrictions: Vec::new(),
            orders: Vec::new(),
            first_result: None,
            max_results: None,
            _entity: PhantomData,
        }
    }

    pub fn eq(self, field: Field<T>, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Eq, value.into())
    }

    pub fn ne(self, field: Field<T>, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Ne, value.into())
    }

    pub fn gt(self, field: Field<T>, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Gt, value.into())
    }

    pub fn ge(self, field: Field<T>, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Ge, value.into())
    }

    pub fn lt(self, field: Field<T>, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Lt, value.into())
    }

    pub fn le(self, field: Field<T>, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Le, value.into())
    }

    /// SQL `LIKE` match; `%` and `_` keep their SQL meaning.
    pub fn like(mut self, field: Field<T>, pattern: impl Into<String>) -> Self {
        self.restrictions.push(Restriction::Like {
            column: field.name(),
            pattern: pattern.into(),
        });
        self
    }

    pub fn is_null(mut self, field: Field<T>) -> Self {
        self.restrictions.push(Restriction::IsNull(field.name()));
        self
    }

    pub fn is_not_null(mut self, field: Field<T>) -> Self {
        self.restrictions.push(Restriction::IsNotNull(field.name()));
        self
    }

    /// Matches any of `values`; an empty list matches nothing.
    pub fn in_list<V: Into<Value>>(
        mut self,
        field: Field<T>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.restrictions.push(Restriction::In {
            column: field.name(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn add_order(&mut self, order: Order) {
        self.orders.push(order);
    }

    pub fn set_first_result(&mut self, first_result: u64) {
        self.first_result = Some(first_result);
    }

    pub fn set_max_results(&mut self, max_results: u64) {
        self.max_results = Some(max_results);
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn first_result(&self) -> Option<u64> {
        self.first_result
    }

    pub fn max_results(&self) -> Option<u64> {
        self.max_results
    }

    /// Copy carrying only the filter; ordering and paging are stripped.
    pub fn count_clone(&self) -> Self {
        Self {
            restrictions: self.restrictions.clone(),
            orders: Vec::new(),
            first_result: None,
            max_results: None,
            _entity: PhantomData,
        }
    }

    /// `SELECT` over every mapped column with ordering and paging applied.
    pub(crate) fn select_sql(&self) -> (String, Vec<Value>) {
        let columns = std::iter::once(T::ID_COLUMN)
            .chain(T::COLUMNS.iter().copied())
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {columns} FROM {}", quote_ident(T::TABLE));
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params);

        if !self.orders.is_empty() {
            let terms = self
                .orders
                .iter()
                .map(|order| {
                    let direction = if order.ascending { "ASC" } else { "DESC" };
                    format!("{} {direction}", quote_ident(order.column))
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms);
        }

        match (self.max_results, self.first_result) {
            (Some(limit), first) => {
                sql.push_str(" LIMIT ?");
                params.push(Value::Integer(clamp_i64(limit)));
                if let Some(offset) = first.filter(|offset| *offset > 0) {
                    sql.push_str(" OFFSET ?");
                    params.push(Value::Integer(clamp_i64(offset)));
                }
            }
            (None, Some(offset)) if offset > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(Value::Integer(clamp_i64(offset)));
            }
            (None, _) => {}
        }

        (sql, params)
    }

    /// Row-count projection; ordering and paging are ignored.
    pub(crate) fn count_sql(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(T::TABLE));
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params);
        (sql, params)
    }

    fn compare(mut self, field: Field<T>, op: CompareOp, value: Value) -> Self {
        self.restrictions.push(Restriction::Compare {
            column: field.name(),
            op,
            value,
        });
        self
    }

    fn push_where(&self, sql: &mut String, params: &mut Vec<Value>) {
        if self.restrictions.is_empty() {
            return;
        }

        let mut clauses = Vec::with_capacity(self.restrictions.len());
        for restriction in &self.restrictions {
            match restriction {
                Restriction::Compare { column, op, value } => {
                    clauses.push(format!("{} {} ?", quote_ident(column), op.as_sql()));
                    params.push(value.clone());
                }
                Restriction::Like { column, pattern } => {
                    clauses.push(format!("{} LIKE ?", quote_ident(column)));
                    params.push(Value::Text(pattern.clone()));
                }
                Restriction::IsNull(column) => {
                    clauses.push(format!("{} IS NULL", quote_ident(column)));
                }
                Restriction::IsNotNull(column) => {
                    clauses.push(format!("{} IS NOT NULL", quote_ident(column)));
                }
                Restriction::In { values, .. } if values.is_empty() => {
                    clauses.push("1 = 0".to_string());
                }
                Restriction::In { column, values } => {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} IN ({placeholders})", quote_ident(column)));
                    params.extend(values.iter().cloned());
                }
            }
        }

        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
}

impl<T: Entity> Default for Criteria<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Criteria<T> {
    fn clone(&self) -> Self {
        Self {
            restrictions: self.restrictions.clone(),
            orders: self.orders.clone(),
            first_result: self.first_result,
            max_results: self.max_results,
            _entity: PhantomData,
        }
    }
}

impl<T> Debug for Criteria<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Criteria")
            .field("restrictions", &self.restrictions)
            .field("orders", &self.orders)
            .field("first_result", &self.first_result)
            .field("max_results", &self.max_results)
            .finish()
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

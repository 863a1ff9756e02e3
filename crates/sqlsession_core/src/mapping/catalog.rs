use super::Entity;
use crate::config::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Table-level mapping of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    pub table: &'static str,
    pub id_column: &'static str,
    pub columns: &'static [&'static str],
}

impl EntityMapping {
    pub fn of<T: Entity>() -> Self {
        Self {
            table: T::TABLE,
            id_column: T::ID_COLUMN,
            columns: T::COLUMNS,
        }
    }
}

/// Named set of entity mappings, plus optional schema DDL.
///
/// The session factory picks the catalog whose name matches the configured
/// mapping name.
#[derive(Debug, Clone, Default)]
pub struct MappingCatalog {
    name: String,
    entities: Vec<EntityMapping>,
    schema_sql: Option<String>,
}

impl MappingCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            schema_sql: None,
        }
    }

    pub fn with_entity<T: Entity>(mut self) -> Self {
        self.entities.push(EntityMapping::of::<T>());
        self
    }

    /// DDL (and optional seed statements) applied once when the factory is built.
    pub fn with_schema(mut self, sql: impl Into<String>) -> Self {
        self.schema_sql = Some(sql.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entities(&self) -> &[EntityMapping] {
        &self.entities
    }

    pub fn schema_sql(&self) -> Option<&str> {
        self.schema_sql.as_deref()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.entities.iter().any(|mapping| mapping.table == table)
    }

    /// Rejects identifiers that cannot be safely quoted into SQL.
    pub(crate) fn validate_identifiers(&self) -> Result<(), ConfigError> {
        for mapping in &self.entities {
            let names = std::iter::once(mapping.table)
                .chain(std::iter::once(mapping.id_column))
                .chain(mapping.columns.iter().copied());
            for name in names {
                if !IDENTIFIER_RE.is_match(name) {
                    return Err(ConfigError::InvalidMapping(format!(
                        "`{name}` in mapping for `{}` is not a plain SQL identifier",
                        mapping.table
                    )));
                }
            }
        }
        Ok(())
    }

    /// Verifies that every mapped table and column exists.
    pub(crate) fn verify_schema(&self, conn: &Connection) -> Result<(), ConfigError> {
        for mapping in &self.entities {
            let columns = table_columns(conn, mapping.table)?;
            if columns.is_empty() {
                return Err(ConfigError::InvalidMapping(format!(
                    "mapped table `{}` does not exist",
                    mapping.table
                )));
            }
            let expected = std::iter::once(mapping.id_column).chain(mapping.columns.iter().copied());
            for column in expected {
                if !columns.iter().any(|current| current.eq_ignore_ascii_case(column)) {
                    return Err(ConfigError::InvalidMapping(format!(
                        "mapped column `{column}` is missing from table `{}`",
                        mapping.table
                    )));
                }
            }
        }
        Ok(())
    }
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, ConfigError> {
    let inspect = || -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\");"))?;
        let mut rows = stmt.query([])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            columns.push(row.get::<_, String>(1)?);
        }
        Ok(columns)
    };
    inspect().map_err(|err| {
        ConfigError::InvalidMapping(format!("failed to inspect table `{table}`: {err}"))
    })
}

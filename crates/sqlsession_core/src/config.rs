//! Configuration section for session management.
//!
//! # Responsibility
//! - Deserialize the `sqlsession` configuration section.
//! - Validate required nodes and resolve the transaction scope policy.
//!
//! # Invariants
//! - A `Config` value always names a non-empty mapping catalog.
//! - The transaction scope defaults to `Request` when the node is absent.
//! - Validation failures are reported, never replaced with defaults.

use crate::logging::LoggingConfig;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Top-level key of the configuration section inside a JSON document.
pub const CONFIG_SECTION_NAME: &str = "sqlsession";

/// Configuration errors raised while loading or validating the section.
#[derive(Debug)]
pub enum ConfigError {
    MissingSection(&'static str),
    MissingFluentMapping,
    MissingAssemblyAttribute,
    EmptyAssembly,
    MissingScopeValue,
    UnsupportedScope(String),
    UnknownCatalog(String),
    InvalidMapping(String),
    InitializationFailed(String),
    Parse(serde_json::Error),
    Io { path: PathBuf, source: std::io::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSection(name) => write!(f, "the `{name}` config section cannot be null"),
            Self::MissingFluentMapping => {
                write!(f, "the config section does not have a `fluentMapping` node")
            }
            Self::MissingAssemblyAttribute => {
                write!(f, "the `fluentMapping` node does not have an `assembly` value")
            }
            Self::EmptyAssembly => write!(f, "the `fluentMapping.assembly` value is empty"),
            Self::MissingScopeValue => {
                write!(f, "the `transactionScope` node does not have a `value`")
            }
            Self::UnsupportedScope(value) => write!(
                f,
                "unsupported transaction scope `{value}`; expected request|batch|statement|method"
            ),
            Self::UnknownCatalog(name) => {
                write!(f, "no mapping catalog named `{name}` is registered")
            }
            Self::InvalidMapping(message) => write!(f, "invalid mapping: {message}"),
            Self::InitializationFailed(message) => {
                write!(f, "session manager initialization failed: {message}")
            }
            Self::Parse(err) => write!(f, "failed to parse configuration: {err}"),
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Whether a transaction spans the unit of work or each write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionScope {
    /// One transaction per unit of work ("request" / "batch").
    #[default]
    Request,
    /// One transaction per repository write ("statement" / "method").
    Statement,
}

impl TransactionScope {
    /// Parses a scope value. Empty input resolves to the default scope.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "request" | "batch" => Ok(Self::Request),
            "statement" | "method" => Ok(Self::Statement),
            other => Err(ConfigError::UnsupportedScope(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Statement => "statement",
        }
    }

    /// Returns whether the lifecycle adapter owns the transaction.
    pub fn is_unit_of_work(self) -> bool {
        self == Self::Request
    }
}

/// Raw `fluentMapping` node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FluentMappingNode {
    pub assembly: Option<String>,
}

/// Raw `transactionScope` node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionScopeNode {
    pub value: Option<String>,
}

/// Raw configuration section as it appears in the host document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSection {
    pub fluent_mapping: Option<FluentMappingNode>,
    pub transaction_scope: Option<TransactionScopeNode>,
    pub logging: Option<LoggingConfig>,
}

/// Validated session-management configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name of the mapping catalog holding entity-to-table mappings.
    pub fluent_mapping_assembly_name: String,
    pub transaction_scope: TransactionScope,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Builds a config directly from already-validated values.
    pub fn new(mapping_catalog: impl Into<String>, transaction_scope: TransactionScope) -> Self {
        Self {
            fluent_mapping_assembly_name: mapping_catalog.into(),
            transaction_scope,
            logging: None,
        }
    }

    /// Validates a raw section. `None` means the section is missing.
    pub fn from_section(section: Option<&ConfigSection>) -> Result<Self, ConfigError> {
        let section = section.ok_or(ConfigError::MissingSection(CONFIG_SECTION_NAME))?;

        let mapping = section
            .fluent_mapping
            .as_ref()
            .ok_or(ConfigError::MissingFluentMapping)?;
        let assembly = mapping
            .assembly
            .as_deref()
            .ok_or(ConfigError::MissingAssemblyAttribute)?
            .trim();
        if assembly.is_empty() {
            return Err(ConfigError::EmptyAssembly);
        }

        let transaction_scope = match section.transaction_scope.as_ref() {
            None => TransactionScope::default(),
            Some(node) => {
                let value = node
                    .value
                    .as_deref()
                    .ok_or(ConfigError::MissingScopeValue)?;
                TransactionScope::parse(value)?
            }
        };

        Ok(Self {
            fluent_mapping_assembly_name: assembly.to_string(),
            transaction_scope,
            logging: section.logging.clone(),
        })
    }

    /// Parses a JSON document and validates its `sqlsession` section.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let mut root: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(document).map_err(ConfigError::Parse)?;
        let section = match root.remove(CONFIG_SECTION_NAME) {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(
                serde_json::from_value::<ConfigSection>(value).map_err(ConfigError::Parse)?,
            ),
        };
        Self::from_section(section.as_ref())
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&document)
    }
}

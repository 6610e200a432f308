//! Error types for the term-mine library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`MineError`] enum. Errors fall into two groups: failures that only abort
//! the current unit of work (a table or a lattice level), and configuration
//! errors that must stop the whole run. See [`MineError::is_unit_local`].

use thiserror::Error;

/// The main error type for the term-mine library.
#[derive(Error, Debug)]
pub enum MineError {
    /// An attribute was referenced that the loaded schema does not contain.
    #[error("Attribute '{attribute}' not found in table '{table}'")]
    AttributeNotFound {
        /// Table whose schema was searched
        table: String,
        /// The missing attribute name
        attribute: String,
    },

    /// An item label is unknown to the transaction set.
    #[error("Item '{0}' not found in transaction set")]
    ItemNotFound(String),

    /// Error from data source operations (fetching rows or transactions).
    #[error("Data source error: {message}")]
    DataSource {
        /// Type of data source (e.g., "Memory", "DataFusion")
        source_type: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations, typically while writing reports.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input passed to an engine.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Security-related error, e.g. a malformed SQL identifier.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// A lattice level could not be completed.
    #[error("Level {level} aborted: {message}")]
    LevelAborted {
        /// The level being generated when the failure occurred
        level: usize,
        /// Detailed error message
        message: String,
    },

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, MineError>`.
pub type Result<T> = std::result::Result<T, MineError>;

impl MineError {
    /// Creates a new attribute-not-found error.
    pub fn attribute_not_found(table: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            table: table.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates a new data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new data source error with a source error.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a level-aborted error.
    pub fn level_aborted(level: usize, message: impl Into<String>) -> Self {
        Self::LevelAborted {
            level,
            message: message.into(),
        }
    }

    /// Returns true if this error only invalidates the current unit of work.
    ///
    /// Fetch and counting failures abort one table or one lattice level and
    /// the run continues. Everything else is a programming or configuration
    /// error and must stop the run.
    pub fn is_unit_local(&self) -> bool {
        matches!(
            self,
            Self::DataSource { .. }
                | Self::DataFusion(_)
                | Self::Arrow(_)
                | Self::LevelAborted { .. }
        )
    }
}

impl From<serde_json::Error> for MineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<MineError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                MineError::Internal(inner) => MineError::Internal(format!("{msg}: {inner}")),
                other => MineError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}

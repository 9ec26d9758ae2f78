//! Error types for epitrack operations

use thiserror::Error;

/// Selection errors raised when a user-supplied name matches nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Country '{query}' cannot be found")]
    CountryNotFound { query: String },

    #[error("Region '{region}' cannot be found in '{country}'")]
    RegionNotFound { country: String, region: String },
}

/// Population table errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PopulationError {
    #[error("No population known for iso3 '{iso3}'")]
    NotFound { iso3: String },

    #[error("Population source unavailable: {reason}")]
    SourceUnavailable { reason: String },
}

/// Errors raised while building a snapshot from upstream sources.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Fetching {source_name} failed: {reason}")]
    Fetch { source_name: String, reason: String },

    #[error("CSV decoding failed for {dataset}: {reason}")]
    Csv { dataset: String, reason: String },

    #[error("Column '{column}' missing from {dataset}")]
    MissingColumn { dataset: String, column: String },

    #[error("Header '{header}' in {dataset} is not a MM/DD/YY date")]
    MalformedDate { dataset: String, header: String },

    #[error("Value '{value}' at row {row}, column '{column}' in {dataset} is not a count")]
    MalformedValue {
        dataset: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("Reference document {document} unusable: {reason}")]
    Reference { document: String, reason: String },
}

/// Snapshot store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Persisted document {document} is missing")]
    DocumentMissing { document: String },

    #[error("Persisted document {document} cannot be decoded: {reason}")]
    Decode { document: String, reason: String },

    #[error("Writing {path} failed: {reason}")]
    Write { path: String, reason: String },
}

/// Catch-all for computation failures that are not selection misses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DerivationError {
    #[error("{reason}")]
    Failed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all epitrack errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EpiError {
    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("Population error: {0}")]
    Population(#[from] PopulationError),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown data type '{value}', expected confirmed | deaths | recovered")]
    InvalidDataType { value: String },
}

impl EpiError {
    /// Shorthand for a generic derivation failure.
    pub fn derivation(reason: impl Into<String>) -> Self {
        Self::Derivation(DerivationError::Failed {
            reason: reason.into(),
        })
    }

    /// True for selection misses, which a boundary reports as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    /// Stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query(QueryError::CountryNotFound { .. }) => "CountryNotFound",
            Self::Query(QueryError::RegionNotFound { .. }) => "RegionNotFound",
            Self::Population(PopulationError::NotFound { .. }) => "PopulationNotFound",
            Self::Ingest(_) => "IngestionFailed",
            Self::Population(PopulationError::SourceUnavailable { .. })
            | Self::Storage(_)
            | Self::Derivation(_)
            | Self::Config(_)
            | Self::InvalidDataType { .. } => "DerivationFailed",
        }
    }

    /// `"<Kind> : <message>"`, the shape callers put in error bodies.
    pub fn boundary_message(&self) -> String {
        format!("{} : {}", self.kind(), self)
    }
}

/// Result type alias for epitrack operations.
pub type EpiResult<T> = Result<T, EpiError>;

// =============================================================================
// TESTS
// =============================================================================

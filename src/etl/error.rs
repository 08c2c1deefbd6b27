//! Error kinds surfaced by the ETL pipeline

use thiserror::Error;

/// Failures that abort a run. Rows excluded by data-quality rules are not
/// errors; they are counted in the stage report instead.
#[derive(Debug, Error)]
pub enum EtlError {
    /// A required field is absent, or a field cannot be read as its declared shape
    #[error("{collection}[{index}]: field `{field}` {reason}")]
    SourceShape {
        collection: &'static str,
        index: usize,
        field: &'static str,
        reason: String,
    },

    /// A transformation stage failed; wraps the underlying cause
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<EtlError>,
    },

    #[error("listings collection is empty: no surviving listing ids can be formed")]
    EmptyListings,

    #[error("source collection not found: {0}")]
    MissingSource(String),

    #[error("failed to fetch collection {name}: {reason}")]
    Fetch { name: String, reason: String },

    #[error("failed to load table {table}: {source}")]
    Load {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type EtlResult<T> = Result<T, EtlError>;

impl EtlError {
    pub fn shape(
        collection: &'static str,
        index: usize,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        EtlError::SourceShape {
            collection,
            index,
            field,
            reason: reason.into(),
        }
    }

    /// Tag this error with the transformation stage it came from
    pub fn in_stage(self, stage: &'static str) -> Self {
        EtlError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    pub fn is_source_shape(&self) -> bool {
        match self {
            EtlError::SourceShape { .. } => true,
            EtlError::Stage { source, .. } => source.is_source_shape(),
            _ => false,
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocusError {
    #[error("Resolve error: {0}")]
    ResolveError(#[from] crate::resolve::ResolveError),
    #[error("Index error: {0}")]
    IndexError(#[from] crate::index::IndexError),
    #[error("Spatial store error: {0}")]
    SpatialError(#[from] crate::spatial::SpatialError),
    #[error("Entity error: {0}")]
    EntityError(#[from] crate::entity::EntityError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] locus_data_processing::DataError),
    #[error("DataFrame error: {0}")]
    DataFrame(#[from] polars::prelude::PolarsError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LocusError>;

//! Data layer for the `locus` geocoder.
//!
//! Entities and their geometries live in two polars frames: an entity frame with one
//! row per place (see [`schema`] for the column layout) and a geometry frame holding
//! the stored shape of every entity that has one. This crate owns the column layout,
//! persistent parquet storage under the data directory, and deterministic fixture
//! frames used by tests and demos.
use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::warn;

pub mod processed;
pub mod schema;
pub mod test_data;

static TEST_DATA_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
    tempfile::TempDir::new().expect("Failed to create global temporary test data directory")
});

pub const DATA_DIR_DEFAULT: &str = "./locus_data";
pub const DATA_DIR_ENV: &str = "LOCUS_DATA_DIR";

/// Global data directory path.
///
/// Resolution order: the `LOCUS_DATA_DIR` environment variable, the platform data
/// directory (with the `system-dirs` feature), then [`DATA_DIR_DEFAULT`]. Unit tests
/// always use a throwaway temporary directory.
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if cfg!(test) {
        let temp_dir = TEST_DATA_DIR.path().to_path_buf();
        warn!(temp_dir = ?temp_dir, "Using temporary data directory for tests");
        return temp_dir;
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    #[cfg(feature = "system-dirs")]
    if let Some(dirs) = directories::ProjectDirs::from("", "", "locus") {
        return dirs.data_dir().to_path_buf();
    }
    PathBuf::from(DATA_DIR_DEFAULT)
});

pub fn get_data_dir() -> &'static std::path::Path {
    DATA_DIR.as_path()
}

mod error {
    use polars::prelude::PolarsError;
    use std::path::PathBuf;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum DataError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Polars error: {0}")]
        Polars(#[from] PolarsError),
        #[error("Serialization error: {0}")]
        Serde(#[from] serde_json::Error),
        #[error("Required data files not found in {}", .0.display())]
        RequiredFilesNotFound(PathBuf),
        #[error("Column '{column}' is missing from the {frame} frame")]
        MissingColumn { frame: &'static str, column: String },
    }

    pub type Result<T> = std::result::Result<T, DataError>;
}

pub use error::{DataError, Result};

// Re-export main types
pub use processed::{DatasetMetadata, EntityData};
pub use test_data::{sample_entities, sample_geometries};

#[cfg(test)]
pub(crate) mod tests_utils {
    use polars::prelude::*;

    pub fn assert_has_columns(df: &DataFrame, expected_columns: &[&str]) {
        let actual_columns: Vec<_> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        for expected_col in expected_columns {
            assert!(
                actual_columns.contains(expected_col),
                "Missing column: {}. Available columns: {:?}",
                expected_col,
                actual_columns
            );
        }
    }

    pub fn assert_no_nulls_in_column(df: &DataFrame, column: &str) {
        let null_count = df
            .column(column)
            .unwrap_or_else(|_| panic!("Column '{}' not found", column))
            .null_count();
        assert_eq!(
            null_count, 0,
            "Column '{}' contains {} null values",
            column, null_count
        );
    }
}

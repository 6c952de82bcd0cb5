use super::error::Result;
use once_cell::sync::OnceCell;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub mod frames;

pub use frames::{EntityRow, GeometryRow, PlaceRefRow, entity_frame, geometry_frame};

use crate::{DataError, schema};

const ENTITIES_PARQUET: &str = "entities.parquet";
const GEOMETRIES_PARQUET: &str = "geometries.parquet";
const METADATA_JSON: &str = "metadata.json";

/// Summary written next to a saved dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub version: String,
    pub generated_at: String,
    pub description: String,
    pub entity_rows: usize,
    pub geometry_rows: usize,
}

/// The entity and geometry frames backing a gazetteer.
///
/// Frames are either held in memory (built by an ingestion step or a fixture) or
/// lazily loaded from parquet files in a dataset directory, once, on first access.
#[derive(Clone)]
pub struct EntityData {
    entities_path: Option<PathBuf>,
    geometries_path: Option<PathBuf>,
    entities_df: OnceCell<LazyFrame>,
    geometries_df: OnceCell<LazyFrame>,
}

impl std::fmt::Debug for EntityData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityData")
            .field("entities_path", &self.entities_path)
            .field("geometries_path", &self.geometries_path)
            .field("entities_loaded", &self.entities_df.get().is_some())
            .field("geometries_loaded", &self.geometries_df.get().is_some())
            .finish()
    }
}

impl EntityData {
    /// Use the dataset stored under `<DATA_DIR>/processed`.
    pub fn new() -> Result<Self> {
        Self::open(crate::get_data_dir().join("processed"))
    }

    /// Use the dataset stored in `dir`. Both parquet files must exist.
    #[instrument(name = "Open EntityData", skip_all, fields(dir = ?dir.as_ref()))]
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entities_path = dir.join(ENTITIES_PARQUET);
        let geometries_path = dir.join(GEOMETRIES_PARQUET);
        if !entities_path.exists() || !geometries_path.exists() {
            return Err(DataError::RequiredFilesNotFound(dir.to_path_buf()));
        }
        info!("EntityData: Using persistent parquet files");
        Ok(Self {
            entities_path: Some(entities_path),
            geometries_path: Some(geometries_path),
            entities_df: OnceCell::new(),
            geometries_df: OnceCell::new(),
        })
    }

    /// Wrap frames that are already in memory.
    pub fn from_frames(entities: DataFrame, geometries: DataFrame) -> Result<Self> {
        schema::ensure_entity_frame(&entities)?;
        schema::ensure_geometry_frame(&geometries)?;
        Ok(Self {
            entities_path: None,
            geometries_path: None,
            entities_df: OnceCell::with_value(entities.lazy()),
            geometries_df: OnceCell::with_value(geometries.lazy()),
        })
    }

    /// The bundled fixture dataset.
    pub fn sample() -> Result<Self> {
        Self::from_frames(
            crate::test_data::sample_entities()?,
            crate::test_data::sample_geometries()?,
        )
    }

    pub fn entities_df(&self) -> Result<LazyFrame> {
        self.entities_df
            .get_or_try_init(|| Self::get_data(self.entities_path.as_deref()))
            .cloned()
    }

    pub fn geometries_df(&self) -> Result<LazyFrame> {
        self.geometries_df
            .get_or_try_init(|| Self::get_data(self.geometries_path.as_deref()))
            .cloned()
    }

    fn get_data(path: Option<&Path>) -> Result<LazyFrame> {
        let path = path.ok_or_else(|| DataError::RequiredFilesNotFound(PathBuf::new()))?;
        info!(
            path = ?path.file_stem(),
            "Loading and collecting into memory for the first time..."
        );
        let t_load = std::time::Instant::now();
        let df = LazyFrame::scan_parquet(path, Default::default())?.collect()?;
        info!(
            path = ?path.file_stem(),
            rows = df.height(),
            load_time = ?t_load.elapsed(),
            "Loaded parquet file"
        );
        Ok(df.lazy())
    }

    /// Write both frames and a `metadata.json` into `dir`, returning the metadata.
    #[instrument(name = "Save EntityData", skip_all, fields(dir = ?dir.as_ref()))]
    pub fn save(&self, dir: impl AsRef<Path>, description: &str) -> Result<DatasetMetadata> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let save_df_to_parquet = |lf: LazyFrame, path: &Path| -> Result<usize> {
            let sink_time = std::time::Instant::now();
            let mut df = lf
                .drop_nulls(Some(vec![schema::ID.into()]))
                .sort([schema::ID], SortMultipleOptions::default())
                .collect()?;
            let mut file = std::fs::File::create(path)?;
            ParquetWriter::new(&mut file).finish(&mut df)?;
            info!(
                path = ?path.file_stem(),
                sink_time = ?sink_time.elapsed(),
                "Saved to parquet file"
            );
            Ok(df.height())
        };

        let entity_rows = save_df_to_parquet(self.entities_df()?, &dir.join(ENTITIES_PARQUET))?;
        let geometry_rows =
            save_df_to_parquet(self.geometries_df()?, &dir.join(GEOMETRIES_PARQUET))?;

        let metadata = DatasetMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            description: description.to_string(),
            entity_rows,
            geometry_rows,
        };
        std::fs::write(
            dir.join(METADATA_JSON),
            serde_json::to_string_pretty(&metadata)?,
        )?;
        Ok(metadata)
    }

    /// Read the `metadata.json` written by [`EntityData::save`].
    pub fn read_metadata(dir: impl AsRef<Path>) -> Result<DatasetMetadata> {
        let raw = std::fs::read_to_string(dir.as_ref().join(METADATA_JSON))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

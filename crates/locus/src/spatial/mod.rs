//! Geometry frame backed spatial store.
//!
//! Holds the geometry frame (`id`, `geometry_type`, `xs`, `ys`) in memory and
//! answers "how far is each of these ids from this point" by filtering the frame
//! on the requested ids and measuring each stored shape. Distances are planar
//! degrees in the longitude/latitude reference system.

pub use error::SpatialError;
use error::Result;
use itertools::izip;
use locus_data_processing::schema;
use polars::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::entity::{Coordinate, EntityId, Geometry};
use crate::store::{DistanceRanker, RankedCandidate, Stage, StoreError};

/// In-memory spatial store over a geometry frame.
#[derive(Debug, Clone)]
pub struct SpatialStore {
    geometries: DataFrame,
}

impl SpatialStore {
    #[instrument(name = "Load SpatialStore", skip_all)]
    pub fn new(geometries: DataFrame) -> Result<Self> {
        schema::ensure_geometry_frame(&geometries)?;
        info!(rows = geometries.height(), "Spatial store ready");
        Ok(Self { geometries })
    }

    pub fn from_lazy(geometries: LazyFrame) -> Result<Self> {
        Self::new(geometries.collect()?)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.geometries.height()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries.height() == 0
    }

    /// Stored shapes for `ids`, in store row order. Ids without a stored shape
    /// are absent from the result.
    pub fn geometries_for(&self, ids: &[EntityId]) -> Result<Vec<(EntityId, Geometry)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted = Series::new(
            "wanted_ids".into(),
            ids.iter().map(EntityId::as_str).collect::<Vec<_>>(),
        );
        let rows = self
            .geometries
            .clone()
            .lazy()
            .filter(col(schema::ID).is_in(lit(wanted).implode(), false))
            .collect()?;
        decode_geometries(&rows)
    }

    pub fn geometry(&self, id: &EntityId) -> Result<Option<Geometry>> {
        Ok(self
            .geometries_for(std::slice::from_ref(id))?
            .into_iter()
            .next()
            .map(|(_, geometry)| geometry))
    }

    /// Distance from `point` to each stored shape among `ids`, nearest first.
    /// Equal distances keep store row order.
    #[instrument(name = "Rank by distance", skip_all, level = "debug", fields(ids = ids.len()))]
    pub fn distances(&self, ids: &[EntityId], point: Coordinate) -> Result<Vec<RankedCandidate>> {
        let mut ranked: Vec<RankedCandidate> = self
            .geometries_for(ids)?
            .into_iter()
            .map(|(id, geometry)| RankedCandidate {
                distance: geometry.distance_to(point),
                id,
            })
            .collect();
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        debug!(rows = ranked.len(), "Ranked candidates");
        Ok(ranked)
    }
}

impl DistanceRanker for SpatialStore {
    fn rank(
        &self,
        ids: &[EntityId],
        point: Coordinate,
    ) -> std::result::Result<Vec<RankedCandidate>, StoreError> {
        self.distances(ids, point)
            .map_err(|e| StoreError::backend(Stage::Ranking, e))
    }
}

fn coordinates(values: Option<Series>) -> Result<Option<Vec<f64>>> {
    let Some(values) = values else {
        return Ok(None);
    };
    Ok(values
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect::<Option<Vec<f64>>>())
}

/// Decode geometry frame rows. Rows that do not form a valid shape are skipped.
fn decode_geometries(df: &DataFrame) -> Result<Vec<(EntityId, Geometry)>> {
    let ids = df.column(schema::ID)?.str()?;
    let types = df.column(schema::GEOMETRY_TYPE)?.str()?;
    let xs = df.column(schema::XS)?.list()?;
    let ys = df.column(schema::YS)?.list()?;

    let mut decoded = Vec::with_capacity(df.height());
    for (id, geometry_type, xs, ys) in izip!(ids, types, xs, ys) {
        let (Some(id), Some(geometry_type)) = (id, geometry_type) else {
            warn!(?id, "Skipping geometry row without id or type");
            continue;
        };
        let (Some(xs), Some(ys)) = (coordinates(xs)?, coordinates(ys)?) else {
            warn!(id, "Skipping geometry row with missing coordinates");
            continue;
        };
        match Geometry::from_parts(geometry_type, &xs, &ys) {
            Ok(geometry) => decoded.push((EntityId::from(id), geometry)),
            Err(e) => warn!(id, error = %e, "Skipping invalid geometry row"),
        }
    }
    Ok(decoded)
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum SpatialError {
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
        #[error("Data error: {0}")]
        Data(#[from] locus_data_processing::DataError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, SpatialError>;
}

//! Locus - place entities, autocomplete suggestions and street resolution
//!
//! Locus models geocoded places (countries, regions, counties, local admin areas,
//! localities, neighborhoods and streets), turns any of them into a weighted
//! autocomplete suggestion record, and resolves a free-text street name plus a
//! reference point to the single closest matching street.
//!
//! # Quick Start
//!
//! ```rust
//! use locus::{Gazetteer, StreetRequest};
//!
//! let gazetteer = Gazetteer::sample()?;
//!
//! // Resolve one street near a point
//! if let Some(street) = gazetteer.resolve_street(Some("Monroe St"), Some(39.802), Some(-89.645))? {
//!     println!("Found: {} ({})", street.name, street.id);
//! }
//!
//! // Resolve many at once
//! let results = gazetteer.resolve_streets_bulk(&[
//!     StreetRequest::new("Main St", 39.8, -89.645),
//!     StreetRequest::new("Main St", 41.88, -87.625),
//! ]);
//! assert_eq!(results.len(), 2);
//!
//! // Autocomplete records for everything loaded
//! let suggestions = gazetteer.suggestions();
//! assert!(!suggestions.is_empty());
//! # Ok::<(), locus::error::LocusError>(())
//! ```
//!
//! # Resolution
//!
//! Street resolution runs in two phases: a Tantivy text and radius query picks up
//! to 50 candidates within 10 km, then a spatial store ranks them by exact
//! distance to their stored geometry. Both phases sit behind traits
//! ([`CandidateSource`], [`DistanceRanker`], [`EntityStore`]) so the
//! [`StreetResolver`] can run against other backends.
//!
//! # Data
//!
//! Entity and geometry frames are loaded through
//! [`locus_data_processing::EntityData`], either from parquet files under the data
//! directory or from the bundled Springfield, IL fixture.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod entity;
pub mod error;
mod index;
mod resolve;
mod spatial;
pub mod store;
mod suggest;

pub use core::{Gazetteer, GazetteerBuilder, GazetteerInfo, GazetteerResolver};

pub use config::{DEFAULT_CANDIDATE_LIMIT, DEFAULT_RADIUS_KM, ResolveConfig, ResolveConfigBuilder};
pub use entity::{Coordinate, Entity, EntityId, EntityKind, Geometry, ShapeLevel};
pub use index::{IndexError, SearchIndex};
pub use locus_data_processing as data_processing;
pub use locus_data_processing::{DatasetMetadata, EntityData};
pub use polars;
pub use resolve::{ResolveError, StreetRequest, StreetResolver};
pub use spatial::{SpatialError, SpatialStore};
pub use store::{
    CandidateQuery, CandidateSource, DistanceRanker, EntityStore, FrameEntityStore,
    RankedCandidate, Stage, StoreError,
};
pub use suggest::{Suggestion, SuggestionPayload, generate_suggestions, write_suggestions_jsonl};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Locus library.
///
/// Installs a `tracing` subscriber filtered by `RUST_LOG` when set, otherwise by
/// `level`. Later calls are no-ops.
///
/// ```rust
/// use locus::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), locus::error::LocusError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::LocusError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    })
}

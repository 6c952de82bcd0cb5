//! The [`Gazetteer`]: loaded place data with street resolution and suggestions.
//!
//! A gazetteer owns the three stores a street resolution consults, built from
//! one [`EntityData`] source: a Tantivy candidate index over the entity frame, a
//! spatial store over the geometry frame, and an entity store over the decoded
//! entities.
//!
//! # Quick Start
//!
//! ```rust
//! use locus::Gazetteer;
//!
//! // The bundled Springfield, IL fixture, indexed in memory
//! let gazetteer = Gazetteer::sample()?;
//!
//! let street = gazetteer.resolve_street(Some("Main St"), Some(39.8005), Some(-89.645))?;
//! assert_eq!(street.map(|s| s.id.to_string()).as_deref(), Some("way-100"));
//!
//! let suggestion = gazetteer.suggest("way-100").unwrap();
//! assert_eq!(suggestion.output, "Main St, Springfield, IL");
//! # Ok::<(), locus::error::LocusError>(())
//! ```

use std::io::Write;
use std::path::PathBuf;

use locus_data_processing::EntityData;
use polars::prelude::IntoLazy;
use rayon::prelude::*;
use tracing::{info, instrument};

use crate::{
    config::ResolveConfig,
    entity::{Entity, EntityId},
    error::LocusError,
    index::SearchIndex,
    resolve::{StreetRequest, StreetResolver},
    spatial::SpatialStore,
    store::FrameEntityStore,
    suggest::{Suggestion, generate_suggestions, write_suggestions_jsonl},
};

pub type GazetteerResolver = StreetResolver<SearchIndex, SpatialStore, FrameEntityStore>;

/// Loaded place data with street resolution and suggestion synthesis.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    resolver: GazetteerResolver,
}

impl Gazetteer {
    /// Load the dataset under the data directory, reusing the on-disk index when
    /// it is up to date.
    #[instrument(name = "Initialize Gazetteer", level = "info")]
    pub fn new() -> Result<Self, LocusError> {
        GazetteerBuilder::new()
            .data(EntityData::new()?)
            .persistent_index(true)
            .build()
    }

    /// The bundled fixture dataset with an in-memory index.
    pub fn sample() -> Result<Self, LocusError> {
        GazetteerBuilder::new().data(EntityData::sample()?).build()
    }

    #[must_use]
    pub fn builder() -> GazetteerBuilder {
        GazetteerBuilder::new()
    }

    pub fn from_components(resolver: GazetteerResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &GazetteerResolver {
        &self.resolver
    }

    pub fn config(&self) -> &ResolveConfig {
        self.resolver.config()
    }

    pub fn info(&self) -> GazetteerInfo {
        GazetteerInfo {
            entities: self.resolver.entity_store().len(),
            geometries: self.resolver.ranker().len(),
            indexed_documents: self.resolver.candidate_source().num_docs(),
        }
    }

    /// Resolve a street name near a point. `Ok(None)` when nothing matches or
    /// the input is unusable.
    pub fn resolve_street(
        &self,
        street_name: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<Option<Entity>, LocusError> {
        self.resolver
            .resolve(street_name, lat, lon)
            .map_err(From::from)
    }

    /// Resolve many streets in parallel. Results keep request order.
    pub fn resolve_streets_bulk(
        &self,
        requests: &[StreetRequest],
    ) -> Vec<Result<Option<Entity>, LocusError>> {
        self.resolver
            .resolve_bulk(requests)
            .into_iter()
            .map(|result| result.map_err(From::from))
            .collect()
    }

    /// The entity with `id`, with its stored shape attached.
    pub fn find(&self, id: impl Into<EntityId>) -> Result<Option<Entity>, LocusError> {
        self.resolver
            .entity_store()
            .fetch(&id.into())
            .map_err(From::from)
    }

    /// The suggestion record of the entity with `id`.
    pub fn suggest(&self, id: impl Into<EntityId>) -> Option<Suggestion> {
        self.resolver
            .entity_store()
            .get(&id.into())
            .map(generate_suggestions)
    }

    /// Suggestion records of every loaded entity, in entity order.
    #[instrument(name = "Generate Suggestions", level = "info", skip(self))]
    pub fn suggestions(&self) -> Vec<Suggestion> {
        let suggestions: Vec<Suggestion> = self
            .resolver
            .entity_store()
            .entities()
            .par_iter()
            .map(generate_suggestions)
            .collect();
        info!(count = suggestions.len(), "Generated suggestions");
        suggestions
    }

    /// Write every suggestion as JSON lines. Returns the number of records.
    pub fn write_suggestions<W: Write>(&self, writer: &mut W) -> Result<usize, LocusError> {
        Ok(write_suggestions_jsonl(writer, &self.suggestions())?)
    }
}

/// Sizes of the loaded stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GazetteerInfo {
    pub entities: usize,
    pub geometries: usize,
    pub indexed_documents: u64,
}

impl GazetteerInfo {
    /// Get a human-readable summary of the gazetteer.
    pub fn summary(&self) -> String {
        format!(
            "Gazetteer with {} entities, {} geometries and {} indexed documents",
            self.entities, self.geometries, self.indexed_documents
        )
    }
}

/// Builder for creating a [`Gazetteer`] with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct GazetteerBuilder {
    data: Option<EntityData>,
    config: ResolveConfig,
    index_dir: Option<PathBuf>,
    persistent_index: bool,
    force_rebuild: bool,
}

impl GazetteerBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the data source. Defaults to the dataset under the data directory.
    #[must_use]
    pub fn data(mut self, data: EntityData) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn config(mut self, config: ResolveConfig) -> Self {
        self.config = config;
        self
    }

    /// Keep the candidate index in `dir` instead of memory.
    #[must_use]
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    /// Keep the candidate index under the data directory instead of memory.
    #[must_use]
    pub fn persistent_index(mut self, persistent: bool) -> Self {
        self.persistent_index = persistent;
        self
    }

    /// Force rebuilding of an on-disk index.
    #[must_use]
    pub fn force_rebuild(mut self, rebuild: bool) -> Self {
        self.force_rebuild = rebuild;
        self
    }

    /// Build the `Gazetteer`.
    #[instrument(name = "Build Gazetteer", level = "info", skip(self))]
    pub fn build(self) -> Result<Gazetteer, LocusError> {
        self.config.validate()?;
        let data = match self.data {
            Some(data) => data,
            None => EntityData::new()?,
        };
        let entities = data.entities_df()?.collect()?;
        let shapes = SpatialStore::from_lazy(data.geometries_df()?)?;

        let index = match self.index_dir {
            Some(dir) => SearchIndex::open_or_create(dir, &entities, self.force_rebuild)?,
            None if self.persistent_index => {
                SearchIndex::new(entities.clone().lazy(), self.force_rebuild)?
            }
            None => SearchIndex::in_memory(&entities)?,
        };
        let store = FrameEntityStore::new(&entities, Some(shapes.clone()))?;

        let gazetteer = Gazetteer::from_components(StreetResolver::with_config(
            index,
            shapes,
            store,
            self.config,
        ));
        info!(summary = gazetteer.info().summary(), "Gazetteer ready");
        Ok(gazetteer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolveConfigBuilder;
    use crate::entity::{EntityKind, Geometry};

    #[test]
    fn test_sample_gazetteer_info() {
        let gazetteer = Gazetteer::sample().unwrap();
        let info = gazetteer.info();
        assert_eq!(info.entities, 15);
        assert_eq!(info.geometries, 7);
        assert_eq!(info.indexed_documents, 15);
        assert!(info.summary().contains("15 entities"));
    }

    #[test]
    fn test_find_attaches_shape() {
        let gazetteer = Gazetteer::sample().unwrap();
        let street = gazetteer.find("way-103").unwrap().unwrap();
        assert_eq!(street.kind, EntityKind::Street);
        assert!(matches!(street.center_shape, Some(Geometry::LineString(_))));
        assert!(gazetteer.find("way-404").unwrap().is_none());
    }

    #[test]
    fn test_suggestions_cover_every_entity() {
        let gazetteer = Gazetteer::sample().unwrap();
        let suggestions = gazetteer.suggestions();
        assert_eq!(suggestions.len(), 15);

        let lost_prairie = gazetteer.suggest("neighborhood-lost-prairie").unwrap();
        assert_eq!(lost_prairie.weight, 0);
        assert_eq!(lost_prairie.output, "Lost Prairie, IL");

        let vinegar_hill = gazetteer.suggest("neighborhood-vinegar-hill").unwrap();
        assert_eq!(vinegar_hill.weight, 7);
        assert_eq!(vinegar_hill.output, "Vinegar Hill, Capital Township, IL");
    }

    #[test]
    fn test_builder_uses_config() {
        let config = ResolveConfigBuilder::new().radius_km(1.0).build();
        let gazetteer = Gazetteer::builder()
            .data(EntityData::sample().unwrap())
            .config(config)
            .build()
            .unwrap();
        assert_eq!(gazetteer.config().radius_km, 1.0);

        // way-101 is under 1 km from the first point and about 9 km from the second.
        let found = gazetteer
            .resolve_street(Some("Main Street"), Some(39.8), Some(-89.59))
            .unwrap();
        assert_eq!(found.map(|e| e.id.to_string()).as_deref(), Some("way-101"));
        let found = gazetteer
            .resolve_street(Some("Main Street"), Some(39.8), Some(-89.70))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_builder_rejects_unusable_config() {
        for config in [
            ResolveConfigBuilder::new().candidate_limit(0).build(),
            ResolveConfigBuilder::new().radius_km(f64::NAN).build(),
            ResolveConfigBuilder::new().radius_km(-1.0).build(),
        ] {
            let result = Gazetteer::builder()
                .data(EntityData::sample().unwrap())
                .config(config)
                .build();
            assert!(matches!(result, Err(LocusError::ConfigError(_))));
        }
    }

    #[test]
    fn test_write_suggestions() {
        let gazetteer = Gazetteer::sample().unwrap();
        let mut buffer = Vec::new();
        assert_eq!(gazetteer.write_suggestions(&mut buffer).unwrap(), 15);
        assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 15);
    }
}

use ahash::AHashMap;
use polars::prelude::DataFrame;
use tracing::{info, instrument, warn};

use super::{EntityStore, Stage, StoreError};
use crate::entity::{Entity, EntityError, EntityId, Geometry};
use crate::spatial::{SpatialError, SpatialStore};

/// Entity store over a decoded entity frame.
///
/// Rows that fail [`Entity::validate`] are skipped at load time, as are repeated
/// ids after the first. When a spatial store is attached, fetched entities carry
/// their stored shape: polygons as `boundaries`, points and lines as
/// `center_shape`.
#[derive(Debug, Clone)]
pub struct FrameEntityStore {
    entities: Vec<Entity>,
    by_id: AHashMap<EntityId, usize>,
    shapes: Option<SpatialStore>,
}

impl FrameEntityStore {
    #[instrument(name = "Load EntityStore", skip_all, fields(rows = entities.height()))]
    pub fn new(entities: &DataFrame, shapes: Option<SpatialStore>) -> Result<Self, EntityError> {
        let decoded = Entity::from_df(entities)?;
        let total = decoded.len();
        let mut store = Self {
            entities: Vec::with_capacity(total),
            by_id: AHashMap::with_capacity(total),
            shapes,
        };

        for entity in decoded {
            if let Err(e) = entity.validate() {
                warn!(id = %entity.id, error = %e, "Skipping invalid entity");
                continue;
            }
            if store.by_id.contains_key(&entity.id) {
                warn!(id = %entity.id, "Skipping duplicate entity id");
                continue;
            }
            store.by_id.insert(entity.id.clone(), store.entities.len());
            store.entities.push(entity);
        }

        info!(
            loaded = store.entities.len(),
            skipped = total - store.entities.len(),
            "Entity store ready"
        );
        Ok(store)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Loaded entities in frame row order, without shapes attached.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.by_id.get(id).map(|&i| &self.entities[i])
    }

    /// The entity with its stored shape attached.
    pub fn fetch(&self, id: &EntityId) -> Result<Option<Entity>, SpatialError> {
        let Some(entity) = self.get(id) else {
            return Ok(None);
        };
        let mut entity = entity.clone();
        if let Some(shapes) = &self.shapes {
            match shapes.geometry(id)? {
                Some(boundary @ Geometry::Polygon(_)) => entity.boundaries = Some(boundary),
                Some(shape) => entity.center_shape = Some(shape),
                None => {}
            }
        }
        Ok(Some(entity))
    }
}

impl EntityStore for FrameEntityStore {
    fn find(&self, id: &EntityId) -> Result<Option<Entity>, StoreError> {
        self.fetch(id)
            .map_err(|e| StoreError::backend(Stage::Fetch, e))
    }
}

//! Street resolution: a free-text street name plus a reference point to the
//! single closest matching street.
//!
//! Resolution runs as two strictly sequential phases with a not-found short
//! circuit between them:
//!
//! 1. **Candidate retrieval** asks a [`CandidateSource`] for up to
//!    `candidate_limit` street ids matching the name within `radius_km`.
//! 2. **Precise ranking** asks a [`DistanceRanker`] for the exact distance from
//!    the point to each candidate's geometry.
//!
//! The nearest row (first row on ties) is fetched from the [`EntityStore`].
//! Invalid input, empty phases, timeouts and ids missing from a later store all
//! resolve to `Ok(None)`. Any other store failure is returned as a
//! [`ResolveError`].

use rayon::prelude::*;
use tracing::{debug, debug_span, instrument, warn};

pub use error::ResolveError;
use error::Result;

use crate::config::ResolveConfig;
use crate::entity::{Coordinate, Entity};
use crate::store::{CandidateQuery, CandidateSource, DistanceRanker, EntityStore, StoreError};

/// One street resolution request, as accepted by [`StreetResolver::resolve_bulk`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreetRequest {
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl StreetRequest {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: Some(name.into()),
            lat: Some(lat),
            lon: Some(lon),
        }
    }
}

/// Composes a candidate source, a distance ranker and an entity store into the
/// two-phase resolution pipeline. Holds no mutable state; one resolver may serve
/// any number of concurrent resolutions.
#[derive(Debug, Clone)]
pub struct StreetResolver<C, R, E> {
    candidates: C,
    ranker: R,
    entities: E,
    config: ResolveConfig,
}

impl<C, R, E> StreetResolver<C, R, E>
where
    C: CandidateSource,
    R: DistanceRanker,
    E: EntityStore,
{
    pub fn new(candidates: C, ranker: R, entities: E) -> Self {
        Self::with_config(candidates, ranker, entities, ResolveConfig::default())
    }

    pub fn with_config(candidates: C, ranker: R, entities: E, config: ResolveConfig) -> Self {
        Self {
            candidates,
            ranker,
            entities,
            config,
        }
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn candidate_source(&self) -> &C {
        &self.candidates
    }

    pub fn ranker(&self) -> &R {
        &self.ranker
    }

    pub fn entity_store(&self) -> &E {
        &self.entities
    }

    /// Resolve `street_name` near `(lon, lat)` to a street entity.
    #[instrument(name = "Resolve Street", skip(self), level = "debug")]
    pub fn resolve(
        &self,
        street_name: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<Option<Entity>> {
        let Some((name, point)) = valid_input(street_name, lat, lon) else {
            debug!("Invalid input, resolving to not found");
            return Ok(None);
        };

        let query = CandidateQuery {
            name,
            center: point,
            radius_km: self.config.radius_km,
            kind: self.config.street_kind,
            limit: self.config.candidate_limit,
            fuzzy: self.config.fuzzy_search,
        };
        let Some(mut candidates) = not_found_on_timeout(self.candidates.candidates(&query))? else {
            return Ok(None);
        };
        if candidates.is_empty() {
            debug!("No candidates, skipping distance ranking");
            return Ok(None);
        }
        candidates.truncate(self.config.candidate_limit);
        debug!(num_candidates = candidates.len(), "Candidates retrieved");

        let Some(ranked) = not_found_on_timeout(self.ranker.rank(&candidates, point))? else {
            return Ok(None);
        };
        // First row wins ties. Rows without a comparable distance never win.
        let Some(best) = ranked
            .into_iter()
            .filter(|row| !row.distance.is_nan())
            .reduce(|best, row| if row.distance < best.distance { row } else { best })
        else {
            warn!(
                num_candidates = candidates.len(),
                "Spatial store returned no measurable rows for indexed candidates"
            );
            return Ok(None);
        };
        debug!(id = %best.id, distance = best.distance, "Nearest candidate");

        match not_found_on_timeout(self.entities.find(&best.id))? {
            Some(Some(entity)) => Ok(Some(entity)),
            Some(None) => {
                warn!(id = %best.id, "Ranked candidate is missing from the entity store");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Resolve independent requests in parallel. Results keep request order.
    #[instrument(name = "Resolve Streets Bulk", level = "info", skip_all, fields(num_requests = requests.len()))]
    pub fn resolve_bulk(&self, requests: &[StreetRequest]) -> Vec<Result<Option<Entity>>> {
        requests
            .par_iter()
            .enumerate()
            .map(|(i, request)| {
                let _span = debug_span!("Resolve Streets Bulk", request = i).entered();
                self.resolve(request.name.as_deref(), request.lat, request.lon)
            })
            .collect()
    }
}

fn valid_input(
    street_name: Option<&str>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Option<(&str, Coordinate)> {
    let name = street_name.map(str::trim).filter(|n| !n.is_empty())?;
    let point = Coordinate::new(lon?, lat?);
    point.is_valid().then_some((name, point))
}

/// A timed out stage reads as "nothing found"; other failures propagate.
fn not_found_on_timeout<T>(result: std::result::Result<T, StoreError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_timeout() => {
            warn!(stage = %e.stage(), "Store timed out, resolving to not found");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

mod error {
    use thiserror::Error;

    use crate::store::{Stage, StoreError};

    #[derive(Error, Debug)]
    pub enum ResolveError {
        #[error("Store error: {0}")]
        Store(#[from] StoreError),
    }

    impl ResolveError {
        /// Whether the same request may succeed later: the store was unreachable
        /// rather than broken.
        #[must_use]
        pub fn is_retryable(&self) -> bool {
            match self {
                Self::Store(e) => matches!(e, StoreError::Unavailable { .. }),
            }
        }

        #[must_use]
        pub fn stage(&self) -> Stage {
            match self {
                Self::Store(e) => e.stage(),
            }
        }
    }

    pub type Result<T> = std::result::Result<T, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityKind};
    use crate::store::{RankedCandidate, Stage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Scripted<T> = Mutex<Option<std::result::Result<T, StoreError>>>;

    /// Counting fake of all three stores. Each stage returns its scripted result,
    /// or a default when none is set.
    #[derive(Default)]
    struct FakeStores {
        candidate_calls: AtomicUsize,
        rank_calls: AtomicUsize,
        find_calls: AtomicUsize,
        candidates: Scripted<Vec<EntityId>>,
        ranked: Scripted<Vec<RankedCandidate>>,
        missing_entities: bool,
        last_limit: AtomicUsize,
    }

    fn take<T: Default>(scripted: &Scripted<T>) -> std::result::Result<T, StoreError> {
        scripted.lock().unwrap().take().unwrap_or_else(|| Ok(T::default()))
    }

    impl CandidateSource for FakeStores {
        fn candidates(
            &self,
            query: &CandidateQuery<'_>,
        ) -> std::result::Result<Vec<EntityId>, StoreError> {
            self.candidate_calls.fetch_add(1, Ordering::SeqCst);
            self.last_limit.store(query.limit, Ordering::SeqCst);
            take(&self.candidates)
        }
    }

    impl DistanceRanker for FakeStores {
        fn rank(
            &self,
            _ids: &[EntityId],
            _point: Coordinate,
        ) -> std::result::Result<Vec<RankedCandidate>, StoreError> {
            self.rank_calls.fetch_add(1, Ordering::SeqCst);
            take(&self.ranked)
        }
    }

    impl EntityStore for FakeStores {
        fn find(&self, id: &EntityId) -> std::result::Result<Option<Entity>, StoreError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            if self.missing_entities {
                return Ok(None);
            }
            Ok(Some(Entity::new(
                id.clone(),
                EntityKind::Street,
                "Main St",
                Coordinate::new(-89.645, 39.8),
            )))
        }
    }

    impl FakeStores {
        fn calls(&self) -> (usize, usize, usize) {
            (
                self.candidate_calls.load(Ordering::SeqCst),
                self.rank_calls.load(Ordering::SeqCst),
                self.find_calls.load(Ordering::SeqCst),
            )
        }
    }

    type FakeResolver = StreetResolver<Arc<FakeStores>, Arc<FakeStores>, Arc<FakeStores>>;

    fn resolver(stores: FakeStores) -> FakeResolver {
        let stores = Arc::new(stores);
        StreetResolver::new(stores.clone(), stores.clone(), stores)
    }

    fn calls(resolver: &FakeResolver) -> (usize, usize, usize) {
        resolver.candidate_source().calls()
    }

    fn ids(values: &[&str]) -> Vec<EntityId> {
        values.iter().copied().map(EntityId::from).collect()
    }

    #[test]
    fn test_invalid_input_issues_no_calls() {
        let resolver = resolver(FakeStores::default());
        assert!(resolver.resolve(Some(""), Some(39.8), Some(-89.65)).unwrap().is_none());
        assert!(resolver.resolve(Some("   "), Some(39.8), Some(-89.65)).unwrap().is_none());
        assert!(resolver.resolve(None, Some(39.8), Some(-89.65)).unwrap().is_none());
        assert!(resolver.resolve(Some("Main St"), None, None).unwrap().is_none());
        assert!(resolver.resolve(Some("Main St"), Some(39.8), None).unwrap().is_none());
        assert!(resolver.resolve(Some("Main St"), Some(f64::NAN), Some(-89.65)).unwrap().is_none());
        assert!(resolver.resolve(Some("Main St"), Some(95.0), Some(-89.65)).unwrap().is_none());
        assert_eq!(calls(&resolver), (0, 0, 0));
    }

    #[test]
    fn test_no_candidates_skips_ranking() {
        let resolver = resolver(FakeStores::default());
        let found = resolver.resolve(Some("Main St"), Some(39.8), Some(-89.65)).unwrap();
        assert!(found.is_none());
        assert_eq!(calls(&resolver), (1, 0, 0));
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let stores = FakeStores {
            candidates: Mutex::new(Some(Ok(ids(&["A", "B", "C"])))),
            ranked: Mutex::new(Some(Ok(vec![
                RankedCandidate::new("A", 3.2),
                RankedCandidate::new("B", 1.1),
                RankedCandidate::new("C", 5.0),
            ]))),
            ..Default::default()
        };
        let resolver = resolver(stores);
        let found = resolver
            .resolve(Some("Main St"), Some(39.8), Some(-89.65))
            .unwrap()
            .unwrap();
        assert_eq!(found.id.as_str(), "B");
        assert_eq!(calls(&resolver), (1, 1, 1));
    }

    #[test]
    fn test_ties_go_to_first_row() {
        let stores = FakeStores {
            candidates: Mutex::new(Some(Ok(ids(&["A", "B"])))),
            ranked: Mutex::new(Some(Ok(vec![
                RankedCandidate::new("B", 1.0),
                RankedCandidate::new("A", 1.0),
            ]))),
            ..Default::default()
        };
        let found = resolver(stores)
            .resolve(Some("Main St"), Some(39.8), Some(-89.65))
            .unwrap()
            .unwrap();
        assert_eq!(found.id.as_str(), "B");
    }

    #[test]
    fn test_unmeasurable_distance_never_wins() {
        let stores = FakeStores {
            candidates: Mutex::new(Some(Ok(ids(&["A", "B", "C"])))),
            ranked: Mutex::new(Some(Ok(vec![
                RankedCandidate::new("A", f64::NAN),
                RankedCandidate::new("B", 2.0),
                RankedCandidate::new("C", 2.0),
            ]))),
            ..Default::default()
        };
        let found = resolver(stores)
            .resolve(Some("Main St"), Some(39.8), Some(-89.65))
            .unwrap()
            .unwrap();
        assert_eq!(found.id.as_str(), "B");

        let stores = FakeStores {
            candidates: Mutex::new(Some(Ok(ids(&["A"])))),
            ranked: Mutex::new(Some(Ok(vec![RankedCandidate::new("A", f64::NAN)]))),
            ..Default::default()
        };
        let only_nan = resolver(stores);
        assert!(only_nan.resolve(Some("Main St"), Some(39.8), Some(-89.65)).unwrap().is_none());
        assert_eq!(calls(&only_nan), (1, 1, 0));
    }

    #[test]
    fn test_no_ranked_rows_is_not_found() {
        let stores = FakeStores {
            candidates: Mutex::new(Some(Ok(ids(&["A"])))),
            ..Default::default()
        };
        let resolver = resolver(stores);
        assert!(resolver.resolve(Some("Main St"), Some(39.8), Some(-89.65)).unwrap().is_none());
        assert_eq!(calls(&resolver), (1, 1, 0));
    }

    #[test]
    fn test_timeouts_are_not_found() {
        let stores = FakeStores {
            candidates: Mutex::new(Some(Err(StoreError::Timeout {
                stage: Stage::Candidates,
            }))),
            ..Default::default()
        };
        let candidates_timed_out = resolver(stores);
        let found = candidates_timed_out
            .resolve(Some("Main St"), Some(39.8), Some(-89.65))
            .unwrap();
        assert!(found.is_none());
        assert_eq!(calls(&candidates_timed_out), (1, 0, 0));

        let stores = FakeStores {
            candidates: Mutex::new(Some(Ok(ids(&["A"])))),
            ranked: Mutex::new(Some(Err(StoreError::Timeout {
                stage: Stage::Ranking,
            }))),
            ..Default::default()
        };
        let ranking_timed_out = resolver(stores);
        let found = ranking_timed_out
            .resolve(Some("Main St"), Some(39.8), Some(-89.65))
            .unwrap();
        assert!(found.is_none());
        assert_eq!(calls(&ranking_timed_out), (1, 1, 0));
    }

    #[test]
    fn test_unavailable_store_is_retryable_error() {
        let stores = FakeStores {
            candidates: Mutex::new(Some(Err(StoreError::Unavailable {
                stage: Stage::Candidates,
                reason: "connection refused".into(),
            }))),
            ..Default::default()
        };
        let err = resolver(stores)
            .resolve(Some("Main St"), Some(39.8), Some(-89.65))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.stage(), Stage::Candidates);

        let stores = FakeStores {
            candidates: Mutex::new(Some(Ok(ids(&["A"])))),
            ranked: Mutex::new(Some(Err(StoreError::backend(
                Stage::Ranking,
                anyhow::anyhow!("bad geometry column"),
            )))),
            ..Default::default()
        };
        let err = resolver(stores)
            .resolve(Some("Main St"), Some(39.8), Some(-89.65))
            .unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.stage(), Stage::Ranking);
    }

    #[test]
    fn test_entity_missing_from_store_is_not_found() {
        let stores = FakeStores {
            candidates: Mutex::new(Some(Ok(ids(&["A"])))),
            ranked: Mutex::new(Some(Ok(vec![RankedCandidate::new("A", 0.1)]))),
            missing_entities: true,
            ..Default::default()
        };
        let resolver = resolver(stores);
        assert!(resolver.resolve(Some("Main St"), Some(39.8), Some(-89.65)).unwrap().is_none());
        assert_eq!(calls(&resolver), (1, 1, 1));
    }

    #[test]
    fn test_config_limit_reaches_candidate_query() {
        let stores = Arc::new(FakeStores::default());
        let config = crate::config::ResolveConfigBuilder::new()
            .candidate_limit(7)
            .build();
        let resolver =
            StreetResolver::with_config(stores.clone(), stores.clone(), stores.clone(), config);
        resolver.resolve(Some("Main St"), Some(39.8), Some(-89.65)).unwrap();
        assert_eq!(stores.last_limit.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_bulk_keeps_request_order() {
        let resolver = resolver(FakeStores::default());
        let requests = vec![
            StreetRequest::new("Main St", 39.8, -89.65),
            StreetRequest::default(),
            StreetRequest::new("", 39.8, -89.65),
        ];
        let results = resolver.resolve_bulk(&requests);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| matches!(r, Ok(None))));
        assert_eq!(calls(&resolver), (1, 0, 0));
    }
}

//! Contracts of the three lookups a street resolution depends on.
//!
//! A resolution asks a [`CandidateSource`] for street ids near a point, asks a
//! [`DistanceRanker`] to order those ids by exact distance, and fetches the
//! winner from an [`EntityStore`]. Each call reports failures as a
//! [`StoreError`] that keeps "timed out" apart from "unreachable".

use std::fmt;
use std::sync::Arc;

use crate::entity::{Coordinate, Entity, EntityId, EntityKind};

pub use error::StoreError;
pub use frame::FrameEntityStore;

mod frame;

/// A pipeline stage, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Candidates,
    Ranking,
    Fetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Candidates => "candidate retrieval",
            Self::Ranking => "distance ranking",
            Self::Fetch => "entity fetch",
        })
    }
}

/// An approximate text and geo query for candidate entities.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery<'a> {
    pub name: &'a str,
    pub center: Coordinate,
    pub radius_km: f64,
    pub kind: EntityKind,
    pub limit: usize,
    pub fuzzy: bool,
}

/// One row of a distance ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub id: EntityId,
    pub distance: f64,
}

impl RankedCandidate {
    pub fn new(id: impl Into<EntityId>, distance: f64) -> Self {
        Self {
            id: id.into(),
            distance,
        }
    }
}

/// Text and geo index returning candidate ids in relevance order.
pub trait CandidateSource: Send + Sync {
    fn candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<EntityId>, StoreError>;
}

/// Spatial store ordering ids by exact distance to a point, ascending.
///
/// Ids without a stored geometry produce no row. Equal distances keep the
/// store's row order.
pub trait DistanceRanker: Send + Sync {
    fn rank(&self, ids: &[EntityId], point: Coordinate)
    -> Result<Vec<RankedCandidate>, StoreError>;
}

/// Keyed lookup of full entities.
pub trait EntityStore: Send + Sync {
    fn find(&self, id: &EntityId) -> Result<Option<Entity>, StoreError>;
}

impl<T: CandidateSource + ?Sized> CandidateSource for Arc<T> {
    fn candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<EntityId>, StoreError> {
        (**self).candidates(query)
    }
}

impl<T: DistanceRanker + ?Sized> DistanceRanker for Arc<T> {
    fn rank(
        &self,
        ids: &[EntityId],
        point: Coordinate,
    ) -> Result<Vec<RankedCandidate>, StoreError> {
        (**self).rank(ids, point)
    }
}

impl<T: EntityStore + ?Sized> EntityStore for Arc<T> {
    fn find(&self, id: &EntityId) -> Result<Option<Entity>, StoreError> {
        (**self).find(id)
    }
}

mod error {
    use thiserror::Error;

    use super::Stage;

    #[derive(Error, Debug)]
    pub enum StoreError {
        #[error("{stage} timed out")]
        Timeout { stage: Stage },
        #[error("{stage} is unavailable: {reason}")]
        Unavailable { stage: Stage, reason: String },
        #[error("{stage} failed: {source}")]
        Backend {
            stage: Stage,
            #[source]
            source: anyhow::Error,
        },
    }

    impl StoreError {
        pub fn backend(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
            Self::Backend {
                stage,
                source: source.into(),
            }
        }

        #[must_use]
        pub fn stage(&self) -> Stage {
            match self {
                Self::Timeout { stage }
                | Self::Unavailable { stage, .. }
                | Self::Backend { stage, .. } => *stage,
            }
        }

        #[must_use]
        pub fn is_timeout(&self) -> bool {
            matches!(self, Self::Timeout { .. })
        }
    }
}

//! The place entity model.
//!
//! Every place is an [`Entity`]: one shared field set plus optional hierarchy
//! references, tagged with an [`EntityKind`]. Per-kind behavior (hierarchy level,
//! encompassing shapes, suggestion weight, which context fields feed a suggestion)
//! lives in a static capability table looked up by the tag.

use std::fmt;
use std::str::FromStr;

use locus_data_processing::schema::{self, PlaceRefColumns};
use polars::prelude::*;

pub use error::EntityError;
use error::Result;
pub use geometry::{Coordinate, Geometry, GeometryError, bounds_around};

pub mod geometry;

/// Opaque entity identifier, shared by the search index, the spatial store and
/// the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The variant tag of an entity, coarsest level first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Admin0,
    Admin1,
    Admin2,
    LocalAdmin,
    Locality,
    Neighborhood,
    Street,
}

/// A hierarchy level whose boundary polygon can contain other entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeLevel {
    LocalAdmin,
    Locality,
    Neighborhood,
}

impl ShapeLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalAdmin => "local_admin",
            Self::Locality => "locality",
            Self::Neighborhood => "neighborhood",
        }
    }
}

/// An optional entity field that can contribute context to a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextField {
    LocalAdminName,
    LocalityName,
    Admin1Abbr,
    Admin1Name,
}

/// Locality context candidates in precedence order.
pub const LOCALITY_CONTEXT: &[ContextField] =
    &[ContextField::LocalAdminName, ContextField::LocalityName];
/// Region context candidates in precedence order.
pub const REGION_CONTEXT: &[ContextField] = &[ContextField::Admin1Abbr, ContextField::Admin1Name];

/// Static per-kind behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindCapabilities {
    /// Position in the hierarchy, 0 for countries.
    pub level: u8,
    /// Container levels relevant to this kind, as consumed by containment logic.
    pub encompassing_shapes: &'static [ShapeLevel],
    /// Suggestion weight for an entity that sits inside a known locality.
    pub base_weight: u32,
    pub locality_context: &'static [ContextField],
    pub region_context: &'static [ContextField],
}

const fn capabilities(
    level: u8,
    encompassing_shapes: &'static [ShapeLevel],
    base_weight: u32,
) -> KindCapabilities {
    KindCapabilities {
        level,
        encompassing_shapes,
        base_weight,
        locality_context: LOCALITY_CONTEXT,
        region_context: REGION_CONTEXT,
    }
}

static ADMIN0: KindCapabilities = capabilities(0, &[], 12);
static ADMIN1: KindCapabilities = capabilities(1, &[], 11);
static ADMIN2: KindCapabilities = capabilities(2, &[], 10);
static LOCAL_ADMIN: KindCapabilities = capabilities(3, &[], 9);
static LOCALITY: KindCapabilities = capabilities(4, &[ShapeLevel::LocalAdmin], 8);
static NEIGHBORHOOD: KindCapabilities =
    capabilities(5, &[ShapeLevel::LocalAdmin, ShapeLevel::Locality], 7);
static STREET: KindCapabilities = capabilities(
    6,
    &[
        ShapeLevel::LocalAdmin,
        ShapeLevel::Locality,
        ShapeLevel::Neighborhood,
    ],
    5,
);

impl EntityKind {
    pub const ALL: [Self; 7] = [
        Self::Admin0,
        Self::Admin1,
        Self::Admin2,
        Self::LocalAdmin,
        Self::Locality,
        Self::Neighborhood,
        Self::Street,
    ];

    #[must_use]
    pub fn capabilities(self) -> &'static KindCapabilities {
        match self {
            Self::Admin0 => &ADMIN0,
            Self::Admin1 => &ADMIN1,
            Self::Admin2 => &ADMIN2,
            Self::LocalAdmin => &LOCAL_ADMIN,
            Self::Locality => &LOCALITY,
            Self::Neighborhood => &NEIGHBORHOOD,
            Self::Street => &STREET,
        }
    }

    #[must_use]
    pub fn level(self) -> u8 {
        self.capabilities().level
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin0 => "admin0",
            Self::Admin1 => "admin1",
            Self::Admin2 => "admin2",
            Self::LocalAdmin => "local_admin",
            Self::Locality => "locality",
            Self::Neighborhood => "neighborhood",
            Self::Street => "street",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EntityError::UnknownKind(s.to_string()))
    }
}

/// An administrative-level reference: a code, an optional abbreviation and a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminRef {
    pub code: Option<String>,
    pub abbr: Option<String>,
    pub name: Option<String>,
}

impl AdminRef {
    fn from_parts(code: Option<String>, abbr: Option<String>, name: Option<String>) -> Option<Self> {
        (code.is_some() || abbr.is_some() || name.is_some()).then_some(Self { code, abbr, name })
    }
}

/// A reference to an indexable parent entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceRef {
    pub id: Option<EntityId>,
    pub name: String,
    pub alternate_names: Vec<String>,
    pub population: Option<u64>,
}

impl PlaceRef {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Every hierarchy reference an entity may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    pub country: Option<AdminRef>,
    pub admin1: Option<AdminRef>,
    pub admin2: Option<AdminRef>,
    pub admin3_code: Option<String>,
    pub admin4_code: Option<String>,
    pub local_admin: Option<PlaceRef>,
    pub locality: Option<PlaceRef>,
    pub neighborhood: Option<PlaceRef>,
}

/// A geocoded place. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub alternate_names: Vec<String>,
    pub center_point: Coordinate,
    pub center_shape: Option<Geometry>,
    pub boundaries: Option<Geometry>,
    pub population: Option<u64>,
    pub hierarchy: Hierarchy,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl Entity {
    pub fn new(
        id: impl Into<EntityId>,
        kind: EntityKind,
        name: impl Into<String>,
        center_point: Coordinate,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            alternate_names: Vec::new(),
            center_point,
            center_shape: None,
            boundaries: None,
            population: None,
            hierarchy: Hierarchy::default(),
        }
    }

    #[must_use]
    pub fn capabilities(&self) -> &'static KindCapabilities {
        self.kind.capabilities()
    }

    /// Container levels for this entity, in the order containment logic expects.
    #[must_use]
    pub fn encompassing_shapes(&self) -> &'static [ShapeLevel] {
        self.capabilities().encompassing_shapes
    }

    /// The kind's weight, or 0 when the entity has no locality or local admin
    /// parent name.
    #[must_use]
    pub fn suggest_weight(&self) -> u32 {
        let caps = self.capabilities();
        if self.first_present(caps.locality_context).is_some() {
            caps.base_weight
        } else {
            0
        }
    }

    /// Value of a context field; blank strings count as absent.
    #[must_use]
    pub fn context_value(&self, field: ContextField) -> Option<&str> {
        match field {
            ContextField::LocalAdminName => self.local_admin_name(),
            ContextField::LocalityName => self.locality_name(),
            ContextField::Admin1Abbr => self.admin1_abbr(),
            ContextField::Admin1Name => self.admin1_name(),
        }
    }

    /// The first present value among `fields`.
    #[must_use]
    pub fn first_present(&self, fields: &[ContextField]) -> Option<&str> {
        fields.iter().find_map(|&field| self.context_value(field))
    }

    #[must_use]
    pub fn lat(&self) -> f64 {
        self.center_point.lat
    }

    #[must_use]
    pub fn lon(&self) -> f64 {
        self.center_point.lon
    }

    #[must_use]
    pub fn country_code(&self) -> Option<&str> {
        present(self.hierarchy.country.as_ref()?.code.as_deref())
    }

    #[must_use]
    pub fn country_name(&self) -> Option<&str> {
        present(self.hierarchy.country.as_ref()?.name.as_deref())
    }

    #[must_use]
    pub fn admin1_abbr(&self) -> Option<&str> {
        present(self.hierarchy.admin1.as_ref()?.abbr.as_deref())
    }

    #[must_use]
    pub fn admin1_name(&self) -> Option<&str> {
        present(self.hierarchy.admin1.as_ref()?.name.as_deref())
    }

    #[must_use]
    pub fn admin2_name(&self) -> Option<&str> {
        present(self.hierarchy.admin2.as_ref()?.name.as_deref())
    }

    #[must_use]
    pub fn local_admin_name(&self) -> Option<&str> {
        present(self.hierarchy.local_admin.as_ref().map(|p| p.name.as_str()))
    }

    #[must_use]
    pub fn locality_name(&self) -> Option<&str> {
        present(self.hierarchy.locality.as_ref().map(|p| p.name.as_str()))
    }

    #[must_use]
    pub fn neighborhood_name(&self) -> Option<&str> {
        present(self.hierarchy.neighborhood.as_ref().map(|p| p.name.as_str()))
    }

    /// Check the invariants of a persisted entity: a non-blank name, a valid
    /// center point, and hierarchy references that never point below the
    /// entity's own level or back at the entity itself.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EntityError::EmptyName(self.id.clone()));
        }
        if !self.center_point.is_valid() {
            return Err(EntityError::InvalidCenter(self.id.clone()));
        }

        let own_level = self.kind.level();
        let h = &self.hierarchy;
        let admin_refs = [
            ("country", h.country.is_some(), EntityKind::Admin0),
            ("admin1", h.admin1.is_some(), EntityKind::Admin1),
            ("admin2", h.admin2.is_some(), EntityKind::Admin2),
            ("admin3", h.admin3_code.is_some(), EntityKind::LocalAdmin),
            ("admin4", h.admin4_code.is_some(), EntityKind::LocalAdmin),
        ];
        let place_refs = [
            ("local_admin", h.local_admin.as_ref(), EntityKind::LocalAdmin),
            ("locality", h.locality.as_ref(), EntityKind::Locality),
            ("neighborhood", h.neighborhood.as_ref(), EntityKind::Neighborhood),
        ];

        let below = admin_refs
            .iter()
            .filter(|(_, is_set, _)| *is_set)
            .map(|(name, _, kind)| (*name, *kind))
            .chain(
                place_refs
                    .iter()
                    .filter(|(_, place, _)| place.is_some())
                    .map(|(name, _, kind)| (*name, *kind)),
            )
            .find(|(_, kind)| kind.level() > own_level);
        if let Some((reference, _)) = below {
            return Err(EntityError::ReferenceBelowLevel {
                id: self.id.clone(),
                kind: self.kind,
                reference,
            });
        }

        for (reference, place, _) in place_refs {
            if place.and_then(|p| p.id.as_ref()) == Some(&self.id) {
                return Err(EntityError::SelfReference {
                    id: self.id.clone(),
                    reference,
                });
            }
        }
        Ok(())
    }

    /// Decode every row of an entity frame.
    ///
    /// Text fields that are blank are read as absent. Rows with a missing id,
    /// kind or center, or an unknown kind, fail the whole frame; semantic checks
    /// are left to [`Entity::validate`].
    pub fn from_df(df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(df)?;
        (0..df.height()).map(|row| reader.entity(row)).collect()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity {{ id: {}, kind: {}, name: \"{}\" }}",
            self.id, self.kind, self.name
        )
    }
}

struct PlaceRefReader {
    id: StringChunked,
    name: StringChunked,
    alternate_names: ListChunked,
    population: Int64Chunked,
}

impl PlaceRefReader {
    fn new(df: &DataFrame, prefix: &str) -> Result<Self> {
        let cols = PlaceRefColumns::for_prefix(prefix);
        Ok(Self {
            id: df.column(&cols.id)?.str()?.clone(),
            name: df.column(&cols.name)?.str()?.clone(),
            alternate_names: df.column(&cols.alternate_names)?.list()?.clone(),
            population: df
                .column(&cols.population)?
                .cast(&DataType::Int64)?
                .i64()?
                .clone(),
        })
    }

    fn place_ref(&self, row: usize) -> Result<Option<PlaceRef>> {
        let Some(name) = present(self.name.get(row)) else {
            return Ok(None);
        };
        Ok(Some(PlaceRef {
            id: present(self.id.get(row)).map(EntityId::from),
            name: name.to_string(),
            alternate_names: list_strings(&self.alternate_names, row)?,
            population: self.population.get(row).and_then(|p| u64::try_from(p).ok()),
        }))
    }
}

/// Column handles for decoding entity rows.
struct FrameReader {
    id: StringChunked,
    kind: StringChunked,
    name: StringChunked,
    alternate_names: ListChunked,
    center_lon: Float64Chunked,
    center_lat: Float64Chunked,
    population: Int64Chunked,
    text: [StringChunked; 9],
    local_admin: PlaceRefReader,
    locality: PlaceRefReader,
    neighborhood: PlaceRefReader,
}

const TEXT_COLUMNS: [&str; 9] = [
    schema::COUNTRY_CODE,
    schema::COUNTRY_NAME,
    schema::ADMIN1_CODE,
    schema::ADMIN1_ABBR,
    schema::ADMIN1_NAME,
    schema::ADMIN2_CODE,
    schema::ADMIN2_NAME,
    schema::ADMIN3_CODE,
    schema::ADMIN4_CODE,
];

impl FrameReader {
    fn new(df: &DataFrame) -> Result<Self> {
        let str_col = |name: &str| -> Result<StringChunked> { Ok(df.column(name)?.str()?.clone()) };
        let f64_col = |name: &str| -> Result<Float64Chunked> {
            Ok(df.column(name)?.cast(&DataType::Float64)?.f64()?.clone())
        };
        let text = [
            str_col(TEXT_COLUMNS[0])?,
            str_col(TEXT_COLUMNS[1])?,
            str_col(TEXT_COLUMNS[2])?,
            str_col(TEXT_COLUMNS[3])?,
            str_col(TEXT_COLUMNS[4])?,
            str_col(TEXT_COLUMNS[5])?,
            str_col(TEXT_COLUMNS[6])?,
            str_col(TEXT_COLUMNS[7])?,
            str_col(TEXT_COLUMNS[8])?,
        ];
        Ok(Self {
            id: str_col(schema::ID)?,
            kind: str_col(schema::KIND)?,
            name: str_col(schema::NAME)?,
            alternate_names: df.column(schema::ALTERNATE_NAMES)?.list()?.clone(),
            center_lon: f64_col(schema::CENTER_LON)?,
            center_lat: f64_col(schema::CENTER_LAT)?,
            population: df
                .column(schema::POPULATION)?
                .cast(&DataType::Int64)?
                .i64()?
                .clone(),
            text,
            local_admin: PlaceRefReader::new(df, "local_admin")?,
            locality: PlaceRefReader::new(df, "locality")?,
            neighborhood: PlaceRefReader::new(df, "neighborhood")?,
        })
    }

    fn text(&self, column: usize, row: usize) -> Option<String> {
        present(self.text[column].get(row)).map(str::to_string)
    }

    fn entity(&self, row: usize) -> Result<Entity> {
        let missing = |column: &'static str| EntityError::MissingValue { column, row };
        let id = self.id.get(row).ok_or_else(|| missing(schema::ID))?;
        let kind = self.kind.get(row).ok_or_else(|| missing(schema::KIND))?;
        let lon = self.center_lon.get(row).ok_or_else(|| missing(schema::CENTER_LON))?;
        let lat = self.center_lat.get(row).ok_or_else(|| missing(schema::CENTER_LAT))?;

        let hierarchy = Hierarchy {
            country: AdminRef::from_parts(self.text(0, row), None, self.text(1, row)),
            admin1: AdminRef::from_parts(self.text(2, row), self.text(3, row), self.text(4, row)),
            admin2: AdminRef::from_parts(self.text(5, row), None, self.text(6, row)),
            admin3_code: self.text(7, row),
            admin4_code: self.text(8, row),
            local_admin: self.local_admin.place_ref(row)?,
            locality: self.locality.place_ref(row)?,
            neighborhood: self.neighborhood.place_ref(row)?,
        };

        Ok(Entity {
            id: EntityId::from(id),
            kind: kind.parse()?,
            name: self.name.get(row).unwrap_or_default().to_string(),
            alternate_names: list_strings(&self.alternate_names, row)?,
            center_point: Coordinate::new(lon, lat),
            center_shape: None,
            boundaries: None,
            population: self.population.get(row).and_then(|p| u64::try_from(p).ok()),
            hierarchy,
        })
    }
}

fn list_strings(list: &ListChunked, row: usize) -> Result<Vec<String>> {
    let Some(values) = list.get_as_series(row) else {
        return Ok(Vec::new());
    };
    Ok(values
        .str()?
        .into_iter()
        .flatten()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .collect())
}

mod error {
    use thiserror::Error;

    use super::{EntityId, EntityKind};

    #[derive(Error, Debug)]
    pub enum EntityError {
        #[error("Entity {0} has an empty name")]
        EmptyName(EntityId),
        #[error("Entity {0} has an invalid center point")]
        InvalidCenter(EntityId),
        #[error("Entity {id} ({kind}) references {reference}, which is below its own level")]
        ReferenceBelowLevel {
            id: EntityId,
            kind: EntityKind,
            reference: &'static str,
        },
        #[error("Entity {id} references itself as its {reference}")]
        SelfReference {
            id: EntityId,
            reference: &'static str,
        },
        #[error("Unknown entity kind '{0}'")]
        UnknownKind(String),
        #[error("Row {row} has no value in required column '{column}'")]
        MissingValue { column: &'static str, row: usize },
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
    }
    pub type Result<T> = std::result::Result<T, EntityError>;
}

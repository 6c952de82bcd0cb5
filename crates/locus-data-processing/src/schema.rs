//! Column layout of the entity and geometry frames.
//!
//! The entity frame carries one row per place. Hierarchy references are flattened
//! into prefixed columns: admin levels as code/name pairs, and the indexable
//! levels (local admin, locality, neighborhood) as id/name/alternates/population.
//! Alternate names are `List<String>` columns; every other text column is a
//! nullable `String`.
use polars::prelude::*;

use crate::{DataError, Result};

pub const ID: &str = "id";
pub const KIND: &str = "kind";
pub const NAME: &str = "name";
pub const ALTERNATE_NAMES: &str = "alternate_names";
pub const CENTER_LON: &str = "center_lon";
pub const CENTER_LAT: &str = "center_lat";
pub const POPULATION: &str = "population";

pub const COUNTRY_CODE: &str = "country_code";
pub const COUNTRY_NAME: &str = "country_name";
pub const ADMIN1_CODE: &str = "admin1_code";
pub const ADMIN1_ABBR: &str = "admin1_abbr";
pub const ADMIN1_NAME: &str = "admin1_name";
pub const ADMIN2_CODE: &str = "admin2_code";
pub const ADMIN2_NAME: &str = "admin2_name";
pub const ADMIN3_CODE: &str = "admin3_code";
pub const ADMIN4_CODE: &str = "admin4_code";

/// Prefixes of the indexable hierarchy levels, most local last.
pub const PLACE_REF_PREFIXES: [&str; 3] = ["local_admin", "locality", "neighborhood"];

/// Column names of an indexable hierarchy reference (`<prefix>_id`, `<prefix>_name`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceRefColumns {
    pub id: String,
    pub name: String,
    pub alternate_names: String,
    pub population: String,
}

impl PlaceRefColumns {
    #[must_use]
    pub fn for_prefix(prefix: &str) -> Self {
        Self {
            id: format!("{prefix}_id"),
            name: format!("{prefix}_name"),
            alternate_names: format!("{prefix}_alternate_names"),
            population: format!("{prefix}_population"),
        }
    }
}

pub const GEOMETRY_TYPE: &str = "geometry_type";
pub const XS: &str = "xs";
pub const YS: &str = "ys";

/// Every column the entity frame must provide, in canonical order.
#[must_use]
pub fn entity_columns() -> Vec<String> {
    let mut columns: Vec<String> = [
        ID,
        KIND,
        NAME,
        ALTERNATE_NAMES,
        CENTER_LON,
        CENTER_LAT,
        POPULATION,
        COUNTRY_CODE,
        COUNTRY_NAME,
        ADMIN1_CODE,
        ADMIN1_ABBR,
        ADMIN1_NAME,
        ADMIN2_CODE,
        ADMIN2_NAME,
        ADMIN3_CODE,
        ADMIN4_CODE,
    ]
    .into_iter()
    .map(String::from)
    .collect();
    for prefix in PLACE_REF_PREFIXES {
        let cols = PlaceRefColumns::for_prefix(prefix);
        columns.extend([cols.id, cols.name, cols.alternate_names, cols.population]);
    }
    columns
}

#[must_use]
pub fn geometry_columns() -> Vec<&'static str> {
    vec![ID, GEOMETRY_TYPE, XS, YS]
}

/// Check that `df` has every column of the entity frame.
pub fn ensure_entity_frame(df: &DataFrame) -> Result<()> {
    ensure_columns(df, "entity", entity_columns().iter().map(String::as_str))
}

/// Check that `df` has every column of the geometry frame.
pub fn ensure_geometry_frame(df: &DataFrame) -> Result<()> {
    ensure_columns(df, "geometry", geometry_columns())
}

fn ensure_columns<'a>(
    df: &DataFrame,
    frame: &'static str,
    expected: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let present = df.get_column_names();
    for column in expected {
        if !present.iter().any(|c| c.as_str() == column) {
            return Err(DataError::MissingColumn {
                frame,
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

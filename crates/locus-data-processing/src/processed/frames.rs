//! Row-oriented builders for the entity and geometry frames.
use polars::prelude::*;

use crate::Result;
use crate::schema::{self, PlaceRefColumns};

/// An indexable hierarchy reference as stored in the entity frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceRefRow {
    pub id: String,
    pub name: String,
    pub alternate_names: Vec<String>,
    pub population: Option<i64>,
}

impl PlaceRefRow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// One row of the entity frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRow {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub alternate_names: Vec<String>,
    pub center_lon: f64,
    pub center_lat: f64,
    pub population: Option<i64>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub admin1_code: Option<String>,
    pub admin1_abbr: Option<String>,
    pub admin1_name: Option<String>,
    pub admin2_code: Option<String>,
    pub admin2_name: Option<String>,
    pub admin3_code: Option<String>,
    pub admin4_code: Option<String>,
    pub local_admin: Option<PlaceRefRow>,
    pub locality: Option<PlaceRefRow>,
    pub neighborhood: Option<PlaceRefRow>,
}

impl EntityRow {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        (center_lon, center_lat): (f64, f64),
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: name.into(),
            center_lon,
            center_lat,
            ..Default::default()
        }
    }

    fn place_ref(&self, prefix: &str) -> Option<&PlaceRefRow> {
        match prefix {
            "local_admin" => self.local_admin.as_ref(),
            "locality" => self.locality.as_ref(),
            "neighborhood" => self.neighborhood.as_ref(),
            _ => None,
        }
    }
}

/// One row of the geometry frame: a point, line or polygon ring as parallel
/// longitude (`xs`) and latitude (`ys`) lists.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRow {
    pub id: String,
    pub geometry_type: String,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl GeometryRow {
    pub fn line(id: impl Into<String>, coords: &[(f64, f64)]) -> Self {
        Self::from_coords(id, "linestring", coords)
    }

    pub fn polygon(id: impl Into<String>, ring: &[(f64, f64)]) -> Self {
        Self::from_coords(id, "polygon", ring)
    }

    pub fn point(id: impl Into<String>, coord: (f64, f64)) -> Self {
        Self::from_coords(id, "point", &[coord])
    }

    fn from_coords(id: impl Into<String>, geometry_type: &str, coords: &[(f64, f64)]) -> Self {
        let (xs, ys) = coords.iter().copied().unzip();
        Self {
            id: id.into(),
            geometry_type: geometry_type.to_string(),
            xs,
            ys,
        }
    }
}

fn string_list(name: &str, values: impl Iterator<Item = Vec<String>>) -> Column {
    let lists: Vec<Series> = values
        .map(|names| Series::new(PlSmallStr::EMPTY, names))
        .collect();
    if lists.is_empty() {
        return Column::new_empty(
            name.into(),
            &DataType::List(Box::new(DataType::String)),
        );
    }
    Column::new(name.into(), lists)
}

fn float_list(name: &str, values: impl Iterator<Item = Vec<f64>>) -> Column {
    let lists: Vec<Series> = values
        .map(|coords| Series::new(PlSmallStr::EMPTY, coords))
        .collect();
    if lists.is_empty() {
        return Column::new_empty(
            name.into(),
            &DataType::List(Box::new(DataType::Float64)),
        );
    }
    Column::new(name.into(), lists)
}

fn opt_str(name: &str, rows: &[EntityRow], get: impl Fn(&EntityRow) -> Option<&str>) -> Column {
    Column::new(name.into(), rows.iter().map(get).collect::<Vec<_>>())
}

/// Build an entity frame with the canonical column layout.
pub fn entity_frame(rows: &[EntityRow]) -> Result<DataFrame> {
    let mut columns = vec![
        Column::new(
            schema::ID.into(),
            rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            schema::KIND.into(),
            rows.iter().map(|r| r.kind.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            schema::NAME.into(),
            rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        ),
        string_list(
            schema::ALTERNATE_NAMES,
            rows.iter().map(|r| r.alternate_names.clone()),
        ),
        Column::new(
            schema::CENTER_LON.into(),
            rows.iter().map(|r| r.center_lon).collect::<Vec<_>>(),
        ),
        Column::new(
            schema::CENTER_LAT.into(),
            rows.iter().map(|r| r.center_lat).collect::<Vec<_>>(),
        ),
        Column::new(
            schema::POPULATION.into(),
            rows.iter().map(|r| r.population).collect::<Vec<_>>(),
        ),
        opt_str(schema::COUNTRY_CODE, rows, |r| r.country_code.as_deref()),
        opt_str(schema::COUNTRY_NAME, rows, |r| r.country_name.as_deref()),
        opt_str(schema::ADMIN1_CODE, rows, |r| r.admin1_code.as_deref()),
        opt_str(schema::ADMIN1_ABBR, rows, |r| r.admin1_abbr.as_deref()),
        opt_str(schema::ADMIN1_NAME, rows, |r| r.admin1_name.as_deref()),
        opt_str(schema::ADMIN2_CODE, rows, |r| r.admin2_code.as_deref()),
        opt_str(schema::ADMIN2_NAME, rows, |r| r.admin2_name.as_deref()),
        opt_str(schema::ADMIN3_CODE, rows, |r| r.admin3_code.as_deref()),
        opt_str(schema::ADMIN4_CODE, rows, |r| r.admin4_code.as_deref()),
    ];

    for prefix in schema::PLACE_REF_PREFIXES {
        let cols = PlaceRefColumns::for_prefix(prefix);
        columns.push(opt_str(&cols.id, rows, |r| {
            r.place_ref(prefix).map(|p| p.id.as_str())
        }));
        columns.push(opt_str(&cols.name, rows, |r| {
            r.place_ref(prefix).map(|p| p.name.as_str())
        }));
        columns.push(string_list(
            &cols.alternate_names,
            rows.iter().map(|r| {
                r.place_ref(prefix)
                    .map(|p| p.alternate_names.clone())
                    .unwrap_or_default()
            }),
        ));
        columns.push(Column::new(
            cols.population.as_str().into(),
            rows.iter()
                .map(|r| r.place_ref(prefix).and_then(|p| p.population))
                .collect::<Vec<_>>(),
        ));
    }

    Ok(DataFrame::new(columns)?)
}

/// Build a geometry frame with the canonical column layout.
pub fn geometry_frame(rows: &[GeometryRow]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(
            schema::ID.into(),
            rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            schema::GEOMETRY_TYPE.into(),
            rows.iter()
                .map(|r| r.geometry_type.as_str())
                .collect::<Vec<_>>(),
        ),
        float_list(schema::XS, rows.iter().map(|r| r.xs.clone())),
        float_list(schema::YS, rows.iter().map(|r| r.ys.clone())),
    ])?)
}

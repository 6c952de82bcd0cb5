//! Deterministic fixture gazetteer around Springfield, Illinois.
//!
//! Coordinates are (longitude, latitude). Streets are short east-west or
//! north-south lines; their center points sit halfway along the line. A few rows
//! are deliberately irregular: a neighborhood with no locality or local admin, a
//! street with no geometry row, and a street that shares its name with one far
//! outside any 10 km search radius.
use geo::{LineInterpolatePoint, LineString};
use polars::prelude::DataFrame;
use tracing::info;

use crate::Result;
use crate::processed::{EntityRow, GeometryRow, PlaceRefRow, entity_frame, geometry_frame};

pub const SPRINGFIELD: (f64, f64) = (-89.65, 39.80);

fn in_illinois(mut row: EntityRow) -> EntityRow {
    row.country_code = Some("US".into());
    row.country_name = Some("United States".into());
    row.admin1_code = Some("US.IL".into());
    row.admin1_abbr = Some("IL".into());
    row.admin1_name = Some("Illinois".into());
    row
}

fn in_sangamon(row: EntityRow) -> EntityRow {
    let mut row = in_illinois(row);
    row.admin2_code = Some("US.IL.167".into());
    row.admin2_name = Some("Sangamon County".into());
    row
}

fn springfield_ref() -> PlaceRefRow {
    PlaceRefRow {
        id: "locality-springfield".into(),
        name: "Springfield".into(),
        alternate_names: vec!["Springfield IL".into()],
        population: Some(114_394),
    }
}

fn capital_township_ref() -> PlaceRefRow {
    PlaceRefRow {
        population: Some(116_250),
        ..PlaceRefRow::new("local-admin-capital", "Capital Township")
    }
}

/// The point halfway along a line, measured in planar degrees.
fn halfway(coords: &[(f64, f64)]) -> (f64, f64) {
    LineString::from(coords.to_vec())
        .line_interpolate_point(0.5)
        .map_or(coords[0], |p| (p.x(), p.y()))
}

fn street(id: &str, name: &str, coords: &[(f64, f64)]) -> (EntityRow, GeometryRow) {
    let geometry = GeometryRow::line(id, coords);
    let mut row = in_sangamon(EntityRow::new(id, "street", name, halfway(coords)));
    row.locality = Some(springfield_ref());
    (row, geometry)
}

fn fixture() -> (Vec<EntityRow>, Vec<GeometryRow>) {
    let mut entities = vec![
        EntityRow {
            country_code: Some("US".into()),
            country_name: Some("United States".into()),
            population: Some(331_000_000),
            ..EntityRow::new("admin0-us", "admin0", "United States", (-98.35, 39.5))
        },
        {
            let mut row = in_illinois(EntityRow::new(
                "admin1-il",
                "admin1",
                "Illinois",
                (-89.25, 40.0),
            ));
            row.alternate_names = vec!["Land of Lincoln".into()];
            row.population = Some(12_812_508);
            row
        },
        in_sangamon(EntityRow::new(
            "admin2-sangamon",
            "admin2",
            "Sangamon County",
            (-89.66, 39.76),
        )),
        in_sangamon(EntityRow::new(
            "local-admin-capital",
            "local_admin",
            "Capital Township",
            SPRINGFIELD,
        )),
        {
            let mut row = in_sangamon(EntityRow::new(
                "locality-springfield",
                "locality",
                "Springfield",
                SPRINGFIELD,
            ));
            row.alternate_names = vec!["Springfield IL".into()];
            row.population = Some(114_394);
            row.local_admin = Some(capital_township_ref());
            row
        },
        {
            let mut row = in_sangamon(EntityRow::new(
                "neighborhood-enos-park",
                "neighborhood",
                "Enos Park",
                (-89.648, 39.812),
            ));
            row.locality = Some(springfield_ref());
            row
        },
        {
            let mut row = in_sangamon(EntityRow::new(
                "neighborhood-vinegar-hill",
                "neighborhood",
                "Vinegar Hill",
                (-89.655, 39.793),
            ));
            row.local_admin = Some(capital_township_ref());
            row.locality = Some(springfield_ref());
            row
        },
        // Unplaced: no locality or local admin parent.
        in_sangamon(EntityRow::new(
            "neighborhood-lost-prairie",
            "neighborhood",
            "Lost Prairie",
            (-89.9, 39.7),
        )),
    ];
    let mut geometries = vec![GeometryRow::polygon(
        "neighborhood-enos-park",
        &[
            (-89.652, 39.808),
            (-89.644, 39.808),
            (-89.644, 39.816),
            (-89.652, 39.816),
            (-89.652, 39.808),
        ],
    )];

    let streets = [
        street("way-100", "Main St", &[(-89.650, 39.800), (-89.640, 39.800)]),
        street("way-101", "Main Street", &[(-89.600, 39.800), (-89.590, 39.800)]),
        street("way-102", "Monroe St", &[(-89.650, 39.802), (-89.640, 39.802)]),
        street(
            "way-103",
            "Jefferson Ave",
            &[(-89.645, 39.790), (-89.645, 39.795), (-89.645, 39.810)],
        ),
        street("way-104", "Old Main Rd", &[(-89.700, 39.850), (-89.690, 39.850)]),
    ];
    for (row, geometry) in streets {
        entities.push(row);
        geometries.push(geometry);
    }

    // Same name, far outside the search radius.
    let (mut chicago_main, chicago_geometry) = street(
        "way-900",
        "Main St",
        &[(-87.630, 41.880), (-87.620, 41.880)],
    );
    chicago_main.admin2_code = Some("US.IL.031".into());
    chicago_main.admin2_name = Some("Cook County".into());
    chicago_main.locality = Some(PlaceRefRow {
        population: Some(2_746_388),
        ..PlaceRefRow::new("locality-chicago", "Chicago")
    });
    entities.push(chicago_main);
    geometries.push(chicago_geometry);

    // Indexed but never loaded into the geometry frame.
    let (ghost, _) = street("way-500", "Ghost St", &[(-89.651, 39.801), (-89.649, 39.801)]);
    entities.push(ghost);

    (entities, geometries)
}

/// Entity frame of the fixture gazetteer.
pub fn sample_entities() -> Result<DataFrame> {
    let (entities, _) = fixture();
    info!(rows = entities.len(), "Creating sample entity frame");
    entity_frame(&entities)
}

/// Geometry frame of the fixture gazetteer.
pub fn sample_geometries() -> Result<DataFrame> {
    let (_, geometries) = fixture();
    info!(rows = geometries.len(), "Creating sample geometry frame");
    geometry_frame(&geometries)
}

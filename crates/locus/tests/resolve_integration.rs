//! Integration tests for street resolution and suggestions
//!
//! These run against the public API with the bundled Springfield, IL fixture.

use locus::{
    EntityData, EntityKind, FrameEntityStore, Gazetteer, ResolveConfigBuilder, SearchIndex,
    SpatialStore, StreetRequest, StreetResolver, generate_suggestions,
};
use pretty_assertions::assert_eq;

fn setup_test_env() {
    let _ = locus::init_logging(tracing::Level::WARN);
}

fn resolved_id(gazetteer: &Gazetteer, name: &str, lat: f64, lon: f64) -> Option<String> {
    gazetteer
        .resolve_street(Some(name), Some(lat), Some(lon))
        .expect("Resolution should not fail")
        .map(|entity| entity.id.to_string())
}

#[test]
fn test_full_workflow() {
    setup_test_env();

    let gazetteer = Gazetteer::sample().expect("Should create gazetteer");

    // 1. Nearest of several name matches
    assert_eq!(
        resolved_id(&gazetteer, "Main St", 39.8005, -89.645).as_deref(),
        Some("way-100")
    );

    // 2. The same name far away resolves to the local street
    assert_eq!(
        resolved_id(&gazetteer, "Main St", 41.8801, -87.625).as_deref(),
        Some("way-900")
    );

    // 3. The resolved entity feeds the suggestion synthesizer
    let street = gazetteer
        .resolve_street(Some("Jefferson Ave"), Some(39.80), Some(-89.646))
        .unwrap()
        .expect("Should resolve Jefferson Ave");
    assert_eq!(street.kind, EntityKind::Street);
    let suggestion = generate_suggestions(&street);
    assert_eq!(suggestion.input, "Jefferson Ave Springfield IL");
    assert_eq!(suggestion.output, "Jefferson Ave, Springfield, IL");
    assert_eq!(suggestion.weight, 5);
    assert_eq!(suggestion.payload.admin2_name.as_deref(), Some("Sangamon County"));
}

#[test]
fn test_out_of_radius_is_not_found() {
    setup_test_env();

    let gazetteer = Gazetteer::sample().unwrap();
    // Halfway between Springfield and Chicago: nothing within 10 km.
    assert_eq!(resolved_id(&gazetteer, "Main St", 40.84, -88.64), None);
}

#[test]
fn test_typo_tolerant_config() {
    setup_test_env();

    let strict = Gazetteer::sample().unwrap();
    assert_eq!(resolved_id(&strict, "Jeferson", 39.80, -89.646), None);

    let tolerant = Gazetteer::builder()
        .data(EntityData::sample().unwrap())
        .config(ResolveConfigBuilder::typo_tolerant().build())
        .build()
        .unwrap();
    assert_eq!(
        resolved_id(&tolerant, "Jeferson", 39.80, -89.646).as_deref(),
        Some("way-103")
    );
}

#[test]
fn test_bulk_resolution_keeps_order() {
    setup_test_env();

    let gazetteer = Gazetteer::sample().unwrap();
    let requests = vec![
        StreetRequest::new("Monroe St", 39.802, -89.645),
        StreetRequest::new("", 39.8, -89.65),
        StreetRequest {
            name: Some("Main St".into()),
            lat: None,
            lon: None,
        },
        StreetRequest::new("Main St", 41.88, -87.625),
    ];
    let ids: Vec<Option<String>> = gazetteer
        .resolve_streets_bulk(&requests)
        .into_iter()
        .map(|r| r.unwrap().map(|e| e.id.to_string()))
        .collect();
    assert_eq!(
        ids,
        vec![
            Some("way-102".to_string()),
            None,
            None,
            Some("way-900".to_string())
        ]
    );
}

#[test]
fn test_concurrent_resolutions_share_one_gazetteer() {
    setup_test_env();

    let gazetteer = Gazetteer::sample().unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| resolved_id(&gazetteer, "Main St", 39.8005, -89.645)))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("way-100"));
        }
    });
}

#[test]
fn test_persisted_dataset_and_index() {
    setup_test_env();

    let dir = tempfile::TempDir::new().unwrap();
    let data_dir = dir.path().join("processed");
    let index_dir = dir.path().join("index");

    let metadata = EntityData::sample()
        .unwrap()
        .save(&data_dir, "Springfield fixture")
        .unwrap();
    assert_eq!(metadata.entity_rows, 15);
    assert_eq!(metadata.geometry_rows, 7);

    let build = || {
        Gazetteer::builder()
            .data(EntityData::open(&data_dir).unwrap())
            .index_dir(&index_dir)
            .build()
            .unwrap()
    };
    let first = build();
    assert!(index_dir.join("meta.json").exists());
    let second = build();
    assert_eq!(first.info(), second.info());
    assert_eq!(
        resolved_id(&second, "Main St", 39.8005, -89.645).as_deref(),
        Some("way-100")
    );
}

#[test]
fn test_resolver_composed_from_parts() {
    setup_test_env();

    let data = EntityData::sample().unwrap();
    let entities = data.entities_df().unwrap().collect().unwrap();
    let shapes = SpatialStore::from_lazy(data.geometries_df().unwrap()).unwrap();
    let resolver = StreetResolver::with_config(
        SearchIndex::in_memory(&entities).unwrap(),
        shapes.clone(),
        FrameEntityStore::new(&entities, Some(shapes)).unwrap(),
        ResolveConfigBuilder::new().kind(EntityKind::Neighborhood).build(),
    );

    let park = resolver
        .resolve(Some("Enos Park"), Some(39.81), Some(-89.65))
        .unwrap()
        .expect("Should resolve the neighborhood");
    assert_eq!(park.id.as_str(), "neighborhood-enos-park");
    assert!(park.boundaries.is_some());
}

#[test]
fn test_suggestions_export() {
    setup_test_env();

    let gazetteer = Gazetteer::sample().unwrap();
    let mut buffer = Vec::new();
    let written = gazetteer.write_suggestions(&mut buffer).unwrap();
    assert_eq!(written, gazetteer.info().entities);

    let records: Vec<serde_json::Value> = String::from_utf8(buffer)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let main_st = records
        .iter()
        .find(|r| r["payload"]["type"] == "street" && r["output"] == "Main St, Springfield, IL")
        .expect("Should export the Springfield Main St");
    assert_eq!(main_st["input"], "Main St Springfield IL");
    assert_eq!(main_st["weight"], 5);

    let us = records
        .iter()
        .find(|r| r["payload"]["type"] == "admin0")
        .unwrap();
    assert_eq!(us["weight"], 0);
    assert_eq!(us["payload"]["country_code"], "US");
}

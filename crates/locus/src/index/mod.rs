//! Full-text and geo candidate index built on Tantivy.
//!
//! Every entity is indexed with its id, kind, names and center point. A
//! candidate query matches the name text (optionally with typo tolerance),
//! restricts to one kind and to a bounding box around the reference point, then
//! refines the hits to the exact great-circle radius. Hits keep Tantivy's
//! relevance order.

pub use error::IndexError;
use error::Result;
use itertools::izip;
use locus_data_processing::schema as columns;
use polars::prelude::{DataFrame, DataType, IntoLazy, LazyFrame, col};
use std::ops::Bound;
use std::path::Path;
use tantivy::{
    Index, IndexReader, IndexWriter, TantivyDocument, Term,
    collector::TopDocs,
    query::{
        BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, QueryParser, RangeQuery,
        TermQuery,
    },
    schema::{
        FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, SchemaBuilder,
        TextFieldIndexing, TextOptions, Value,
    },
};
use tracing::{debug, info, instrument, trace, warn};

use crate::entity::{Coordinate, EntityId, bounds_around};
use crate::store::{CandidateQuery, CandidateSource, Stage, StoreError};

pub const INDEX_NAME: &str = "entity_search";

/// Hits fetched per requested candidate in each page of the radius refinement.
const OVERSAMPLE: usize = 2;
const NAME_BOOST: f32 = 2.0;
const ALTERNATE_NAMES_BOOST: f32 = 1.0;
const FUZZY_BOOST: f32 = 1.5;
const WRITER_THREADS: usize = 1;
const WRITER_MEMORY_BYTES: usize = 50_000_000;

#[derive(Debug, Clone, Copy)]
struct IndexFields {
    id: Field,
    kind: Field,
    name: Field,
    alternate_names: Field,
    lat: Field,
    lon: Field,
}

impl IndexFields {
    fn from_schema(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: schema.get_field("id")?,
            kind: schema.get_field("kind")?,
            name: schema.get_field("name")?,
            alternate_names: schema.get_field("alternate_names")?,
            lat: schema.get_field("lat")?,
            lon: schema.get_field("lon")?,
        })
    }
}

fn build_schema() -> Schema {
    let mut schema_builder = SchemaBuilder::new();

    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer("default")
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_indexing);

    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field("kind", STRING);
    schema_builder.add_text_field("name", text_options.clone());
    schema_builder.add_text_field("alternate_names", text_options);
    schema_builder.add_f64_field("lat", INDEXED | STORED | FAST);
    schema_builder.add_f64_field("lon", INDEXED | STORED | FAST);
    schema_builder.build()
}

fn f64_range(field: Field, min: f64, max: f64) -> RangeQuery {
    RangeQuery::new(
        Bound::Included(Term::from_field_f64(field, min)),
        Bound::Included(Term::from_field_f64(field, max)),
    )
}

/// Candidate index over an entity frame.
#[derive(Clone)]
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: IndexFields,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("num_docs", &self.num_docs())
            .finish()
    }
}

impl SearchIndex {
    /// Build a throwaway index in memory.
    #[instrument(name = "Create in-memory Index", skip_all)]
    pub fn in_memory(entities: &DataFrame) -> Result<Self> {
        let index = Index::create_in_ram(build_schema());
        Self::populate(&index, entities)?;
        Self::from_index(index)
    }

    /// Create or load the index under `<DATA_DIR>/tantivy_indexes/entity_search`.
    pub fn new(entities: LazyFrame, overwrite: bool) -> Result<Self> {
        let index_path = locus_data_processing::get_data_dir()
            .join("tantivy_indexes")
            .join(INDEX_NAME);
        let entities = entities.collect()?;
        Self::open_or_create(index_path, &entities, overwrite)
    }

    /// Create or load an on-disk index.
    ///
    /// An existing index is reused when its document count matches the number of
    /// entity rows; otherwise it is rebuilt.
    #[instrument(name = "Create Index", skip_all, fields(path = ?index_path.as_ref(), overwrite))]
    pub fn open_or_create(
        index_path: impl AsRef<Path>,
        entities: &DataFrame,
        overwrite: bool,
    ) -> Result<Self> {
        let index_path = index_path.as_ref();

        if overwrite && index_path.exists() {
            info!("Overwriting existing index directory.");
            std::fs::remove_dir_all(index_path)?;
        }
        std::fs::create_dir_all(index_path)?;

        if index_path.join("meta.json").exists() {
            match Index::open_in_dir(index_path) {
                Ok(existing_index) => {
                    let expected_doc_count = entities.height();
                    let actual_doc_count =
                        existing_index.reader()?.searcher().num_docs() as usize;
                    if actual_doc_count == expected_doc_count {
                        info!(actual_doc_count, "Index is up-to-date. Loaded existing index.");
                        return Self::from_index(existing_index);
                    }
                    info!(
                        actual_doc_count,
                        expected_doc_count, "Index out of date (doc count mismatch). Re-indexing."
                    );
                    Self::safely_recreate_dir(index_path)?;
                }
                Err(e) => {
                    warn!(error = ?e, "Failed to open existing index, will re-index.");
                    Self::safely_recreate_dir(index_path)?;
                }
            }
        } else {
            info!("No existing index found (meta.json missing). Will create new index.");
        }

        let index = Index::create_in_dir(index_path, build_schema())?;
        Self::populate(&index, entities)?;
        Self::from_index(index)
    }

    fn safely_recreate_dir(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    fn from_index(index: Index) -> Result<Self> {
        let fields = IndexFields::from_schema(&index.schema())?;
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    fn populate(index: &Index, entities: &DataFrame) -> Result<()> {
        if entities.height() == 0 {
            warn!(index = INDEX_NAME, "No data to index. Index will be empty.");
            return Ok(());
        }
        let fields = IndexFields::from_schema(&index.schema())?;
        let df = entities
            .clone()
            .lazy()
            .select([
                col(columns::ID),
                col(columns::KIND),
                col(columns::NAME),
                col(columns::ALTERNATE_NAMES),
                col(columns::CENTER_LAT).cast(DataType::Float64),
                col(columns::CENTER_LON).cast(DataType::Float64),
            ])
            .collect()?;

        info!(
            index = INDEX_NAME,
            num_rows = df.height(),
            "Populating index"
        );
        let mut writer: IndexWriter =
            index.writer_with_num_threads(WRITER_THREADS, WRITER_MEMORY_BYTES)?;

        let mut skipped = 0usize;
        for (id, kind, name, alternate_names, lat, lon) in izip!(
            df.column(columns::ID)?.str()?,
            df.column(columns::KIND)?.str()?,
            df.column(columns::NAME)?.str()?,
            df.column(columns::ALTERNATE_NAMES)?.list()?,
            df.column(columns::CENTER_LAT)?.f64()?,
            df.column(columns::CENTER_LON)?.f64()?
        ) {
            let (Some(id), Some(kind), Some(name), Some(lat), Some(lon)) = (id, kind, name, lat, lon)
            else {
                skipped += 1;
                continue;
            };
            let mut doc = TantivyDocument::default();
            doc.add_text(fields.id, id);
            doc.add_text(fields.kind, kind);
            doc.add_text(fields.name, name);
            if let Some(alternates) = alternate_names {
                for alt in alternates.str()?.iter().flatten() {
                    doc.add_text(fields.alternate_names, alt);
                }
            }
            doc.add_f64(fields.lat, lat);
            doc.add_f64(fields.lon, lon);
            writer.add_document(doc)?;
        }
        writer.commit()?;

        if skipped > 0 {
            warn!(skipped, "Rows without id, kind, name or center were not indexed");
        }
        info!(index = INDEX_NAME, "Index creation complete");
        Ok(())
    }

    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    #[instrument(name = "Build Candidate Query", skip_all, level = "trace")]
    fn build_query(&self, query: &CandidateQuery<'_>) -> Result<Box<dyn Query>> {
        let text = query.name.trim();
        if text.is_empty() {
            return Err(anyhow::anyhow!("Query string is empty.").into());
        }
        if query.limit == 0 {
            return Err(anyhow::anyhow!("Search limit must be greater than zero.").into());
        }

        let mut parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.name, self.fields.alternate_names],
        );
        parser.set_field_boost(self.fields.name, NAME_BOOST);
        parser.set_field_boost(self.fields.alternate_names, ALTERNATE_NAMES_BOOST);
        let (parsed, errors) = parser.parse_query_lenient(text);
        if !errors.is_empty() {
            warn!(?errors, "Query parsing errors occurred");
        }

        let mut text_clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Should, parsed)];
        if query.fuzzy {
            for token in text.split_whitespace().filter(|t| t.chars().count() > 2) {
                let term = Term::from_field_text(self.fields.name, &token.to_lowercase());
                text_clauses.push((
                    Occur::Should,
                    Box::new(BoostQuery::new(
                        Box::new(FuzzyTermQuery::new(term, 1, true)),
                        FUZZY_BOOST,
                    )),
                ));
            }
        }

        let kind_filter = TermQuery::new(
            Term::from_field_text(self.fields.kind, query.kind.as_str()),
            IndexRecordOption::Basic,
        );
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![
            (Occur::Must, Box::new(BooleanQuery::new(text_clauses))),
            (Occur::Must, Box::new(kind_filter)),
        ];

        // Near the poles or the antimeridian the box degenerates; the haversine
        // refinement alone enforces the radius there.
        if let Some(bounds) = bounds_around(query.center, query.radius_km) {
            let (min, max) = (bounds.min(), bounds.max());
            clauses.push((Occur::Must, Box::new(f64_range(self.fields.lat, min.y, max.y))));
            clauses.push((Occur::Must, Box::new(f64_range(self.fields.lon, min.x, max.x))));
        }

        let final_query = BooleanQuery::new(clauses);
        trace!(?final_query, "Final query constructed");
        Ok(Box::new(final_query))
    }

    /// Candidate ids within the radius with their relevance scores, best first.
    ///
    /// Hits are read in relevance order a page at a time and dropped when they
    /// fall outside the great-circle radius, until `limit` hits are kept or the
    /// matches run out. Out-of-radius matches in the corners of the bounding box
    /// never crowd out in-radius ones.
    #[instrument(name = "Search Candidate Index", skip_all, level = "debug", fields(query = query.name, limit = query.limit))]
    pub fn search(&self, query: &CandidateQuery<'_>) -> Result<Vec<(EntityId, f32)>> {
        let tantivy_query = self.build_query(query)?;
        let searcher = self.reader.searcher();
        let page = query.limit.saturating_mul(OVERSAMPLE);

        let t_search = std::time::Instant::now();
        let mut hits = Vec::with_capacity(query.limit);
        let mut offset = 0;
        let mut outside_radius = 0usize;
        'pages: loop {
            let top_docs = searcher.search(
                &*tantivy_query,
                &TopDocs::with_limit(page).and_offset(offset),
            )?;
            let fetched = top_docs.len();
            for (score, doc_address) in top_docs {
                let doc = searcher.doc::<TantivyDocument>(doc_address)?;
                let id = doc
                    .get_first(self.fields.id)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow::anyhow!("Failed to get id from document: {:?}", doc))?;
                let lat = doc.get_first(self.fields.lat).and_then(|v| v.as_f64());
                let lon = doc.get_first(self.fields.lon).and_then(|v| v.as_f64());
                let (Some(lat), Some(lon)) = (lat, lon) else {
                    warn!(id, "Indexed document has no stored center");
                    continue;
                };
                let distance_km = query.center.haversine_km(&Coordinate::new(lon, lat));
                if distance_km.is_nan() || distance_km > query.radius_km {
                    outside_radius += 1;
                    continue;
                }
                hits.push((EntityId::from(id), score));
                if hits.len() == query.limit {
                    break 'pages;
                }
            }
            if fetched < page {
                break;
            }
            offset += page;
        }
        debug!(
            num_candidates = hits.len(),
            outside_radius,
            search_execution_seconds = t_search.elapsed().as_secs_f32(),
            "Candidates within radius"
        );
        Ok(hits)
    }
}

impl CandidateSource for SearchIndex {
    fn candidates(
        &self,
        query: &CandidateQuery<'_>,
    ) -> std::result::Result<Vec<EntityId>, StoreError> {
        self.search(query)
            .map(|hits| hits.into_iter().map(|(id, _)| id).collect())
            .map_err(|e| StoreError::backend(Stage::Candidates, e))
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use locus_data_processing::sample_entities;
    use locus_data_processing::test_data::SPRINGFIELD;

    fn index() -> SearchIndex {
        SearchIndex::in_memory(&sample_entities().unwrap()).unwrap()
    }

    fn streets<'a>(name: &'a str, (lon, lat): (f64, f64)) -> CandidateQuery<'a> {
        CandidateQuery {
            name,
            center: Coordinate::new(lon, lat),
            radius_km: 10.0,
            kind: EntityKind::Street,
            limit: 50,
            fuzzy: false,
        }
    }

    fn ids(hits: &[(EntityId, f32)]) -> Vec<&str> {
        let mut ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_indexes_every_fixture_row() {
        assert_eq!(index().num_docs(), 15);
    }

    #[test]
    fn test_text_match_is_limited_to_radius_and_kind() {
        let hits = index().search(&streets("Main St", SPRINGFIELD)).unwrap();
        // way-900 is the Chicago "Main St", well beyond 10 km.
        assert_eq!(ids(&hits), vec!["way-100", "way-101", "way-102", "way-104", "way-500"]);

        let hits = index()
            .search(&streets("Main St", (-87.625, 41.88)))
            .unwrap();
        assert_eq!(ids(&hits), vec!["way-900"]);
    }

    #[test]
    fn test_kind_filter_excludes_other_kinds() {
        let mut query = streets("Springfield", SPRINGFIELD);
        assert!(index().search(&query).unwrap().is_empty());

        query.kind = EntityKind::Locality;
        let hits = index().search(&query).unwrap();
        assert_eq!(ids(&hits), vec!["locality-springfield"]);
    }

    #[test]
    fn test_fuzzy_matching_tolerates_typos() {
        let mut query = streets("Jeferson", SPRINGFIELD);
        assert!(index().search(&query).unwrap().is_empty());

        query.fuzzy = true;
        let hits = index().search(&query).unwrap();
        assert_eq!(ids(&hits), vec!["way-103"]);
    }

    #[test]
    fn test_limit_truncates_hits() {
        let mut query = streets("Main St", SPRINGFIELD);
        query.limit = 2;
        assert_eq!(index().search(&query).unwrap().len(), 2);

        query.limit = 0;
        assert!(index().search(&query).is_err());
    }

    #[test]
    fn test_corner_matches_do_not_crowd_out_streets_in_radius() {
        use locus_data_processing::processed::{EntityRow, entity_frame};

        let (lon, lat) = SPRINGFIELD;
        // Inside the bounding box but about 12 km away, and a better text match
        // than the one street that is actually in range.
        let mut rows: Vec<EntityRow> = (0..101)
            .map(|i| {
                EntityRow::new(
                    format!("way-corner-{i}"),
                    "street",
                    "Main St",
                    (lon + 0.1, lat + 0.08),
                )
            })
            .collect();
        rows.push(EntityRow::new(
            "way-near",
            "street",
            "Main St Old Route Extension",
            (lon, lat),
        ));
        let index = SearchIndex::in_memory(&entity_frame(&rows).unwrap()).unwrap();

        let hits = index.search(&streets("Main St", SPRINGFIELD)).unwrap();
        assert_eq!(ids(&hits), vec!["way-near"]);
    }

    #[test]
    fn test_on_disk_index_is_reused_when_up_to_date() {
        let dir = tempfile::TempDir::new().unwrap();
        let entities = sample_entities().unwrap();

        let first = SearchIndex::open_or_create(dir.path(), &entities, false).unwrap();
        assert!(dir.path().join("meta.json").exists());
        let second = SearchIndex::open_or_create(dir.path(), &entities, false).unwrap();
        assert_eq!(first.num_docs(), second.num_docs());

        let hits = second.search(&streets("Monroe", SPRINGFIELD)).unwrap();
        assert_eq!(ids(&hits), vec!["way-102"]);
    }
}

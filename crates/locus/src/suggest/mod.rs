//! Autocomplete suggestion records.
//!
//! One synthesizer serves every entity kind: the entity's name, followed by the
//! first present field of each context list in the kind's capabilities. Context
//! is appended space separated to `input` and comma separated to `output`.

use std::io::Write;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::entity::{ContextField, Entity, EntityKind};

/// Suggestion record handed to an external autocomplete index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub input: String,
    pub output: String,
    pub weight: u32,
    pub payload: SuggestionPayload,
}

/// Snapshot of the entity's coordinate, kind and hierarchy names. Copied
/// verbatim whether or not a field contributed to the suggestion text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionPayload {
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub admin1_abbr: Option<String>,
    pub admin1_name: Option<String>,
    pub admin2_name: Option<String>,
    pub locality_name: Option<String>,
    pub local_admin_name: Option<String>,
}

impl SuggestionPayload {
    fn from_entity(entity: &Entity) -> Self {
        let owned = |value: Option<&str>| value.map(str::to_string);
        Self {
            lat: entity.lat(),
            lon: entity.lon(),
            kind: entity.kind,
            country_code: owned(entity.country_code()),
            country_name: owned(entity.country_name()),
            admin1_abbr: owned(entity.admin1_abbr()),
            admin1_name: owned(entity.admin1_name()),
            admin2_name: owned(entity.admin2_name()),
            locality_name: owned(entity.locality_name()),
            local_admin_name: owned(entity.local_admin_name()),
        }
    }
}

/// Build the suggestion record for `entity`.
///
/// An entity with an empty name yields empty `input`/`output` plus whatever
/// context is present; such records are left for the caller to filter.
#[must_use]
pub fn generate_suggestions(entity: &Entity) -> Suggestion {
    let caps = entity.capabilities();
    let mut input = entity.name.clone();
    let mut output = entity.name.clone();

    let context_lists: [&[ContextField]; 2] = [caps.locality_context, caps.region_context];
    for value in context_lists
        .into_iter()
        .filter_map(|fields| entity.first_present(fields))
    {
        input.push(' ');
        input.push_str(value);
        output.push_str(", ");
        output.push_str(value);
    }

    Suggestion {
        input,
        output,
        weight: entity.suggest_weight(),
        payload: SuggestionPayload::from_entity(entity),
    }
}

/// Write one JSON record per line. Returns the number of records written.
#[instrument(name = "Write suggestions", skip_all)]
pub fn write_suggestions_jsonl<'a, W: Write>(
    writer: &mut W,
    suggestions: impl IntoIterator<Item = &'a Suggestion>,
) -> serde_json::Result<usize> {
    let mut written = 0;
    for suggestion in suggestions {
        serde_json::to_writer(&mut *writer, suggestion)?;
        writer.write_all(b"\n").map_err(serde_json::Error::io)?;
        written += 1;
    }
    debug!(written, "Suggestions written");
    Ok(written)
}

//! Sink-side record shapes
//!
//! One struct per dataset, fields in payload order so the CSV headers
//! match what the API hands back. List and object fields are kept as
//! compact JSON strings; free text is scrubbed of the unicode line
//! separators that break downstream CSV readers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Strip U+2028/U+2029, which pandas-era consumers of these sinks
/// choke on inside quoted fields.
pub fn clean_text(text: &str) -> String {
    text.replace('\u{2028}', " ").replace('\u{2029}', " ")
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(clean_text)
}

fn json_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .map(encode_json)
        .unwrap_or_else(|| "null".to_string())
}

fn encode_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// One discovery result, one row of `movies.csv`.
#[derive(Debug, Serialize)]
pub struct MovieRow {
    pub adult: bool,
    pub backdrop_path: Option<String>,
    pub genre_ids: String,
    pub id: u64,
    pub original_language: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub popularity: f64,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub title: Option<String>,
    pub video: bool,
    pub vote_average: f64,
    pub vote_count: u64,
}

impl MovieRow {
    /// Extract a row from one element of a discover `results` array.
    /// Rows without a numeric id are unusable and yield `None`.
    pub fn from_discover(value: &Value) -> Option<Self> {
        let id = value.get("id").and_then(Value::as_u64)?;
        Some(Self {
            adult: value.get("adult").and_then(Value::as_bool).unwrap_or(false),
            backdrop_path: string_field(value, "backdrop_path"),
            genre_ids: json_field(value, "genre_ids"),
            id,
            original_language: string_field(value, "original_language"),
            original_title: string_field(value, "original_title"),
            overview: string_field(value, "overview"),
            popularity: value
                .get("popularity")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            poster_path: string_field(value, "poster_path"),
            release_date: string_field(value, "release_date"),
            title: string_field(value, "title"),
            video: value.get("video").and_then(Value::as_bool).unwrap_or(false),
            vote_average: value
                .get("vote_average")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            vote_count: value.get("vote_count").and_then(Value::as_u64).unwrap_or(0),
        })
    }
}

/// One details payload, one row of `movie_details.csv`. The payload
/// stays whole as a JSON string; downstream models unpack it.
#[derive(Debug, Serialize)]
pub struct DetailsRow {
    pub movie_id: u64,
    pub payload_json: String,
    pub ingested_at: String,
}

impl DetailsRow {
    pub fn new(movie_id: u64, payload: &Value, ingested_at: DateTime<Utc>) -> Self {
        Self {
            movie_id,
            payload_json: encode_json(payload),
            ingested_at: ingested_at.to_rfc3339(),
        }
    }
}

/// The credits aspect of a details payload, one row of `credits.csv`.
#[derive(Debug, Serialize)]
pub struct CreditsRow {
    pub movie_id: u64,
    pub cast: String,
    pub crew: String,
    pub ingested_at: String,
}

impl CreditsRow {
    /// Pull the `credits` aspect out of a details payload fetched with
    /// `append_to_response=credits`. `None` when the aspect is absent.
    pub fn from_details(movie_id: u64, payload: &Value, ingested_at: DateTime<Utc>) -> Option<Self> {
        let credits = payload.get("credits")?;
        Some(Self {
            movie_id,
            cast: json_field(credits, "cast"),
            crew: json_field(credits, "crew"),
            ingested_at: ingested_at.to_rfc3339(),
        })
    }
}

/// Mine person ids from a `cast` JSON column, keeping only top-billed
/// members (billing `order` at or below the cutoff). Row order is
/// preserved; duplicates are left for the planner to cut.
pub fn person_ids_from_cast(cast_json: &str, max_order: u64) -> Vec<u64> {
    let Ok(cast) = serde_json::from_str::<Value>(cast_json) else {
        return Vec::new();
    };
    let Some(members) = cast.as_array() else {
        return Vec::new();
    };
    members
        .iter()
        .filter(|m| {
            m.get("order")
                .and_then(Value::as_u64)
                .is_some_and(|order| order <= max_order)
        })
        .filter_map(|m| m.get("id").and_then(Value::as_u64))
        .collect()
}

/// One person payload flattened, one row of `people.csv`.
#[derive(Debug, Serialize)]
pub struct PersonRow {
    pub adult: bool,
    pub also_known_as: String,
    pub biography: Option<String>,
    pub birthday: Option<String>,
    pub deathday: Option<String>,
    pub gender: u64,
    pub homepage: Option<String>,
    pub id: u64,
    pub imdb_id: Option<String>,
    pub known_for_department: Option<String>,
    pub name: Option<String>,
    pub place_of_birth: Option<String>,
    pub popularity: f64,
    pub profile_path: Option<String>,
}

impl PersonRow {
    pub fn from_payload(value: &Value) -> Option<Self> {
        let id = value.get("id").and_then(Value::as_u64)?;
        Some(Self {
            adult: value.get("adult").and_then(Value::as_bool).unwrap_or(false),
            also_known_as: json_field(value, "also_known_as"),
            biography: string_field(value, "biography"),
            birthday: string_field(value, "birthday"),
            deathday: string_field(value, "deathday"),
            gender: value.get("gender").and_then(Value::as_u64).unwrap_or(0),
            homepage: string_field(value, "homepage"),
            id,
            imdb_id: string_field(value, "imdb_id"),
            known_for_department: string_field(value, "known_for_department"),
            name: string_field(value, "name"),
            place_of_birth: string_field(value, "place_of_birth"),
            popularity: value
                .get("popularity")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            profile_path: string_field(value, "profile_path"),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GenreRow {
    pub id: u64,
    pub name: String,
}

impl GenreRow {
    pub fn from_payload(value: &Value) -> Option<Self> {
        Some(Self {
            id: value.get("id").and_then(Value::as_u64)?,
            name: string_field(value, "name")?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CountryRow {
    pub iso_3166_1: String,
    pub english_name: String,
    pub native_name: Option<String>,
}

impl CountryRow {
    pub fn from_payload(value: &Value) -> Option<Self> {
        Some(Self {
            iso_3166_1: string_field(value, "iso_3166_1")?,
            english_name: string_field(value, "english_name")?,
            native_name: string_field(value, "native_name"),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LanguageRow {
    pub iso_639_1: String,
    pub english_name: Option<String>,
    pub name: Option<String>,
}

impl LanguageRow {
    pub fn from_payload(value: &Value) -> Option<Self> {
        Some(Self {
            iso_639_1: string_field(value, "iso_639_1")?,
            english_name: string_field(value, "english_name"),
            name: string_field(value, "name"),
        })
    }
}

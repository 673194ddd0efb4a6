use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde::Deserialize;

use crate::index::Registry;
use crate::models::DiscoverEntry;

/// Convenience discovery for the common case: all healthy/degraded
/// instances of `name`, optionally narrowed by a comma-separated tag list.
#[get("/services/<name>?<tags>")]
pub fn discover_by_name(
    registry: &State<Arc<Registry>>,
    name: &str,
    tags: Option<&str>,
) -> Json<Vec<DiscoverEntry>> {
    let tag_set: HashSet<String> = tags
        .map(|s| s.split(',').filter(|t| !t.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    Json(registry.discover(name, &tag_set, &HashMap::new()))
}

#[derive(Debug, Deserialize)]
pub struct DiscoverFilter {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Full filter discovery: exact tag-set containment (all requested tags
/// must be present) AND exact metadata match on every requested key.
#[post("/services/discover", data = "<filter>")]
pub fn discover_filtered(
    registry: &State<Arc<Registry>>,
    filter: Json<DiscoverFilter>,
) -> Json<Vec<DiscoverEntry>> {
    let tag_set: HashSet<String> = filter.tags.iter().cloned().collect();
    Json(registry.discover(&filter.name, &tag_set, &filter.metadata))
}

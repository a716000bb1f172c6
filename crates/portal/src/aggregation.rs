//! Aggregation profiles.
//!
//! Every listing request carries the full set of facet aggregations for its
//! index domain, whether or not a facet is also an active filter. Profiles
//! are cheap value types rebuilt for each request.

use serde_json::{Map, Value, json};

use crate::domain::IndexDomain;

/// Status facets on organism-centric collections.
pub const DATA_PORTAL_AGGREGATIONS: &[&str] = &[
    "biosamples",
    "raw_data",
    "mapped_reads",
    "assemblies_status",
    "annotation_complete",
    "annotation_status",
    "symbionts_biosamples_status",
    "symbionts_raw_data_status",
    "symbionts_assemblies_status",
    "metagenomes_biosamples_status",
    "metagenomes_raw_data_status",
    "metagenomes_assemblies_status",
];

/// Facets on literature collections.
pub const ARTICLES_AGGREGATIONS: &[&str] = &["journal_name", "pub_year", "article_type"];

/// Bucket limit for record-detail metadata facets.
const DETAIL_BUCKET_SIZE: u32 = 2000;

/// Nested record arrays on a data-portal organism document.
const DETAIL_RECORD_PATHS: &[(&str, &str)] = &[
    ("metadata_filters", "records"),
    ("symbionts_filters", "symbionts_records"),
    ("metagenomes_filters", "metagenomes_records"),
];

/// One aggregation node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    /// Bucketed counts of distinct values.
    Terms {
        field: String,
        size: Option<u32>,
        aggs: Vec<NamedAggregation>,
    },
    /// Step into a nested document path.
    Nested {
        path: String,
        aggs: Vec<NamedAggregation>,
    },
    /// Step back out to the parent document.
    ReverseNested { aggs: Vec<NamedAggregation> },
    /// Approximate distinct count.
    Cardinality { field: String },
}

/// An aggregation under its response key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedAggregation {
    pub name: String,
    pub aggregation: Aggregation,
}

impl NamedAggregation {
    pub fn new(name: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            name: name.into(),
            aggregation,
        }
    }
}

impl Aggregation {
    pub fn terms(field: impl Into<String>) -> Self {
        Self::Terms {
            field: field.into(),
            size: None,
            aggs: Vec::new(),
        }
    }

    /// Terms aggregation on the `.keyword` sub-field of a text field.
    pub fn keyword_terms(field: &str) -> Self {
        Self::terms(format!("{field}.keyword"))
    }

    pub fn with_size(mut self, bucket_size: u32) -> Self {
        if let Self::Terms { size, .. } = &mut self {
            *size = Some(bucket_size);
        }
        self
    }

    /// Attach a sub-aggregation (ignored for `cardinality`, which has none).
    pub fn with_sub(mut self, sub: NamedAggregation) -> Self {
        match &mut self {
            Self::Terms { aggs, .. } | Self::Nested { aggs, .. } | Self::ReverseNested { aggs } => {
                aggs.push(sub);
            }
            Self::Cardinality { .. } => {}
        }
        self
    }

    pub fn nested(path: impl Into<String>) -> Self {
        Self::Nested {
            path: path.into(),
            aggs: Vec::new(),
        }
    }

    pub fn reverse_nested() -> Self {
        Self::ReverseNested { aggs: Vec::new() }
    }

    pub fn cardinality(field: impl Into<String>) -> Self {
        Self::Cardinality {
            field: field.into(),
        }
    }

    /// Render to Elasticsearch aggregation DSL.
    pub fn to_json(&self) -> Value {
        let (mut body, subs) = match self {
            Self::Terms { field, size, aggs } => {
                let mut terms = json!({ "field": field });
                if let Some(size) = size {
                    terms["size"] = json!(size);
                }
                (json!({ "terms": terms }), aggs.as_slice())
            }
            Self::Nested { path, aggs } => {
                (json!({ "nested": { "path": path } }), aggs.as_slice())
            }
            Self::ReverseNested { aggs } => (json!({ "reverse_nested": {} }), aggs.as_slice()),
            Self::Cardinality { field } => (json!({ "cardinality": { "field": field } }), &[][..]),
        };
        if !subs.is_empty() {
            body["aggs"] = render_named(subs);
        }
        body
    }
}

/// The full set of aggregations attached to one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationProfile {
    entries: Vec<NamedAggregation>,
}

impl AggregationProfile {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Facets for a listing request against `domain`.
    ///
    /// `current_class` selects the taxonomy rank whose scientific names are
    /// bucketed; it is used verbatim.
    pub fn for_domain(domain: IndexDomain, current_class: &str) -> Self {
        let flat_fields = match domain {
            IndexDomain::Articles => ARTICLES_AGGREGATIONS,
            IndexDomain::DataPortal | IndexDomain::TrackingStatus | IndexDomain::Other => {
                DATA_PORTAL_AGGREGATIONS
            }
        };

        let mut profile = Self::empty();
        for field in flat_fields {
            profile.push(*field, Aggregation::keyword_terms(field));
        }

        if domain == IndexDomain::DataPortal {
            profile.push("experiment", experiment_protocols());
        }
        if domain.tracks_status() {
            profile.push("genome_notes", genome_note_count());
        }

        profile.push(
            "taxonomies",
            Aggregation::nested(format!("taxonomies.{current_class}")).with_sub(
                NamedAggregation::new(
                    current_class,
                    Aggregation::terms(format!("taxonomies.{current_class}.scientificName")),
                ),
            ),
        );
        profile
    }

    /// Facets for a single organism's detail view.
    pub fn record_detail() -> Self {
        let mut profile = Self::empty();
        for (name, path) in DETAIL_RECORD_PATHS {
            let facet = |suffix: &str| {
                Aggregation::keyword_terms(&format!("{path}.{suffix}")).with_size(DETAIL_BUCKET_SIZE)
            };
            profile.push(
                *name,
                Aggregation::nested(*path)
                    .with_sub(NamedAggregation::new("sex_filter", facet("sex")))
                    .with_sub(NamedAggregation::new(
                        "tracking_status_filter",
                        facet("trackingSystem"),
                    ))
                    .with_sub(NamedAggregation::new(
                        "organism_part_filter",
                        facet("organismPart"),
                    )),
            );
        }
        profile
    }

    /// Add (or replace) an aggregation under `name`.
    pub fn push(&mut self, name: impl Into<String>, aggregation: Aggregation) {
        let name = name.into();
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.aggregation = aggregation,
            None => self.entries.push(NamedAggregation { name, aggregation }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Aggregation> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.aggregation)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the `aggs` section of a request body.
    pub fn to_json(&self) -> Value {
        render_named(&self.entries)
    }
}

/// Library protocol buckets, each counting distinct parent organisms.
fn experiment_protocols() -> Aggregation {
    Aggregation::nested("experiment").with_sub(NamedAggregation::new(
        "library_construction_protocol",
        Aggregation::keyword_terms("experiment.library_construction_protocol").with_sub(
            NamedAggregation::new(
                "distinct_docs",
                Aggregation::reverse_nested().with_sub(NamedAggregation::new(
                    "parent_doc_count",
                    Aggregation::cardinality("organism.keyword"),
                )),
            ),
        ),
    ))
}

/// Number of organisms with at least one genome note.
fn genome_note_count() -> Aggregation {
    Aggregation::nested("genome_notes").with_sub(NamedAggregation::new(
        "genome_count",
        Aggregation::reverse_nested().with_sub(NamedAggregation::new(
            "distinct_docs",
            Aggregation::cardinality("organism.keyword"),
        )),
    ))
}

fn render_named(entries: &[NamedAggregation]) -> Value {
    let mut map = Map::new();
    for entry in entries {
        map.insert(entry.name.clone(), entry.aggregation.to_json());
    }
    Value::Object(map)
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn data_portal_profile_has_flat_and_nested_facets() {
        let profile = AggregationProfile::for_domain(IndexDomain::DataPortal, "kingdom");
        let names: Vec<&str> = profile.names().collect();

        assert_eq!(&names[..DATA_PORTAL_AGGREGATIONS.len()], DATA_PORTAL_AGGREGATIONS);
        assert!(names.contains(&"experiment"));
        assert!(names.contains(&"genome_notes"));
        assert_eq!(names.last(), Some(&"taxonomies"));
    }

    #[test]
    fn flat_facets_use_keyword_subfield() {
        let profile = AggregationProfile::for_domain(IndexDomain::Other, "kingdom");
        assert_eq!(
            profile.get("biosamples").unwrap().to_json(),
            json!({ "terms": { "field": "biosamples.keyword" } })
        );
        assert!(profile.get("experiment").is_none());
        assert!(profile.get("genome_notes").is_none());
    }

    #[test]
    fn articles_profile_uses_article_facets() {
        let profile = AggregationProfile::for_domain(IndexDomain::Articles, "kingdom");
        assert!(profile.get("journal_name").is_some());
        assert!(profile.get("biosamples").is_none());
        assert!(profile.get("taxonomies").is_some());
    }

    #[test]
    fn tracking_status_counts_genome_notes_without_experiments() {
        let profile = AggregationProfile::for_domain(IndexDomain::TrackingStatus, "kingdom");
        assert!(profile.get("genome_notes").is_some());
        assert!(profile.get("experiment").is_none());
    }

    #[test]
    fn experiment_facet_reanchors_on_parent() {
        let json = experiment_protocols().to_json();
        let protocol = &json["aggs"]["library_construction_protocol"];
        assert_eq!(
            protocol["terms"]["field"],
            "experiment.library_construction_protocol.keyword"
        );
        assert_eq!(protocol["aggs"]["distinct_docs"]["reverse_nested"], json!({}));
        assert_eq!(
            protocol["aggs"]["distinct_docs"]["aggs"]["parent_doc_count"],
            json!({ "cardinality": { "field": "organism.keyword" } })
        );
    }

    #[test]
    fn taxonomy_facet_follows_current_class() {
        let profile = AggregationProfile::for_domain(IndexDomain::DataPortal, "phylum");
        assert_eq!(
            profile.get("taxonomies").unwrap().to_json(),
            json!({
                "nested": { "path": "taxonomies.phylum" },
                "aggs": { "phylum": { "terms": { "field": "taxonomies.phylum.scientificName" } } }
            })
        );
    }

    #[test]
    fn record_detail_profile() {
        let json = AggregationProfile::record_detail().to_json();
        assert_eq!(json["symbionts_filters"]["nested"]["path"], "symbionts_records");
        assert_eq!(
            json["metadata_filters"]["aggs"]["tracking_status_filter"],
            json!({ "terms": { "field": "records.trackingSystem.keyword", "size": 2000 } })
        );
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn push_replaces_existing_name() {
        let mut profile = AggregationProfile::empty();
        profile.push("a", Aggregation::terms("x"));
        profile.push("a", Aggregation::terms("y"));
        assert_eq!(profile.names().count(), 1);
        assert_eq!(profile.get("a"), Some(&Aggregation::terms("y")));
    }

    #[test]
    fn cardinality_ignores_sub_aggregations() {
        let agg = Aggregation::cardinality("organism.keyword")
            .with_sub(NamedAggregation::new("x", Aggregation::terms("y")));
        assert_eq!(agg.to_json().get("aggs"), None);
    }
}

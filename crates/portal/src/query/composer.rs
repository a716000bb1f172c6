//! Query composer.
//!
//! Turns parsed filter, phylogeny and free-text input into a
//! [`QueryDocument`] plus the domain's [`AggregationProfile`]:
//!
//! - tokens naming the current taxonomic class → nested taxonomy filter
//! - synthetic keys (`experimentType`, `genome_notes`, status labels) →
//!   the clause registered for that key
//! - everything else → plain term filter
//! - free text → wildcard disjunction ANDed under `must`

use crate::aggregation::AggregationProfile;
use crate::domain::IndexDomain;

use super::dsl::{Clause, QueryDocument};
use super::grammar::{
    FilterToken, GrammarError, PhylogenyToken, SortToken, parse_filters, parse_phylogeny,
    parse_sort,
};

/// Default taxonomic rank when the client sends none.
pub const DEFAULT_CURRENT_CLASS: &str = "kingdom";

/// Typed query input, parsed once from the raw request strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInput {
    pub filters: Vec<FilterToken>,
    pub phylogeny: Vec<PhylogenyToken>,
    pub sort: Vec<SortToken>,
    pub search: Option<String>,
    pub current_class: String,
}

impl Default for QueryInput {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            phylogeny: Vec::new(),
            sort: Vec::new(),
            search: None,
            current_class: DEFAULT_CURRENT_CLASS.to_string(),
        }
    }
}

impl QueryInput {
    /// Parse the raw, string-encoded request parameters.
    ///
    /// Absent and empty strings are equivalent.
    pub fn parse(
        filter: Option<&str>,
        phylogeny: Option<&str>,
        sort: Option<&str>,
        search: Option<&str>,
        current_class: &str,
    ) -> Result<Self, GrammarError> {
        Ok(Self {
            filters: parse_filters(filter.unwrap_or_default())?,
            phylogeny: parse_phylogeny(phylogeny.unwrap_or_default())?,
            sort: parse_sort(sort.unwrap_or_default())?,
            search: search.filter(|s| !s.is_empty()).map(str::to_string),
            current_class: current_class.to_string(),
        })
    }
}

/// Filter keys that do not name a document field directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticKey {
    /// Library construction protocol of any nested experiment.
    ExperimentType,
    /// Organism has at least one published genome note.
    GenomeNotes,
    /// Human-readable status label mapped onto its status field.
    Status(&'static str),
}

/// Status labels shown in the tracking UI and the fields behind them.
const STATUS_KEYS: &[(&str, &str)] = &[
    ("Biosamples", "biosamples"),
    ("Raw Data", "raw_data"),
    ("Mapped Reads", "mapped_reads"),
    ("Assemblies", "assemblies_status"),
    ("Annotation Complete", "annotation_complete"),
    ("Annotation", "annotation_status"),
];

impl SyntheticKey {
    /// Look up the synthetic key registered for `name` in `domain`.
    pub fn lookup(domain: IndexDomain, name: &str) -> Option<Self> {
        match name {
            "experimentType" => Some(Self::ExperimentType),
            "genome_notes" => Some(Self::GenomeNotes),
            _ if domain.tracks_status() => STATUS_KEYS
                .iter()
                .find(|(label, _)| *label == name)
                .map(|(_, field)| Self::Status(*field)),
            _ => None,
        }
    }

    /// Build the filter clause for this key.
    pub fn clause(self, value: &str) -> Clause {
        match self {
            Self::ExperimentType => Clause::nested_filter(
                "experiment",
                vec![Clause::term(
                    "experiment.library_construction_protocol.keyword",
                    value,
                )],
            ),
            Self::GenomeNotes => {
                Clause::nested_filter("genome_notes", vec![Clause::exists("genome_notes.url")])
            }
            Self::Status(field) => Clause::term(field, value),
        }
    }
}

/// A composed query ready for the search gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedQuery {
    pub query: QueryDocument,
    pub aggregations: AggregationProfile,
    pub sort: Vec<SortToken>,
}

/// Builds query documents for one index domain.
#[derive(Debug, Clone, Copy)]
pub struct QueryComposer {
    domain: IndexDomain,
}

impl QueryComposer {
    pub fn new(domain: IndexDomain) -> Self {
        Self { domain }
    }

    pub fn for_index(index: &str) -> Self {
        Self::new(IndexDomain::from_index(index))
    }

    pub fn domain(&self) -> IndexDomain {
        self.domain
    }

    /// Compose the query and aggregations for a listing request.
    pub fn compose(&self, input: &QueryInput) -> ComposedQuery {
        let mut query = QueryDocument::match_all();

        for token in &input.phylogeny {
            query.and_filter(Self::phylogeny_clause(token));
        }
        for token in &input.filters {
            query.and_filter(self.filter_clause(token, &input.current_class));
        }
        if let Some(term) = input.search.as_deref() {
            query.must_match_any(self.search_clauses(term));
        }

        ComposedQuery {
            query,
            aggregations: AggregationProfile::for_domain(self.domain, &input.current_class),
            sort: input.sort.clone(),
        }
    }

    /// Compile one filter token.
    pub fn filter_clause(&self, token: &FilterToken, current_class: &str) -> Clause {
        if token.targets_class(current_class) {
            return taxonomy_clause(current_class, &token.value);
        }
        match SyntheticKey::lookup(self.domain, &token.name) {
            Some(key) => key.clause(&token.value),
            None => Clause::term(&token.name, &token.value),
        }
    }

    /// Compile one phylogeny token into its own nested clause.
    pub fn phylogeny_clause(token: &PhylogenyToken) -> Clause {
        taxonomy_clause(&token.rank, &token.scientific_name)
    }

    /// Free-text wildcard clauses over the domain's search fields.
    pub fn search_clauses(&self, term: &str) -> Vec<Clause> {
        self.domain
            .search_fields()
            .iter()
            .map(|field| Clause::contains(*field, term))
            .collect()
    }

    /// Query for a single record's detail view.
    ///
    /// Data-portal records are addressed by organism name and carry the
    /// metadata facets; everything else is looked up by document id.
    pub fn compose_detail(&self, record_id: &str) -> ComposedQuery {
        let mut query = QueryDocument::match_all();
        let aggregations = if self.domain == IndexDomain::DataPortal {
            query.and_filter(Clause::term("organism", record_id));
            AggregationProfile::record_detail()
        } else {
            query.and_filter(Clause::term("_id", record_id));
            AggregationProfile::empty()
        };
        ComposedQuery {
            query,
            aggregations,
            sort: Vec::new(),
        }
    }
}

/// `taxonomies.<rank>.scientificName == name`, scoped to the rank's nested path.
fn taxonomy_clause(rank: &str, scientific_name: &str) -> Clause {
    Clause::nested_filter(
        format!("taxonomies.{rank}"),
        vec![Clause::term(
            format!("taxonomies.{rank}.scientificName"),
            scientific_name,
        )],
    )
}

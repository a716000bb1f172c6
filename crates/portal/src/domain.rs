//! Index domains.
//!
//! Every collection name maps onto one logical domain, which selects the
//! aggregation profile, the free-text search fields, the synthetic filter
//! keys, and the export column sets.

use std::fmt;

/// Logical category of stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexDomain {
    /// Literature records (`articles*` collections).
    Articles,
    /// Organism portal records (`data_portal*` collections).
    DataPortal,
    /// Per-organism tracking status (`tracking_status*` collections).
    TrackingStatus,
    /// Anything else (summary collections and similar).
    Other,
}

/// Free-text fields for literature collections.
const ARTICLE_SEARCH_FIELDS: &[&str] = &["title", "journal_name", "study_id", "organism_name"];

/// Free-text fields for organism-centric collections.
const ORGANISM_SEARCH_FIELDS: &[&str] = &[
    "organism",
    "commonName",
    "symbionts_records.organism.text",
    "metagenomes_records.organism.text",
];

impl IndexDomain {
    /// Classify a collection name by substring.
    ///
    /// Collections are versioned and environment-suffixed
    /// (`data_portal_v2`, `articles-staging`), so the tag is matched
    /// anywhere in the name.
    pub fn from_index(index: &str) -> Self {
        if index.contains("articles") {
            Self::Articles
        } else if index.contains("data_portal") {
            Self::DataPortal
        } else if index.contains("tracking_status") {
            Self::TrackingStatus
        } else {
            Self::Other
        }
    }

    /// Fields searched by the free-text wildcard disjunction.
    pub fn search_fields(self) -> &'static [&'static str] {
        match self {
            Self::Articles => ARTICLE_SEARCH_FIELDS,
            Self::DataPortal | Self::TrackingStatus | Self::Other => ORGANISM_SEARCH_FIELDS,
        }
    }

    /// Whether records carry the per-stage status fields.
    pub fn tracks_status(self) -> bool {
        matches!(self, Self::DataPortal | Self::TrackingStatus)
    }
}

impl fmt::Display for IndexDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Articles => "articles",
            Self::DataPortal => "data_portal",
            Self::TrackingStatus => "tracking_status",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

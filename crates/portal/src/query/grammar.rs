//! Parser for the flattened filter parameters sent by the web client.
//!
//! - `filter`: comma-separated `name:value` pairs
//! - `phylogeny_filters`: dash-separated `rank:scientificName` pairs
//! - `sort`: comma-separated `field` or `field:asc|desc`
//!
//! Each string is parsed exactly once at the request boundary; the rest of
//! the pipeline only sees typed tokens.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Malformed client input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("malformed filter token {0:?}: expected `name:value`")]
    MalformedFilterToken(String),

    #[error("malformed phylogeny token {0:?}: expected `rank:scientificName`")]
    MalformedPhylogenyToken(String),

    #[error("malformed sort token {0:?}: expected `field` or `field:asc|desc`")]
    MalformedSortToken(String),
}

/// One `name:value` pair from the filter string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterToken {
    pub name: String,
    pub value: String,
}

impl FilterToken {
    /// Whether this token targets the current taxonomic class.
    ///
    /// Substring containment, not equality: the client prefixes class
    /// filters (`kingdom`, `kingdom_filter`, ...).
    pub fn targets_class(&self, current_class: &str) -> bool {
        self.name.contains(current_class)
    }
}

/// One `rank:scientificName` pair from the phylogeny string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhylogenyToken {
    pub rank: String,
    pub scientific_name: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortToken {
    pub field: String,
    pub direction: SortDirection,
}

impl SortToken {
    /// Render as an Elasticsearch sort entry: `{field: {"order": dir}}`.
    pub fn to_json(&self) -> Value {
        let mut entry = serde_json::Map::new();
        entry.insert(
            self.field.clone(),
            json!({ "order": self.direction.as_str() }),
        );
        Value::Object(entry)
    }
}

/// Parse the comma-separated filter string.
pub fn parse_filters(raw: &str) -> Result<Vec<FilterToken>, GrammarError> {
    tokens(raw, ',')
        .map(|token| {
            split_pair(token)
                .map(|(name, value)| FilterToken {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .ok_or_else(|| GrammarError::MalformedFilterToken(token.to_string()))
        })
        .collect()
}

/// Parse the dash-separated phylogeny string.
pub fn parse_phylogeny(raw: &str) -> Result<Vec<PhylogenyToken>, GrammarError> {
    tokens(raw, '-')
        .map(|token| {
            split_pair(token)
                .map(|(rank, name)| PhylogenyToken {
                    rank: rank.to_string(),
                    scientific_name: name.to_string(),
                })
                .ok_or_else(|| GrammarError::MalformedPhylogenyToken(token.to_string()))
        })
        .collect()
}

/// Parse the comma-separated sort string.
pub fn parse_sort(raw: &str) -> Result<Vec<SortToken>, GrammarError> {
    tokens(raw, ',')
        .map(|token| {
            let malformed = || GrammarError::MalformedSortToken(token.to_string());
            let mut parts = token.split(':');
            let field = parts.next().filter(|f| !f.is_empty()).ok_or_else(malformed)?;
            let direction = match parts.next() {
                None | Some("asc") => SortDirection::Asc,
                Some("desc") => SortDirection::Desc,
                Some(_) => return Err(malformed()),
            };
            if parts.next().is_some() {
                return Err(malformed());
            }
            Ok(SortToken {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}

/// Split on `separator`; an empty input yields no tokens at all.
fn tokens(raw: &str, separator: char) -> impl Iterator<Item = &str> {
    let raw = if raw.is_empty() { None } else { Some(raw) };
    raw.into_iter().flat_map(move |s| s.split(separator))
}

/// Split `name:value` on its single colon; both halves must be non-empty.
fn split_pair(token: &str) -> Option<(&str, &str)> {
    let mut parts = token.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(value), None) if !name.is_empty() && !value.is_empty() => {
            Some((name, value))
        }
        _ => None,
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_yield_empty_sequences() {
        assert!(parse_filters("").unwrap().is_empty());
        assert!(parse_phylogeny("").unwrap().is_empty());
        assert!(parse_sort("").unwrap().is_empty());
    }

    #[test]
    fn filters_keep_encounter_order() {
        let tokens = parse_filters("biosamples:Done,experimentType:PCR-free,genome_notes:x").unwrap();
        let names: Vec<&str> = tokens.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["biosamples", "experimentType", "genome_notes"]);
        assert_eq!(tokens[1].value, "PCR-free");
    }

    #[test]
    fn filter_without_colon_is_rejected() {
        let err = parse_filters("a:1,broken").unwrap_err();
        assert_eq!(err, GrammarError::MalformedFilterToken("broken".to_string()));
    }

    #[test]
    fn filter_with_two_colons_is_rejected() {
        let err = parse_filters("url:https://example.org").unwrap_err();
        assert!(matches!(err, GrammarError::MalformedFilterToken(_)));
    }

    #[test]
    fn filter_with_empty_half_is_rejected() {
        assert!(parse_filters(":value").is_err());
        assert!(parse_filters("name:").is_err());
        assert!(parse_filters("a:1,").is_err());
    }

    #[test]
    fn phylogeny_splits_on_dash() {
        let tokens = parse_phylogeny("kingdom:Animalia-phylum:Chordata").unwrap();
        assert_eq!(
            tokens,
            vec![
                PhylogenyToken {
                    rank: "kingdom".to_string(),
                    scientific_name: "Animalia".to_string(),
                },
                PhylogenyToken {
                    rank: "phylum".to_string(),
                    scientific_name: "Chordata".to_string(),
                },
            ]
        );
    }

    #[test]
    fn phylogeny_token_without_name_is_rejected() {
        let err = parse_phylogeny("kingdom:Animalia-phylum").unwrap_err();
        assert_eq!(
            err,
            GrammarError::MalformedPhylogenyToken("phylum".to_string())
        );
    }

    #[test]
    fn class_dispatch_is_substring_containment() {
        let token = FilterToken {
            name: "kingdom_filter".to_string(),
            value: "Plantae".to_string(),
        };
        assert!(token.targets_class("kingdom"));
        assert!(!token.targets_class("Kingdom"));
        assert!(!token.targets_class("phylum"));
    }

    #[test]
    fn sort_directions() {
        let sort = parse_sort("organism:desc,commonName").unwrap();
        assert_eq!(sort[0].direction, SortDirection::Desc);
        assert_eq!(sort[1].field, "commonName");
        assert_eq!(sort[1].direction, SortDirection::Asc);
        assert_eq!(
            sort[0].to_json(),
            json!({ "organism": { "order": "desc" } })
        );
    }

    #[test]
    fn sort_rejects_unknown_direction() {
        assert!(matches!(
            parse_sort("organism:up"),
            Err(GrammarError::MalformedSortToken(_))
        ));
        assert!(parse_sort(":asc").is_err());
        assert!(parse_sort("a:asc:b").is_err());
    }
}

//! Query composition.
//!
//! This module provides:
//! - grammar: parsing of the flattened filter/phylogeny/sort strings
//! - dsl: the typed clause tree and its Elasticsearch rendering
//! - composer: filter dispatch, free-text merging, aggregation attachment

mod composer;
mod dsl;
pub mod grammar;

pub use composer::{ComposedQuery, DEFAULT_CURRENT_CLASS, QueryComposer, QueryInput, SyntheticKey};
pub use dsl::{BoolQuery, Clause, QueryDocument};
pub use grammar::{
    FilterToken, GrammarError, PhylogenyToken, SortDirection, SortToken, parse_filters,
    parse_phylogeny, parse_sort,
};

//! Aggregation of protein annotations from public databases.
//!
//! Records are retrieved from UniProt or NCBI protein, parsed from their
//! flat-file formats, cross-referenced to Gene Ontology terms via the
//! curated `external2go` tables, and collected into a per-gene annotation
//! table that can carry expression values, fold changes and free-text
//! annotations.

#![allow(dead_code)]

mod cache;
mod error;
mod fetch;
mod flatfile;
mod mapping;
mod ontology;
mod record;
mod services;
mod table;

pub use crate::cache::Cache;
pub use crate::error::{OntomapError, Result};
pub use crate::fetch::{Fetch, HttpFetcher};
pub use crate::mapping::{CrossRefMapper, MappingTable, System};
pub use crate::ontology::{Ancestry, GoTerm, OntologyGraph};
pub use crate::record::{Citation, Record};
pub use crate::services::{LookupDb, Oracle};
pub use crate::table::{fold_change, FeatureRow, OntologyTable, TableConfig};

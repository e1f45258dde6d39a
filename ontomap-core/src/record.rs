use std::collections::HashSet;
use std::fmt;

use crate::mapping::{CrossRefMapper, System};
use crate::Result;

/// Bibliographic reference attached to a [`Record`].
///
/// Field values are stored cleaned of surrounding spaces, semicolons and
/// quotes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Citation {
    pub number: String,
    pub position: String,
    pub comments: String,
    pub cross_references: String,
    pub group: String,
    pub authors: String,
    pub title: String,
    pub location: String,
}

/// Which citation field a tagged line populates.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum CitationField {
    Number,
    Position,
    Comments,
    CrossReferences,
    Group,
    Authors,
    Title,
    Location,
}

impl Citation {
    pub(crate) fn set(&mut self, field: CitationField, value: &str) {
        let value = clean_citation_value(value);
        match field {
            CitationField::Number => self.number = value,
            CitationField::Position => self.position = value,
            CitationField::Comments => self.comments = value,
            CitationField::CrossReferences => self.cross_references = value,
            CitationField::Group => self.group = value,
            CitationField::Authors => self.authors = value,
            CitationField::Title => self.title = value,
            CitationField::Location => self.location = value,
        }
    }
}

fn clean_citation_value(value: &str) -> String {
    value
        .trim_matches(|c| c == ' ' || c == ';')
        .trim_matches('"')
        .to_string()
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.title.is_empty() {
            parts.push(self.title.clone());
        }
        if !self.authors.is_empty() {
            parts.push(self.authors.clone());
        }
        if !self.location.is_empty() {
            parts.push(self.location.clone());
        }
        if !self.position.is_empty() {
            parts.push(format!("Cited for: {}", self.position));
        }
        write!(f, "{}", parts.join("  "))
    }
}

/// One parsed biological database entry.
///
/// Built once from raw flat-file text (see the `flatfile` module) and
/// mutated only by [`Record::enrich`]; never persisted. The classification
/// sets are plain string sets, so membership matters and duplicates cannot
/// occur.
///
/// A record holds at most one citation: the tagged-line format allows
/// several citation groups, but only the first is populated, with later
/// citation-tagged lines folding their fields into it (first-seen grouping).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub description: String,
    pub gene: Option<String>,
    pub sequence: String,
    pub accession_numbers: String,
    pub citation: Option<Citation>,

    // retained free-text fields from the tagged-line format
    pub dates: Vec<String>,
    pub gene_line: String,
    pub organism: String,
    pub organelle: String,
    pub organism_classification: String,
    pub taxonomy_xref: String,
    pub organism_host: String,
    pub protein_existence: String,
    pub keywords: String,
    pub comments: String,
    pub feature_table: String,

    // retained fields from the positional-stanza format
    pub locus: String,
    pub version: String,

    // classification sets
    pub ec: HashSet<String>,
    pub pfam: HashSet<String>,
    pub go: HashSet<String>,
    pub tigrfam: HashSet<String>,
    pub smart: HashSet<String>,
    pub interpro: HashSet<String>,
}

impl Record {
    /// Include the classification data of another record into this one.
    ///
    /// This is a one-way set union and should only be done with records
    /// believed to describe the same gene/protein, presumably obtained from
    /// different databases.
    pub fn enrich(&mut self, other: &Record) {
        self.ec.extend(other.ec.iter().cloned());
        self.pfam.extend(other.pfam.iter().cloned());
        self.go.extend(other.go.iter().cloned());
        self.tigrfam.extend(other.tigrfam.iter().cloned());
        self.smart.extend(other.smart.iter().cloned());
        self.interpro.extend(other.interpro.iter().cloned());
    }

    /// Canonicalize classification codes once a record finishes parsing.
    ///
    /// Pfam codes with the uppercase `PF` prefix are rewritten to the
    /// `pfam` prefix form; the sets themselves already deduplicate.
    pub(crate) fn normalize(&mut self) {
        let pfam: HashSet<String> = self
            .pfam
            .drain()
            .map(|code| match code.strip_prefix("PF") {
                Some(rest) => format!("pfam{}", rest),
                None => code,
            })
            .collect();
        self.pfam = pfam;
    }

    /// Derive GO terms from all currently known classification codes.
    ///
    /// Partial EC numbers (trailing `-`) are excluded from lookup.
    pub(crate) fn lookup_go_terms(&mut self, mapper: &CrossRefMapper) -> Result<()> {
        if !self.pfam.is_empty() {
            self.go.extend(mapper.lookup(System::Pfam, &self.pfam)?);
        }

        let full_ecs: Vec<&String> = self.ec.iter().filter(|ec| !ec.ends_with('-')).collect();
        if !full_ecs.is_empty() {
            self.go.extend(mapper.lookup(System::Ec, full_ecs)?);
        }

        if !self.tigrfam.is_empty() {
            self.go.extend(mapper.lookup(System::Tigrfam, &self.tigrfam)?);
        }
        if !self.smart.is_empty() {
            self.go.extend(mapper.lookup(System::Smart, &self.smart)?);
        }
        if !self.interpro.is_empty() {
            self.go.extend(mapper.lookup(System::Interpro, &self.interpro)?);
        }
        Ok(())
    }
}

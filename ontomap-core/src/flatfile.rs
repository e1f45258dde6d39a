//! Flat-file record parsers for the two upstream text formats.
//!
//! Both formats share the concept of a tag plus a value with continuation
//! lines, but differ in column widths and how a continuation is recognized:
//! the tagged-line format repeats a two-character code on every line, while
//! the positional-stanza format leaves its keyword column blank. The stanza
//! scanner is parameterized by key width so the same routine serves all of
//! the positional blocks.

use std::collections::HashMap;

use crate::mapping::CrossRefMapper;
use crate::record::{Citation, CitationField, Record};
use crate::Result;

/// Recognized two-character codes of the tagged-line format.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Tag {
    Id,
    Accession,
    Date,
    Description,
    GeneName,
    OrganismSpecies,
    Organelle,
    OrganismClassification,
    TaxonomyXref,
    OrganismHost,
    CitationNumber,
    CitationPosition,
    CitationComments,
    CitationXrefs,
    CitationGroup,
    CitationAuthors,
    CitationTitle,
    CitationLocation,
    Comments,
    DatabaseXref,
    ProteinExistence,
    Keywords,
    FeatureTable,
    SequenceHeader,
    SequenceData,
}

impl Tag {
    fn from_code(code: &str) -> Option<Tag> {
        let tag = match code {
            "ID" => Tag::Id,
            "AC" => Tag::Accession,
            "DT" => Tag::Date,
            "DE" => Tag::Description,
            "GN" => Tag::GeneName,
            "OS" => Tag::OrganismSpecies,
            "OG" => Tag::Organelle,
            "OC" => Tag::OrganismClassification,
            "OX" => Tag::TaxonomyXref,
            "OH" => Tag::OrganismHost,
            "RN" => Tag::CitationNumber,
            "RP" => Tag::CitationPosition,
            "RC" => Tag::CitationComments,
            "RX" => Tag::CitationXrefs,
            "RG" => Tag::CitationGroup,
            "RA" => Tag::CitationAuthors,
            "RT" => Tag::CitationTitle,
            "RL" => Tag::CitationLocation,
            "CC" => Tag::Comments,
            "DR" => Tag::DatabaseXref,
            "PE" => Tag::ProteinExistence,
            "KW" => Tag::Keywords,
            "FT" => Tag::FeatureTable,
            "SQ" => Tag::SequenceHeader,
            "  " => Tag::SequenceData,
            _ => return None,
        };
        Some(tag)
    }

    fn citation_field(self) -> Option<CitationField> {
        let field = match self {
            Tag::CitationNumber => CitationField::Number,
            Tag::CitationPosition => CitationField::Position,
            Tag::CitationComments => CitationField::Comments,
            Tag::CitationXrefs => CitationField::CrossReferences,
            Tag::CitationGroup => CitationField::Group,
            Tag::CitationAuthors => CitationField::Authors,
            Tag::CitationTitle => CitationField::Title,
            Tag::CitationLocation => CitationField::Location,
            _ => return None,
        };
        Some(field)
    }
}

/// Split a tagged line into its two-character code and value.
fn split_tagged(line: &str) -> (&str, &str) {
    let code = line.get(..2).unwrap_or(line);
    let value = line.get(2..).map(str::trim_start).unwrap_or("");
    (code, value)
}

/// Split a positional-stanza line into its keyword column and value.
/// Returns `None` at the record delimiter.
fn split_keyword(line: &str, keylen: usize) -> Option<(&str, &str)> {
    if line == "//" {
        return None;
    }
    let keylen = keylen.min(line.len());
    let key = line.get(..keylen).unwrap_or(line);
    Some((key.trim(), line.get(keylen..).unwrap_or("")))
}

/// Scan one stanza starting at `pos`: the value of the opening line plus
/// every following line whose keyword column is blank, joined by `sep`.
/// Returns the position of the first line after the stanza.
fn scan_stanza(lines: &[&str], mut pos: usize, sep: &str, keylen: usize) -> (usize, String) {
    let first = match lines.get(pos).and_then(|line| split_keyword(line, keylen)) {
        Some((_, value)) => value,
        None => return (pos, String::new()),
    };
    let mut parts = vec![first];
    pos += 1;
    while pos < lines.len() {
        match split_keyword(lines[pos], keylen) {
            Some((code, value)) if code.is_empty() => {
                parts.push(value);
                pos += 1;
            }
            _ => break,
        }
    }
    (pos, parts.join(sep))
}

impl Record {
    /// Parse a record in the tagged-line (UniProt-style) format.
    pub fn from_uniprot(text: &str, mapper: &CrossRefMapper) -> Result<Record> {
        // group values per code, preserving input order within a code and
        // first-seen order across codes
        let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for line in text.lines() {
            let (code, value) = split_tagged(line);
            let values = groups.entry(code).or_insert_with(Vec::new);
            if values.is_empty() {
                order.push(code);
            }
            values.push(value);
        }

        let mut record = Record::default();
        for code in order {
            let values = &groups[code];
            let tag = match Tag::from_code(code) {
                Some(tag) => tag,
                None => continue, // unrecognized codes skip silently
            };

            if let Some(field) = tag.citation_field() {
                record
                    .citation
                    .get_or_insert_with(Citation::default)
                    .set(field, &values.join(" "));
                continue;
            }

            match tag {
                Tag::Id => {
                    record.id = values[0].split_whitespace().next().unwrap_or("").to_string();
                }
                Tag::Accession => record.accession_numbers = values.concat(),
                Tag::Date => record.dates = values.iter().map(|v| v.to_string()).collect(),
                Tag::Description => record.description = values.join(" "),
                Tag::GeneName => {
                    let gene_line = values.join(" ");
                    if let Some(rest) = gene_line.strip_prefix("Name=") {
                        let symbol = rest.split(' ').next().unwrap_or("");
                        if !symbol.is_empty() {
                            record.gene = Some(symbol.to_string());
                        }
                    }
                    record.gene_line = gene_line;
                }
                Tag::OrganismSpecies => record.organism = values.join(" "),
                Tag::Organelle => record.organelle = values[0].to_string(),
                Tag::OrganismClassification => record.organism_classification = values.join(" "),
                Tag::TaxonomyXref => record.taxonomy_xref = values[0].to_string(),
                Tag::OrganismHost => record.organism_host = values[0].to_string(),
                Tag::Comments => record.comments = values.join(" "),
                Tag::DatabaseXref => {
                    for entry in values {
                        record.process_xref(entry, mapper)?;
                    }
                }
                Tag::ProteinExistence => record.protein_existence = values[0].to_string(),
                Tag::Keywords => record.keywords = values.join(" "),
                Tag::FeatureTable => record.feature_table = values.join(" "),
                Tag::SequenceHeader => {
                    if let Some(seq_lines) = groups.get("  ") {
                        record.sequence = seq_lines
                            .concat()
                            .chars()
                            .filter(|c| !c.is_whitespace())
                            .collect();
                    }
                }
                Tag::SequenceData => {} // consumed under the sequence header
                _ => unreachable!("citation tags handled above"),
            }
        }

        record.normalize();
        Ok(record)
    }

    /// Parse a record in the positional-stanza (GenBank-style) format.
    pub fn from_genbank(text: &str, mapper: &CrossRefMapper) -> Result<Record> {
        let lines: Vec<&str> = text.lines().collect();
        let mut record = Record::default();
        let mut pos = 0;
        while pos < lines.len() {
            let (code, value) = match split_keyword(lines[pos], 12) {
                Some(split) => split,
                None => {
                    pos += 1;
                    continue;
                }
            };
            match code {
                "LOCUS" => {
                    record.locus = value.trim().to_string();
                    pos += 1;
                }
                "DEFINITION" => {
                    let (next, definition) = scan_stanza(&lines, pos, " ", 12);
                    pos = next;
                    record.description = definition;
                }
                "ACCESSION" => {
                    record.accession_numbers = value.trim().to_string();
                    record.id = value.split_whitespace().next().unwrap_or("").to_string();
                    pos += 1;
                }
                "VERSION" => {
                    record.version = value.trim().to_string();
                    pos += 1;
                }
                "COMMENT" => {
                    let (next, comment) = scan_stanza(&lines, pos, "\n", 12);
                    pos = next;
                    record.comments = comment;
                }
                "FEATURES" => {
                    pos += 1;
                    let (next, features) = scan_stanza(&lines, pos, "\n", 1);
                    pos = next;
                    record.feature_table = features;
                }
                "ORIGIN" => {
                    pos += 1;
                    let (next, block) = scan_stanza(&lines, pos, "\n", 1);
                    pos = next;
                    // drop the base-count column, then every internal space
                    let joined: String = block.lines().map(|l| l.get(9..).unwrap_or("")).collect();
                    record.sequence = joined.split_whitespace().collect();
                }
                // unrecognized keywords skip silently
                _ => pos += 1,
            }
        }

        if record.id.is_empty() {
            record.id = record.locus.split_whitespace().next().unwrap_or("").to_string();
        }

        record.extract_features(mapper)?;
        record.normalize();
        Ok(record)
    }

    /// Handle one database cross-reference entry of a tagged-line record.
    fn process_xref(&mut self, entry: &str, mapper: &CrossRefMapper) -> Result<()> {
        let mut parts = entry.split(';');
        let database = parts.next().unwrap_or("");
        let code = parts.next().map(str::trim).unwrap_or("");
        if !code.is_empty() {
            match database {
                "GO" => {
                    self.go.insert(code.to_string());
                }
                "InterPro" => {
                    self.interpro.insert(code.to_string());
                }
                "Pfam" => {
                    self.pfam.insert(code.to_string());
                }
                "TIGRFAMs" => {
                    self.tigrfam.insert(code.to_string());
                }
                // other databases (EMBL, KEGG, PANTHER, ...) are skipped
                _ => {}
            }
        }
        self.lookup_go_terms(mapper)
    }

    /// Pull classification codes out of a positional-stanza features block.
    ///
    /// `/note=` values may span multiple lines and close with a quote; a
    /// closed note is split on `;` and classified by prefix. `/EC_number=`
    /// and `/gene=` are single-line quoted values.
    fn extract_features(&mut self, mapper: &CrossRefMapper) -> Result<()> {
        if !self.feature_table.is_empty() {
            let features = self.feature_table.clone();
            let mut note: Option<String> = None;
            for raw in features.lines() {
                let line = raw.trim();
                if let Some(open) = note.as_mut() {
                    open.push(' ');
                    open.push_str(line);
                    if !open.ends_with('"') {
                        continue;
                    }
                } else if line.starts_with("/note=") {
                    note = Some(line.to_string());
                    if !line.ends_with('"') {
                        continue;
                    }
                }
                if let Some(open) = note.take() {
                    let body = open["/note=".len()..].trim_matches('"');
                    for value in body.split(';') {
                        let value = value.trim();
                        if value.starts_with("pfam") {
                            self.pfam.insert(value.to_string());
                        } else if value.starts_with("TIGR") {
                            self.tigrfam.insert(value.to_string());
                        }
                        if value.starts_with("smart") {
                            self.smart.insert(value.to_string());
                        }
                    }
                }
                if line.starts_with("/EC_number=") {
                    if let Some(value) = line.splitn(2, '=').nth(1) {
                        self.ec.insert(value.trim_matches('"').to_string());
                    }
                }
                if line.starts_with("/gene=") {
                    if let Some(value) = line.splitn(2, '=').nth(1) {
                        self.gene = Some(value.trim_matches('"').to_string());
                    }
                }
            }
        }
        self.lookup_go_terms(mapper)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lazy_static::lazy_static;

    use super::*;
    use crate::fetch::mock::MockFetch;
    use crate::mapping::System;

    const UNIPROT_LINES: &[&str] = &[
        "ID   001R_FRG3G              Reviewed;         256 AA.",
        "AC   Q6GZX4;",
        "DT   28-JUN-2011, integrated into UniProtKB/Swiss-Prot.",
        "DE   RecName: Full=Putative transcription",
        "DE   factor 001R;",
        "GN   Name=FV3-001R",
        "OS   Frog virus 3 (isolate Goorha) (FV-3).",
        "OC   Viruses; Varidnaviria.",
        "OX   NCBI_TaxID=654924;",
        "RN   [1]",
        "RP   NUCLEOTIDE SEQUENCE [LARGE SCALE GENOMIC DNA];",
        "RA   Tan W.G., Barkman T.J.;",
        "RT   \"Comparative genomic analyses of frog virus 3.\";",
        "RL   Virology 323:70-84(2004).",
        "CC   -!- FUNCTION: Transcription regulation.",
        "DR   GO; GO:0046782; P:regulation of viral transcription; IEA:InterPro.",
        "DR   InterPro; IPR007031; Poxvirus_VLTF3.",
        "DR   Pfam; PF04947; Pox_VLTF3.",
        "DR   EMBL; AY548484; AAT09660.1.",
        "PE   4: Predicted;",
        "KW   Reference proteome.",
        "FT   CHAIN           1..256",
        "SQ   SEQUENCE   256 AA;  29735 MW;  B4840739BF7D4121 CRC64;",
        "     MAFSAEDVLK EYDRRRRMEA LLLSLYYPND",
        "     RKLLDYKEWS PPRVQVECPK",
    ];

    lazy_static! {
        static ref UNIPROT_RECORD: String = UNIPROT_LINES.join("\n");
    }

    fn mapper_with_bodies(bodies: &[(System, &str)]) -> CrossRefMapper {
        let mut mock = MockFetch::new();
        for (system, body) in bodies {
            mock = mock.body(system.url(), body);
        }
        CrossRefMapper::new(Arc::new(mock))
    }

    #[test]
    fn test_parse_uniprot_record() {
        let mapper = mapper_with_bodies(&[
            (
                System::Pfam,
                "Pfam:PF04947 Pox_VLTF3 > GO:regulation of transcription ; GO:0006355\n",
            ),
            (System::Interpro, ""),
        ]);
        let record = Record::from_uniprot(&UNIPROT_RECORD, &mapper).unwrap();

        assert_eq!(record.id, "001R_FRG3G");
        assert_eq!(record.accession_numbers, "Q6GZX4;");
        assert_eq!(
            record.description,
            "RecName: Full=Putative transcription factor 001R;"
        );
        assert_eq!(record.gene.as_deref(), Some("FV3-001R"));
        assert_eq!(record.organism, "Frog virus 3 (isolate Goorha) (FV-3).");
        assert_eq!(record.protein_existence, "4: Predicted;");

        // cross references, with Pfam canonicalized and EMBL ignored
        assert!(record.go.contains("GO:0046782"));
        assert!(record.go.contains("GO:0006355"));
        assert!(record.interpro.contains("IPR007031"));
        assert!(record.pfam.contains("pfam04947"));
        assert!(record.tigrfam.is_empty());

        // sequence block concatenated with whitespace stripped
        assert_eq!(record.sequence, "MAFSAEDVLKEYDRRRRMEALLLSLYYPNDRKLLDYKEWSPPRVQVECPK");
    }

    #[test]
    fn test_uniprot_citation_fields() {
        let input = "RN 1. \nRA Smith J.;\nRT \"A title\";\nRL J Biol. 1:1;";
        let mapper = mapper_with_bodies(&[]);
        let record = Record::from_uniprot(input, &mapper).unwrap();

        let citation = record.citation.expect("should collect citation");
        assert_eq!(citation.number, "1.");
        assert_eq!(citation.authors, "Smith J.");
        assert_eq!(citation.title, "A title");
        assert_eq!(citation.location, "J Biol. 1:1");
    }

    #[test]
    fn test_uniprot_first_citation_only() {
        // a second citation group folds into the first
        let input = "RN   [1]\nRA   Smith J.;\nRN   [2]\nRA   Jones K.;";
        let mapper = mapper_with_bodies(&[]);
        let record = Record::from_uniprot(input, &mapper).unwrap();

        let citation = record.citation.expect("should collect citation");
        assert_eq!(citation.number, "[1] [2]");
        // cleaning strips only the ends, so the internal `;` survives
        assert_eq!(citation.authors, "Smith J.; Jones K.");
    }

    #[test]
    fn test_gene_symbol_is_token_after_name_marker() {
        let input = "GN   Name=ftsZ OrderedLocusNames=b0095";
        let mapper = mapper_with_bodies(&[]);
        let record = Record::from_uniprot(input, &mapper).unwrap();
        assert_eq!(record.gene.as_deref(), Some("ftsZ"));

        let input = "GN   OrderedLocusNames=b0095";
        let record = Record::from_uniprot(input, &mapper).unwrap();
        assert_eq!(record.gene, None);
    }

    const GENBANK_LINES: &[&str] = &[
        "LOCUS       AB000100                 300 bp    DNA     linear   BCT 01-JAN-2000",
        "DEFINITION  Escherichia coli gene for hypothetical",
        "            protein, complete cds.",
        "ACCESSION   AB000100",
        "VERSION     AB000100.1",
        "SOURCE      Escherichia coli",
        "COMMENT     Provisional",
        "            annotation.",
        "FEATURES             Location/Qualifiers",
        "     source          1..300",
        "                     /organism=\"Escherichia coli\"",
        "     CDS             1..300",
        "                     /gene=\"ftsZ\"",
        "                     /EC_number=\"1.1.1.1\"",
        "                     /note=\"cell division protein;",
        "                     pfam00091; TIGR00002; smart00123\"",
        "ORIGIN      ",
        "        1 gatcctccat gcctaaggat",
        "       21 aaccctggga ttacaaacgg",
        "//",
    ];

    lazy_static! {
        static ref GENBANK_RECORD: String = GENBANK_LINES.join("\n");
    }

    #[test]
    fn test_parse_genbank_record() {
        let mapper = mapper_with_bodies(&[
            (System::Ec, "EC:1.1.1.1 > GO:oxidoreductase activity ; GO:0016491\n"),
            (System::Pfam, "Pfam:PF00091 Tubulin > GO:GTP binding ; GO:0005525\n"),
            (System::Tigrfam, "JCVI_TIGRFAMS:TIGR00002 > GO:cell cycle ; GO:0007049\n"),
            (System::Smart, ""),
        ]);
        let record = Record::from_genbank(&GENBANK_RECORD, &mapper).unwrap();

        assert_eq!(record.id, "AB000100");
        assert_eq!(
            record.description,
            "Escherichia coli gene for hypothetical protein, complete cds."
        );
        assert_eq!(record.version, "AB000100.1");
        assert_eq!(record.comments, "Provisional\nannotation.");
        assert_eq!(record.gene.as_deref(), Some("ftsZ"));

        // classification codes pulled from the features block
        assert!(record.ec.contains("1.1.1.1"));
        assert!(record.pfam.contains("pfam00091"));
        assert!(record.tigrfam.contains("TIGR00002"));
        assert!(record.smart.contains("smart00123"));

        // derived GO terms from the mapping tables
        assert!(record.go.contains("GO:0016491"));
        assert!(record.go.contains("GO:0005525"));
        assert!(record.go.contains("GO:0007049"));

        // base-count columns and spacing stripped from the sequence
        assert_eq!(record.sequence, "gatcctccatgcctaaggataaccctgggattacaaacgg");
    }

    #[test]
    fn test_extract_features_single_line_note() {
        let mapper = mapper_with_bodies(&[
            (System::Pfam, ""),
            (System::Tigrfam, ""),
        ]);
        let mut record = Record::default();
        record.feature_table = "     CDS             1..300\n                     /note=\"pfam00001; TIGR00002\"".to_string();
        record.extract_features(&mapper).unwrap();

        assert_eq!(record.pfam.iter().collect::<Vec<_>>(), vec!["pfam00001"]);
        assert_eq!(record.tigrfam.iter().collect::<Vec<_>>(), vec!["TIGR00002"]);
        assert!(record.smart.is_empty());
    }

    #[test]
    fn test_partial_ec_numbers_are_not_looked_up() {
        // no canned EC table: a lookup attempt would error
        let mapper = mapper_with_bodies(&[]);
        let mut record = Record::default();
        record.ec.insert("1.1.1.-".to_string());
        record.lookup_go_terms(&mapper).unwrap();
        assert!(record.go.is_empty());
    }

    #[test]
    fn test_keyword_split_survives_multibyte_boundary() {
        // a two-byte character straddling the keyword column must not panic
        let line = "AAAAAAAAAAAé rest";
        assert!(line.get(..12).is_none());
        let (key, value) = split_keyword(line, 12).expect("not a record delimiter");
        assert_eq!(key, line);
        assert_eq!(value, "");
    }

    #[test]
    fn test_unrecognized_tags_and_keywords_skip() {
        let mapper = mapper_with_bodies(&[]);

        let record = Record::from_uniprot("ZZ   mystery line\nID   THING", &mapper).unwrap();
        assert_eq!(record.id, "THING");

        let text = "LOCUS       X  10 bp\nDBLINK      Project:1234\n//";
        let record = Record::from_genbank(text, &mapper).unwrap();
        assert_eq!(record.id, "X");
    }
}

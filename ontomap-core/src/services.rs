use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::fetch::{Fetch, HttpFetcher};
use crate::mapping::CrossRefMapper;
use crate::ontology::OntologyGraph;
use crate::record::Record;
use crate::Result;

const UNIPROT_RECORD_URL: &str = "https://www.uniprot.org/uniprot/";
const UNIPROT_SEARCH_URL: &str = "https://www.uniprot.org/uniprot/?query=";
const NCBI_EFETCH_URL: &str =
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi?db=protein&id=";
const NCBI_ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?\
     &db=protein&rettype=seqid&sort=relevance&retmax=20&retmode=json&term=";

/// Which protein database an accession belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LookupDb {
    Uniprot,
    Ncbi,
}

impl LookupDb {
    /// The database to consult for supplementary hits.
    fn other(self) -> LookupDb {
        match self {
            LookupDb::Uniprot => LookupDb::Ncbi,
            LookupDb::Ncbi => LookupDb::Uniprot,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: Option<EsearchResult>,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Entry point tying the external services together: record retrieval from
/// the two protein databases, the cross-reference mapper, and the ontology
/// graph, all sharing one fetcher.
pub struct Oracle {
    fetcher: Arc<dyn Fetch>,
    pub ontology: OntologyGraph,
    pub mapper: CrossRefMapper,
}

impl Oracle {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Oracle {
        Oracle {
            ontology: OntologyGraph::new(Arc::clone(&fetcher)),
            mapper: CrossRefMapper::new(Arc::clone(&fetcher)),
            fetcher,
        }
    }

    pub fn with_http() -> Oracle {
        Oracle::new(Arc::new(HttpFetcher::default()))
    }

    /// Retrieve and parse a UniProt record in flat-file format.
    pub fn uniprot_record(&self, id: &str) -> Result<Record> {
        let url = format!("{}{}.txt", UNIPROT_RECORD_URL, quote(id));
        let text = self.fetcher.fetch(&url)?;
        Record::from_uniprot(&text, &self.mapper)
    }

    /// Retrieve and parse an NCBI protein record in GenBank format.
    pub fn ncbi_protein_record(&self, id: &str) -> Result<Record> {
        let url = format!("{}{}&rettype=gb&retmode=text", NCBI_EFETCH_URL, quote(id));
        let text = self.fetcher.fetch(&url)?;
        Record::from_genbank(&text, &self.mapper)
    }

    pub fn record(&self, db: LookupDb, id: &str) -> Result<Record> {
        match db {
            LookupDb::Uniprot => self.uniprot_record(id),
            LookupDb::Ncbi => self.ncbi_protein_record(id),
        }
    }

    /// Search UniProt, returning matching accessions best-first.
    pub fn uniprot_search(&self, term: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}{}&format=tab&sort=score&columns=id,reviewed,protein%20names",
            UNIPROT_SEARCH_URL,
            quote(term)
        );
        let text = self.fetcher.fetch(&url)?;
        let ids = text
            .lines()
            .skip(1) // header row
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| line.split('\t').next())
            .map(|id| id.to_string())
            .collect();
        Ok(ids)
    }

    /// Search NCBI protein, returning matching identifiers best-first.
    pub fn ncbi_protein_search(&self, term: &str) -> Result<Vec<String>> {
        let url = format!("{}{}", NCBI_ESEARCH_URL, quote(term));
        let text = self.fetcher.fetch(&url)?;
        let response: EsearchResponse = serde_json::from_str(&text)?;
        Ok(response
            .esearchresult
            .map(|result| result.idlist)
            .unwrap_or_default())
    }

    pub fn search(&self, db: LookupDb, term: &str) -> Result<Vec<String>> {
        match db {
            LookupDb::Uniprot => self.uniprot_search(term),
            LookupDb::Ncbi => self.ncbi_protein_search(term),
        }
    }

    /// Retrieve a record and enrich it with classification data mined from
    /// the other protein database.
    ///
    /// The supplementary hit is located by searching on gene symbol and
    /// organism; it is only merged when its sequence matches the primary
    /// record's, so two differently named entries cannot cross-contaminate.
    /// An empty search result or a mismatched sequence is not an error (the
    /// primary record is returned as-is), but retrieval failures propagate.
    pub fn mine_protein(
        &self,
        accession: &str,
        db: LookupDb,
        gene: Option<&str>,
        organism: Option<&str>,
    ) -> Result<Record> {
        info!("mining protein {} from {:?}", accession, db);
        let mut record = self.record(db, accession)?;

        let gene = match gene {
            Some(gene) if !gene.is_empty() => Some(gene.to_string()),
            _ => record.gene.clone(),
        };
        let gene = match gene {
            Some(gene) => gene,
            None => {
                debug!("no gene symbol for {}, skipping supplement", accession);
                return Ok(record);
            }
        };

        let other = db.other();
        let query = match (other, organism) {
            (LookupDb::Uniprot, Some(organism)) => {
                format!("gene:{} organism:{}", gene, organism)
            }
            (LookupDb::Uniprot, None) => format!("gene:{}", gene),
            (LookupDb::Ncbi, Some(organism)) => format!("{} {}", gene, organism),
            (LookupDb::Ncbi, None) => gene.clone(),
        };

        let hits = self.search(other, &query)?;
        let hit = match hits.first() {
            Some(hit) => hit,
            None => return Ok(record),
        };

        let supplement = self.record(other, hit)?;
        if !record.sequence.is_empty()
            && record.sequence.eq_ignore_ascii_case(&supplement.sequence)
        {
            debug!("enriching {} with {:?} record {}", accession, other, hit);
            record.enrich(&supplement);
        }

        Ok(record)
    }
}

/// Percent-encode a query component, keeping RFC 3986 unreserved bytes.
fn quote(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

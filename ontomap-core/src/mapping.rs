use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::cache::Cache;
use crate::fetch::Fetch;
use crate::Result;

/// Classification systems with curated code -> GO-term mappings.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum System {
    Ec,
    Pfam,
    Tigrfam,
    Smart,
    Interpro,
}

impl System {
    /// Authoritative location of the mapping file.
    pub fn url(self) -> &'static str {
        match self {
            System::Ec => "http://geneontology.org/external2go/ec2go",
            System::Pfam => "http://geneontology.org/external2go/pfam2go",
            System::Tigrfam => "http://geneontology.org/external2go/tigrfams2go",
            System::Smart => "http://geneontology.org/external2go/smart2go",
            System::Interpro => "http://geneontology.org/external2go/interpro2go",
        }
    }

    /// Bundled copy read when the remote fetch fails.
    pub fn fallback_file(self) -> &'static str {
        match self {
            System::Ec => "ec2go.txt",
            System::Pfam => "pfam2go.txt",
            System::Tigrfam => "tigrfam2go.txt",
            System::Smart => "smart2go.txt",
            System::Interpro => "interpro2go.txt",
        }
    }

    /// Rewrite a caller-supplied code to the key form stored in the mapping
    /// table. EC numbers may carry an `ec:`/`EC:` marker, Pfam codes appear
    /// as `pfam`/`PFAM`/`PF` spellings, SMART codes as `smart`/`SM`;
    /// TIGRFAM and InterPro codes are stored as supplied.
    fn normalize(self, code: &str) -> String {
        match self {
            System::Ec => code
                .strip_prefix("ec:")
                .or_else(|| code.strip_prefix("EC:"))
                .unwrap_or(code)
                .to_string(),
            System::Pfam => {
                if let Some(rest) = code.strip_prefix("pfam") {
                    format!("PF{}", rest)
                } else if let Some(rest) = code.strip_prefix("PFAM") {
                    format!("PF{}", rest)
                } else {
                    code.to_string()
                }
            }
            System::Smart => match code.strip_prefix("smart") {
                Some(rest) => format!("SM{}", rest),
                None => code.to_string(),
            },
            System::Tigrfam | System::Interpro => code.to_string(),
        }
    }
}

/// One classification system's code -> GO-term table.
///
/// Built from the `external2go` file format: comment lines start with `!`,
/// every other non-blank line pairs a namespaced code (first whitespace
/// token) with a GO identifier (last whitespace token).
#[derive(Debug, Default)]
pub struct MappingTable {
    entries: HashMap<String, Vec<String>>,
}

impl MappingTable {
    pub fn parse(text: &str) -> MappingTable {
        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        for line in text.lines() {
            if line.starts_with('!') || line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let first = match fields.next() {
                Some(first) => first,
                None => continue,
            };
            let go_id = match fields.last() {
                Some(last) => last,
                None => continue,
            };
            // "EC:1.1.1.1" and "JCVI_TIGRFAMS:TIGR00002" both key on the
            // part after the namespace prefix.
            let code = first.splitn(2, ':').nth(1).unwrap_or(first);
            entries
                .entry(code.to_string())
                .or_insert_with(Vec::new)
                .push(go_id.to_string());
        }
        MappingTable { entries }
    }

    pub fn get(&self, code: &str) -> Option<&Vec<String>> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lazily built, independently cached lookup tables for the five
/// classification systems.
///
/// The first lookup for a system retrieves its mapping file, falling back to
/// the bundled local copy on any retrieval failure; the parsed table is then
/// shared read-only for the remainder of the process.
pub struct CrossRefMapper {
    fetcher: Arc<dyn Fetch>,
    local_dir: PathBuf,
    tables: Cache<System, MappingTable>,
}

impl CrossRefMapper {
    pub fn new(fetcher: Arc<dyn Fetch>) -> CrossRefMapper {
        CrossRefMapper::with_local_dir(fetcher, "local_cache")
    }

    pub fn with_local_dir<P: Into<PathBuf>>(fetcher: Arc<dyn Fetch>, local_dir: P) -> CrossRefMapper {
        CrossRefMapper {
            fetcher,
            local_dir: local_dir.into(),
            tables: Cache::new(),
        }
    }

    fn table(&self, system: System) -> Result<Arc<MappingTable>> {
        let fetcher = Arc::clone(&self.fetcher);
        let fallback = self.local_dir.join(system.fallback_file());
        self.tables.get_or_populate(system, move || {
            debug!("building ontology mapping table for {:?}", system);
            let text = match fetcher.fetch(system.url()) {
                Ok(text) => text,
                Err(err) => {
                    debug!("remote mapping fetch failed ({}), reading {:?}", err, fallback);
                    fs::read_to_string(&fallback)?
                }
            };
            Ok(MappingTable::parse(&text))
        })
    }

    /// Look up the GO terms mapped to one or more classification codes.
    ///
    /// Unknown codes contribute no terms; they are not an error.
    pub fn lookup<I, S>(&self, system: System, codes: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = self.table(system)?;
        let mut terms = Vec::new();
        for code in codes {
            let key = system.normalize(code.as_ref());
            if let Some(ids) = table.get(&key) {
                terms.extend(ids.iter().cloned());
            }
        }
        Ok(terms)
    }

    /// Single-code convenience form of [`CrossRefMapper::lookup`].
    pub fn lookup_one(&self, system: System, code: &str) -> Result<Vec<String>> {
        self.lookup(system, std::iter::once(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetch;

    #[test]
    fn test_ec_lookup_with_and_without_prefix() {
        let mock = Arc::new(MockFetch::new().body(
            System::Ec.url(),
            "! comment line\nEC:1.1.1.1 > GO:oxidoreductase activity ; GO:0016491\n",
        ));
        let mapper = CrossRefMapper::new(mock.clone());

        assert_eq!(mapper.lookup_one(System::Ec, "1.1.1.1").unwrap(), vec!["GO:0016491"]);
        assert_eq!(mapper.lookup_one(System::Ec, "ec:1.1.1.1").unwrap(), vec!["GO:0016491"]);
        assert_eq!(mapper.lookup_one(System::Ec, "EC:1.1.1.1").unwrap(), vec!["GO:0016491"]);

        // the table was fetched exactly once for all three lookups
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn test_pfam_spellings_normalize_to_one_key() {
        let mock = Arc::new(MockFetch::new().body(
            System::Pfam.url(),
            "Pfam:PF00001 7tm_1 > GO:G protein-coupled receptor activity ; GO:0004930\n",
        ));
        let mapper = CrossRefMapper::new(mock);

        for spelling in &["PF00001", "pfam00001", "PFAM00001"] {
            assert_eq!(
                mapper.lookup_one(System::Pfam, spelling).unwrap(),
                vec!["GO:0004930"],
                "spelling {}",
                spelling
            );
        }
    }

    #[test]
    fn test_smart_prefix_normalization() {
        let mock = Arc::new(MockFetch::new().body(
            System::Smart.url(),
            "SMART:SM00123 > GO:DNA binding ; GO:0003677\n",
        ));
        let mapper = CrossRefMapper::new(mock);

        assert_eq!(mapper.lookup_one(System::Smart, "smart00123").unwrap(), vec!["GO:0003677"]);
        assert_eq!(mapper.lookup_one(System::Smart, "SM00123").unwrap(), vec!["GO:0003677"]);
    }

    #[test]
    fn test_unknown_code_is_empty_not_error() {
        let mock = Arc::new(MockFetch::new().body(System::Tigrfam.url(), ""));
        let mapper = CrossRefMapper::new(mock);

        let terms = mapper.lookup_one(System::Tigrfam, "TIGR99999").unwrap();
        assert!(terms.is_empty());
    }

    #[test]
    fn test_many_codes_accumulate() {
        let mock = Arc::new(MockFetch::new().body(
            System::Interpro.url(),
            "InterPro:IPR000001 Kringle > GO:signal transduction ; GO:0007165\n\
             InterPro:IPR000003 Retinoid-X receptor > GO:DNA binding ; GO:0003677\n",
        ));
        let mapper = CrossRefMapper::new(mock);

        let terms = mapper
            .lookup(System::Interpro, &["IPR000001", "IPR000003", "IPR999999"])
            .unwrap();
        assert_eq!(terms, vec!["GO:0007165", "GO:0003677"]);
    }

    #[test]
    fn test_fallback_to_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(System::Ec.fallback_file()),
            "EC:1.1.1.1 > GO:oxidoreductase activity ; GO:0016491\n",
        )
        .unwrap();

        // no canned body for the EC url, so the remote fetch fails
        let mock = Arc::new(MockFetch::new());
        let mapper = CrossRefMapper::with_local_dir(mock, dir.path());

        assert_eq!(mapper.lookup_one(System::Ec, "1.1.1.1").unwrap(), vec!["GO:0016491"]);
    }

    #[test]
    fn test_missing_remote_and_local_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockFetch::new());
        let mapper = CrossRefMapper::with_local_dir(mock, dir.path());

        assert!(mapper.lookup_one(System::Smart, "SM00123").is_err());
    }
}

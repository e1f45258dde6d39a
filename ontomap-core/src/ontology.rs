use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::cache::Cache;
use crate::error::OntomapError;
use crate::fetch::Fetch;
use crate::Result;

const TERM_URL_PREFIX: &str = "http://www.ebi.ac.uk/QuickGO/GTerm?id=";
const TERM_URL_SUFFIX: &str = "&format=obo";
const SLIM_URL: &str = "http://www.geneontology.org/ontology/subsets/goslim_generic.obo";

/// A node in the external GO DAG, parsed from OBO-style term text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GoTerm {
    pub id: String,
    pub name: String,
    pub definition: String,
    pub synonyms: Vec<String>,
    pub xrefs: Vec<String>,
    /// Direct parent identifiers (`is_a` edges).
    pub is_a: Vec<String>,
}

impl GoTerm {
    pub fn parse(text: &str) -> GoTerm {
        let mut term = GoTerm::default();
        for line in text.lines() {
            if let Some(value) = line.strip_prefix("id: ") {
                term.id = value.to_string();
            } else if let Some(value) = line.strip_prefix("name: ") {
                term.name = value.to_string();
            } else if let Some(value) = line.strip_prefix("def: ") {
                term.definition = value.trim_matches('"').to_string();
            } else if let Some(value) = line.strip_prefix("synonym: ") {
                term.synonyms.push(value.to_string());
            } else if let Some(value) = line.strip_prefix("xref: ") {
                term.xrefs.push(value.to_string());
            } else if let Some(value) = line.strip_prefix("is_a: ") {
                // the token before the descriptive comment marker
                let id = value.split('!').next().unwrap_or("").trim();
                term.is_a.push(id.to_string());
            }
        }
        term
    }

    /// A term with no parents is the root of its namespace.
    pub fn is_root(&self) -> bool {
        self.is_a.is_empty()
    }
}

/// Transitive ancestor closure of one term.
#[derive(Debug, Clone, PartialEq)]
pub struct Ancestry {
    /// Every identifier reachable over `is_a` edges, deduplicated.
    pub ancestors: HashSet<String>,
    /// Name of the namespace root this term descends from, or the term's
    /// own name if it has no ancestors.
    pub namespace: String,
}

/// On-demand view of the remote Gene Ontology.
///
/// Terms are fetched individually the first time their identifier is
/// requested and cached for the lifetime of the process. The cache is never
/// invalidated; this is safe only under the assumption that the ontology
/// source is immutable during a run.
pub struct OntologyGraph {
    fetcher: Arc<dyn Fetch>,
    terms: Cache<String, GoTerm>,
    slims: Cache<(), HashSet<String>>,
}

impl OntologyGraph {
    pub fn new(fetcher: Arc<dyn Fetch>) -> OntologyGraph {
        OntologyGraph {
            fetcher,
            terms: Cache::new(),
            slims: Cache::new(),
        }
    }

    pub fn term_url(id: &str) -> String {
        format!("{}{}{}", TERM_URL_PREFIX, id, TERM_URL_SUFFIX)
    }

    /// Fetch and parse a term, memoized by identifier.
    ///
    /// Resolution failure propagates as a retrieval error; no partial term
    /// is synthesized.
    pub fn resolve(&self, id: &str) -> Result<Arc<GoTerm>> {
        let fetcher = Arc::clone(&self.fetcher);
        let url = OntologyGraph::term_url(id);
        self.terms.get_or_populate(id.to_string(), move || {
            debug!("fetching ontology term {}", id);
            let text = fetcher.fetch(&url)?;
            Ok(GoTerm::parse(&text))
        })
    }

    /// Compute the transitive ancestor closure and namespace of a term.
    ///
    /// Work-list traversal over `is_a` edges: direct parents seed the
    /// queue; each popped identifier is resolved (hitting the term cache),
    /// recorded, and its parents pushed. The visited set bounds the
    /// traversal on diamonds; re-reaching the starting identifier is a
    /// structural-integrity failure.
    pub fn ancestry(&self, id: &str) -> Result<Ancestry> {
        let term = self.resolve(id)?;
        let mut ancestors: HashSet<String> = HashSet::new();
        let mut namespace = String::new();
        let mut queue: VecDeque<String> = term.is_a.iter().cloned().collect();

        while let Some(current) = queue.pop_front() {
            if current == id {
                return Err(OntomapError::CyclicOntology { id: id.to_string() });
            }
            if !ancestors.insert(current.clone()) {
                continue;
            }
            let parent = self.resolve(&current)?;
            if parent.is_root() {
                namespace = parent.name.clone();
            }
            queue.extend(parent.is_a.iter().cloned());
        }

        if ancestors.is_empty() {
            namespace = term.name.clone();
        }
        Ok(Ancestry { ancestors, namespace })
    }

    /// The curated coarse-grained slim vocabulary, fetched and cached once.
    pub fn slim_set(&self) -> Result<Arc<HashSet<String>>> {
        let fetcher = Arc::clone(&self.fetcher);
        self.slims.get_or_populate((), move || {
            debug!("fetching GO slim vocabulary");
            let text = fetcher.fetch(SLIM_URL)?;
            let mut set = HashSet::new();
            for line in text.lines() {
                if let Some(id) = line.strip_prefix("id: ") {
                    if id.starts_with("GO:") {
                        set.insert(id.to_string());
                    }
                }
            }
            Ok(set)
        })
    }

    /// The subset of a term's ancestors present in the slim vocabulary,
    /// sorted for stable output.
    pub fn slims_of(&self, id: &str) -> Result<Vec<String>> {
        let slims = self.slim_set()?;
        let ancestry = self.ancestry(id)?;
        let mut hits: Vec<String> = ancestry
            .ancestors
            .iter()
            .filter(|ancestor| slims.contains(*ancestor))
            .cloned()
            .collect();
        hits.sort();
        Ok(hits)
    }
}

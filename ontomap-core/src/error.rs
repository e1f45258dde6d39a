use std::io;

use thiserror::Error;

/// Error type for ontomap operations.
#[derive(Error, Debug)]
pub enum OntomapError {
    /// Remote retrieval failed after exhausting the retry budget.
    #[error("retrieval failed after {attempts} attempt(s): {reason}")]
    Retrieval { reason: String, attempts: u32 },

    /// IO error occurred during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV error while reading or writing tabular data.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed JSON in a search response.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ancestor traversal re-reached its starting term.
    #[error("ontology cycle detected at {id}")]
    CyclicOntology { id: String },

    /// A table operation was attempted without a mandated input.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A column label was added to a table that already carries it.
    #[error("label {label} already present in table")]
    DuplicateLabel { label: String },
}

pub type Result<T> = std::result::Result<T, OntomapError>;

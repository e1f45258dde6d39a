use std::collections::HashMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::info;

use crate::error::OntomapError;
use crate::ontology::OntologyGraph;
use crate::record::Record;
use crate::services::{LookupDb, Oracle};
use crate::Result;

/// Fold change of `to` as compared to `from`.
///
/// `log2` selects a log base 2 transformed ratio; `round_values` is added to
/// both inputs before the calculation to account for measurement biases.
pub fn fold_change(from: f64, to: f64, log2: bool, round_values: f64) -> f64 {
    let from = from + round_values;
    let to = to + round_values;

    if from == 0.0 && to == 0.0 {
        return if log2 { 0.0 } else { 1.0 };
    } else if from == 0.0 {
        return f64::INFINITY;
    } else if to == 0.0 {
        return f64::NEG_INFINITY;
    }

    if log2 {
        to.log2() - from.log2()
    } else {
        to / from
    }
}

/// One row of the per-gene annotation table.
#[derive(Debug, Default, Clone)]
pub struct FeatureRow {
    pub feature: Option<String>,
    pub gene: Option<String>,
    pub description: Option<String>,
    pub protein_id: Option<String>,
    pub go: Vec<String>,
    /// Computed lazily from the GO terms on first dump.
    pub go_slims: Option<Vec<String>>,
    pub ec: Vec<String>,
    pub pfam: Vec<String>,
    pub tigrfam: Vec<String>,
    pub smart: Vec<String>,
    pub interpro: Vec<String>,
    expression: HashMap<String, f64>,
    foldchanges: HashMap<String, f64>,
    annotations: HashMap<String, String>,
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl FeatureRow {
    pub fn new(feature: &str, description: &str, gene: &str, protein_id: &str) -> FeatureRow {
        FeatureRow {
            feature: non_empty(feature),
            description: non_empty(description),
            gene: non_empty(gene),
            protein_id: non_empty(protein_id),
            ..FeatureRow::default()
        }
    }

    /// Copy the classification data of a mined record into this row,
    /// sorted for stable output.
    pub fn fill_from_record(&mut self, record: &Record) {
        fn sorted(set: &std::collections::HashSet<String>) -> Vec<String> {
            let mut values: Vec<String> = set.iter().cloned().collect();
            values.sort();
            values
        }
        self.go = sorted(&record.go);
        self.ec = sorted(&record.ec);
        self.pfam = sorted(&record.pfam);
        self.tigrfam = sorted(&record.tigrfam);
        self.smart = sorted(&record.smart);
        self.interpro = sorted(&record.interpro);
    }

    pub fn add_expression(&mut self, label: &str, value: f64) {
        self.expression.insert(label.to_string(), value);
    }

    pub fn add_annotation(&mut self, label: &str, value: &str) {
        self.annotations.insert(label.to_string(), value.to_string());
    }

    /// Record the fold change between two expression columns, if the row
    /// carries values for both.
    pub fn calc_foldchange(&mut self, from_label: &str, to_label: &str) {
        if let (Some(&from), Some(&to)) =
            (self.expression.get(from_label), self.expression.get(to_label))
        {
            let label = format!("{}:{}", from_label, to_label);
            self.foldchanges.insert(label, fold_change(from, to, true, 0.01));
        }
    }

    fn slims(&mut self, graph: &OntologyGraph) -> Result<&[String]> {
        if self.go_slims.is_none() {
            let mut slims = Vec::new();
            for term in &self.go {
                slims.extend(graph.slims_of(term)?);
            }
            slims.sort();
            slims.dedup();
            self.go_slims = Some(slims);
        }
        Ok(self.go_slims.as_deref().unwrap_or(&[]))
    }

    fn csv_row(
        &mut self,
        graph: &OntologyGraph,
        expression_labels: &[String],
        foldchange_labels: &[String],
        annotation_labels: &[String],
    ) -> Result<Vec<String>> {
        let mut row = Vec::new();
        row.push(self.feature.clone().unwrap_or_default());
        row.push(self.gene.clone().unwrap_or_default());
        row.push(self.description.clone().unwrap_or_default());
        row.push(self.go.iter().join(";"));
        row.push(self.slims(graph)?.iter().join(";"));
        row.push(self.ec.iter().join(";"));
        row.push(self.pfam.iter().join(";"));
        row.push(self.tigrfam.iter().join(";"));
        row.push(self.smart.iter().join(";"));
        row.push(self.interpro.iter().join(";"));

        for label in expression_labels {
            row.push(match self.expression.get(label) {
                Some(value) => value.to_string(),
                None => String::new(),
            });
        }
        for label in foldchange_labels {
            row.push(match self.foldchanges.get(label) {
                Some(value) => value.to_string(),
                None => String::new(),
            });
        }
        for label in annotation_labels {
            row.push(self.annotations.get(label).cloned().unwrap_or_default());
        }
        Ok(row)
    }
}

/// Inputs required to build a table from a feature table file.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub organism: String,
    pub feature_table: PathBuf,
    pub lookup_db: LookupDb,
    /// Column holding the feature identifier.
    pub label_col: String,
    /// Column holding the protein accession to mine.
    pub accession_col: String,
    pub description_col: String,
    pub gene_col: String,
}

impl TableConfig {
    fn validate(&self) -> Result<()> {
        fn require(value: &str, name: &str) -> Result<()> {
            if value.is_empty() {
                return Err(OntomapError::MissingField(name.to_string()));
            }
            Ok(())
        }
        require(&self.organism, "organism")?;
        require(self.feature_table.to_str().unwrap_or(""), "feature_table")?;
        require(&self.label_col, "label_col")?;
        require(&self.accession_col, "accession_col")?;
        require(&self.description_col, "description_col")?;
        require(&self.gene_col, "gene_col")?;
        Ok(())
    }
}

const FIXED_COLUMNS: [&str; 10] = [
    "feature", "gene", "product", "go-term", "go-slim", "ec", "pfam", "tigrfam", "smart",
    "interpro",
];

/// Per-gene annotation table, enrichable with expression, fold-change and
/// free-text annotation columns.
#[derive(Debug, Default)]
pub struct OntologyTable {
    pub rows: Vec<FeatureRow>,
    expression_labels: Vec<String>,
    foldchange_labels: Vec<String>,
    annotation_labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl OntologyTable {
    /// Build the table by mining every accession of a tab-delimited feature
    /// table.
    pub fn build(config: &TableConfig, oracle: &Oracle) -> Result<OntologyTable> {
        config.validate()?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(&config.feature_table)?;
        let headers = reader.headers()?.clone();
        let label_idx = column(&headers, &config.label_col)?;
        let accession_idx = column(&headers, &config.accession_col)?;
        let description_idx = column(&headers, &config.description_col)?;
        let gene_idx = column(&headers, &config.gene_col)?;

        let mut table = OntologyTable::default();
        let mut finished = 0;
        for result in reader.records() {
            let csv_row = result?;
            let accession = csv_row.get(accession_idx).unwrap_or("");
            if !accession.is_empty() {
                let mut row = FeatureRow::new(
                    csv_row.get(label_idx).unwrap_or(""),
                    csv_row.get(description_idx).unwrap_or(""),
                    csv_row.get(gene_idx).unwrap_or(""),
                    accession,
                );
                let record = oracle.mine_protein(
                    accession,
                    config.lookup_db,
                    row.gene.as_deref(),
                    Some(config.organism.as_str()),
                )?;
                if row.gene.is_none() {
                    row.gene = record.gene.clone().or_else(|| row.feature.clone());
                }
                row.fill_from_record(&record);
                table.rows.push(row);
            }
            finished += 1;
            if finished % 10 == 0 {
                info!("finished {:4} records", finished);
            }
        }

        table.build_index();
        Ok(table)
    }

    /// Reload a table previously written by [`OntologyTable::dump`],
    /// including its dynamic columns.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<OntologyTable> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();

        let mut table = OntologyTable::default();
        for header in headers.iter() {
            if let Some(label) = header.strip_prefix("expr:") {
                table.expression_labels.push(label.to_string());
            } else if let Some(label) = header.strip_prefix("foldchange:") {
                table.foldchange_labels.push(label.to_string());
            } else if let Some(label) = header.strip_prefix("annotation:") {
                table.annotation_labels.push(label.to_string());
            }
        }

        for result in reader.records() {
            let csv_row = result?;
            let field = |idx: usize| csv_row.get(idx).unwrap_or("");
            let list = |idx: usize| -> Vec<String> {
                field(idx)
                    .split(';')
                    .filter(|part| !part.is_empty())
                    .map(|part| part.to_string())
                    .collect()
            };

            let mut row = FeatureRow::new(field(0), field(2), field(1), "");
            row.go = list(3);
            row.go_slims = Some(list(4));
            row.ec = list(5);
            row.pfam = list(6);
            row.tigrfam = list(7);
            row.smart = list(8);
            row.interpro = list(9);

            for (idx, header) in headers.iter().enumerate().skip(FIXED_COLUMNS.len()) {
                let value = field(idx);
                if value.is_empty() {
                    continue;
                }
                if let Some(label) = header.strip_prefix("expr:") {
                    if let Ok(value) = value.parse::<f64>() {
                        row.expression.insert(label.to_string(), value);
                    }
                } else if let Some(label) = header.strip_prefix("foldchange:") {
                    if let Ok(value) = value.parse::<f64>() {
                        row.foldchanges.insert(label.to_string(), value);
                    }
                } else if let Some(label) = header.strip_prefix("annotation:") {
                    row.annotations.insert(label.to_string(), value.to_string());
                }
            }

            table.rows.push(row);
        }

        table.build_index();
        Ok(table)
    }

    fn build_index(&mut self) {
        self.index.clear();
        for (position, row) in self.rows.iter().enumerate() {
            if let Some(feature) = &row.feature {
                self.index.insert(feature.clone(), position);
            }
            if let Some(gene) = &row.gene {
                self.index.insert(gene.clone(), position);
            }
        }
    }

    /// Look a row up by feature identifier or gene symbol.
    pub fn get(&self, key: &str) -> Option<&FeatureRow> {
        self.index.get(key).map(|&position| &self.rows[position])
    }

    /// Merge a CSV of expression values into the table under a new label.
    pub fn add_expression_values<P: AsRef<Path>>(
        &mut self,
        path: P,
        label: &str,
        locus_col: &str,
        value_col: &str,
    ) -> Result<()> {
        if self.expression_labels.iter().any(|existing| existing == label) {
            return Err(OntomapError::DuplicateLabel { label: label.to_string() });
        }
        self.expression_labels.push(label.to_string());

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        let locus_idx = column(&headers, locus_col)?;
        let value_idx = column(&headers, value_col)?;

        for result in reader.records() {
            let csv_row = result?;
            let locus = csv_row.get(locus_idx).unwrap_or("");
            let value = csv_row.get(value_idx).unwrap_or("");
            if let (Some(&position), Ok(value)) = (self.index.get(locus), value.parse::<f64>()) {
                self.rows[position].add_expression(label, value);
            }
        }
        Ok(())
    }

    /// Compute a fold-change column between two expression labels.
    pub fn calc_foldchange(&mut self, from_label: &str, to_label: &str) -> Result<()> {
        let label = format!("{}:{}", from_label, to_label);
        if self.foldchange_labels.iter().any(|existing| *existing == label) {
            return Err(OntomapError::DuplicateLabel { label });
        }
        self.foldchange_labels.push(label);

        for row in &mut self.rows {
            row.calc_foldchange(from_label, to_label);
        }
        Ok(())
    }

    /// Merge a CSV of free-text annotations into the table under a new
    /// label, matching rows by locus or by description substring.
    pub fn add_annotation<P: AsRef<Path>>(
        &mut self,
        path: P,
        label: &str,
        value_col: &str,
        locus_col: Option<&str>,
        product_col: Option<&str>,
    ) -> Result<()> {
        if self.annotation_labels.iter().any(|existing| existing == label) {
            return Err(OntomapError::DuplicateLabel { label: label.to_string() });
        }
        self.annotation_labels.push(label.to_string());

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        let value_idx = column(&headers, value_col)?;
        let locus_idx = locus_col.map(|name| column(&headers, name)).transpose()?;
        let product_idx = product_col.map(|name| column(&headers, name)).transpose()?;

        for result in reader.records() {
            let csv_row = result?;
            let value = csv_row.get(value_idx).unwrap_or("");
            if let Some(locus_idx) = locus_idx {
                let locus = csv_row.get(locus_idx).unwrap_or("");
                if let Some(&position) = self.index.get(locus) {
                    self.rows[position].add_annotation(label, value);
                }
            } else if let Some(product_idx) = product_idx {
                let product = csv_row.get(product_idx).unwrap_or("");
                if product.is_empty() {
                    continue;
                }
                for row in &mut self.rows {
                    let matches = row
                        .description
                        .as_deref()
                        .map(|description| description.contains(product))
                        .unwrap_or(false);
                    if matches {
                        row.add_annotation(label, value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Write the table as CSV: the fixed column schema followed by the
    /// dynamic expression, fold-change and annotation columns.
    pub fn dump<P: AsRef<Path>>(&mut self, path: P, graph: &OntologyGraph) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().from_path(path)?;

        let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|name| name.to_string()).collect();
        header.extend(self.expression_labels.iter().map(|label| format!("expr:{}", label)));
        header.extend(self.foldchange_labels.iter().map(|label| format!("foldchange:{}", label)));
        header.extend(self.annotation_labels.iter().map(|label| format!("annotation:{}", label)));
        writer.write_record(&header)?;

        let expression_labels = &self.expression_labels;
        let foldchange_labels = &self.foldchange_labels;
        let annotation_labels = &self.annotation_labels;
        for row in &mut self.rows {
            let record = row.csv_row(graph, expression_labels, foldchange_labels, annotation_labels)?;
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| OntomapError::MissingField(name.to_string()))
}

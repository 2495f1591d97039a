use log::debug;
use serde::{Deserialize, Serialize};
use simple_error::bail;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::data_types::fragments::{BaseObservation, NucleotideFragment};
use crate::hla::alleles::HlaGene;
use crate::hla::errors::HlaTypingError;
use crate::util::file_io::{open_reader, open_writer};

/// One row of the evidence table, a single base observed by a fragment
#[derive(Debug, Deserialize, Serialize)]
struct EvidenceRow {
    /// Fragment identifier; rows sharing an id are merged
    fragment_id: String,
    /// The gene the observation was sourced from, "HLA-A" or "A"
    gene: String,
    /// 0-based coding locus
    locus: usize,
    /// The observed base
    base: String,
    /// Phred base quality
    quality: u8
}

/// Loads raw nucleotide fragments from a tab-delimited evidence table with the header
/// `fragment_id gene locus base quality`. Fragments are returned sorted by id.
/// # Arguments
/// * `filename` - the table to load, optionally gzipped
/// # Errors
/// * `HlaTypingError::InputUnavailable` if the file cannot be opened
/// * if a row fails to parse
/// * if a row has an unknown gene or a base that is not a single character
pub fn load_evidence_table(filename: &Path) -> Result<Vec<NucleotideFragment>, Box<dyn std::error::Error>> {
    let table_reader = open_reader(filename)
        .map_err(|e| HlaTypingError::input_unavailable("Evidence table", filename, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .from_reader(table_reader);

    let mut fragments: BTreeMap<String, NucleotideFragment> = Default::default();
    let mut num_rows: usize = 0;
    for row in reader.deserialize() {
        let record: EvidenceRow = row?;
        let gene = HlaGene::from_str(&record.gene)?;
        let base = match record.base.as_bytes() {
            [b] => *b,
            _ => bail!("Evidence base must be a single character, found \"{}\" for fragment {}", record.base, record.fragment_id)
        };

        let fragment = fragments.entry(record.fragment_id.clone())
            .or_insert_with(|| NucleotideFragment::new(record.fragment_id.clone(), Default::default()));
        fragment.add_gene(gene);
        fragment.add_observation(record.locus, BaseObservation::new(base, record.quality));
        num_rows += 1;
    }
    debug!("Loaded {num_rows} evidence rows into {} fragments from {filename:?}", fragments.len());

    Ok(fragments.into_values().collect())
}

/// Saves fragments in the evidence table format. A fragment sourced from several genes is written
/// once per gene so that loading restores the gene set.
/// # Arguments
/// * `fragments` - the fragments to save
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
pub fn save_evidence_table(fragments: &[NucleotideFragment], out_filename: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(open_writer(out_filename)?);

    for fragment in fragments.iter() {
        for gene in fragment.genes().iter() {
            for (locus, observation) in fragment.observation_iter() {
                csv_writer.serialize(EvidenceRow {
                    fragment_id: fragment.id().to_string(),
                    gene: gene.to_string(),
                    locus,
                    base: (observation.base() as char).to_string(),
                    quality: observation.quality()
                })?;
            }
        }
    }
    csv_writer.flush()?;
    Ok(())
}

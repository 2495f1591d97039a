use log::{debug, info, trace, warn};
use rust_htslib::bam::Read;
use rust_htslib::bam::ext::BamRecordExtensions;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data_types::fragments::{BaseObservation, NucleotideFragment};
use crate::data_types::gene_definition::{HlaGeneConfig, HlaGeneDefinition};
use crate::hla::alleles::HlaGene;
use crate::hla::errors::HlaTypingError;

/// Collects the coding bases of aligned reads into fragments, merging mates by read name
#[derive(Debug, Default)]
pub struct FragmentCollector {
    /// Read name -> fragment; BTreeMap for a stable output order
    fragments: BTreeMap<String, NucleotideFragment>,
    /// Number of records that contributed at least one base
    num_used: usize,
    /// Number of records that were skipped by flag
    num_filtered: usize
}

impl FragmentCollector {
    pub fn new() -> FragmentCollector {
        Default::default()
    }

    /// Adds the coding bases of one record to the fragment for its read name.
    /// Returns true if the record contributed any bases.
    /// # Arguments
    /// * `gene` - the gene whose region the record was fetched from
    /// * `definition` - the coding layout of that gene
    /// * `record` - the aligned record
    /// # Errors
    /// * if the read name is not UTF-8
    pub fn add_record(&mut self, gene: HlaGene, definition: &HlaGeneDefinition, record: &rust_htslib::bam::Record) -> Result<bool, Box<dyn std::error::Error>> {
        if record.is_unmapped() || record.is_secondary() || record.is_supplementary() ||
            record.is_duplicate() || record.is_quality_check_failed() {
            self.num_filtered += 1;
            return Ok(false);
        }

        let observations = coding_observations(definition, record);
        if observations.is_empty() {
            return Ok(false);
        }

        let qname: String = std::str::from_utf8(record.qname())?.to_string();
        trace!("{qname}: {} coding bases for {gene}", observations.len());
        let fragment = self.fragments.entry(qname.clone())
            .or_insert_with(|| NucleotideFragment::new(qname, Default::default()));
        fragment.add_gene(gene);
        for (locus, observation) in observations.into_iter() {
            fragment.add_observation(locus, observation);
        }
        self.num_used += 1;
        Ok(true)
    }

    pub fn num_used(&self) -> usize {
        self.num_used
    }

    pub fn num_filtered(&self) -> usize {
        self.num_filtered
    }

    /// Consumes the collector, returning fragments sorted by read name
    pub fn into_fragments(self) -> Vec<NucleotideFragment> {
        self.fragments.into_values().collect()
    }
}

/// Extracts the aligned bases of a record that fall in coding exons, converted to coding loci and the coding strand.
/// Inserted and soft-clipped bases have no reference position and are ignored; deleted bases are absent.
/// Ambiguous bases (IUPAC codes other than N) are dropped from the evidence.
/// # Arguments
/// * `definition` - the coding layout of the gene
/// * `record` - the aligned record
pub fn coding_observations(definition: &HlaGeneDefinition, record: &rust_htslib::bam::Record) -> Vec<(usize, BaseObservation)> {
    let read_sequence: Vec<u8> = record.seq().as_bytes();
    let qualities: &[u8] = record.qual();

    let mut ret = vec![];
    for bp in record.aligned_pairs() {
        let segment_index = bp[0] as usize;
        let ref_position = bp[1] as u64;
        if let Some(locus) = definition.coding_index(ref_position) {
            let base = match definition.coding_base(read_sequence[segment_index]) {
                Ok(b) => b,
                Err(e) => {
                    trace!("Dropping base at {ref_position}: {e}");
                    continue;
                }
            };
            let quality = qualities.get(segment_index).cloned().unwrap_or(0);
            ret.push((locus, BaseObservation::new(base, quality)));
        }
    }
    ret
}

/// Loads the coding evidence for HLA-A, -B, and -C from a collection of indexed alignment files.
/// # Arguments
/// * `bam_filenames` - the BAM/CRAM files to read
/// * `reference_filename` - optional reference FASTA, required for CRAM
/// * `gene_config` - the gene layouts to fetch
/// # Errors
/// * `HlaTypingError::InputUnavailable` if a file or its index cannot be opened
/// * if the reference cannot be set or a record cannot be parsed
pub fn load_bam_fragments(bam_filenames: &[PathBuf], reference_filename: Option<&Path>, gene_config: &HlaGeneConfig) -> Result<Vec<NucleotideFragment>, Box<dyn std::error::Error>> {
    // prep all the bam readers
    let mut bam_readers: Vec<rust_htslib::bam::IndexedReader> = vec![];
    for bam_fn in bam_filenames.iter() {
        let mut b = rust_htslib::bam::IndexedReader::from_path(bam_fn)
            .map_err(|e| HlaTypingError::input_unavailable("Alignment file", bam_fn, e))?;
        if let Some(ref_fn) = reference_filename {
            b.set_reference(ref_fn)?;
        }
        bam_readers.push(b);
    }

    let mut collector = FragmentCollector::new();
    for (&gene, definition) in gene_config.genes().iter() {
        let gene_coordinates = definition.coordinates();
        debug!("Fetching {gene} reads from {gene_coordinates}");

        // iterate over each bam, and fetch the reads
        for (bam_index, bam) in bam_readers.iter_mut().enumerate() {
            match bam.fetch(gene_coordinates.fetch_definition()) {
                Ok(()) => {},
                Err(e) => {
                    let filename = &bam_filenames[bam_index];
                    warn!("Received error \"{e}\" while fetching {gene_coordinates} in {filename:?}, assuming no reads for region.");
                    continue;
                }
            };

            for read_entry in bam.records() {
                let mut read = read_entry?;
                read.cache_cigar();
                collector.add_record(gene, definition, &read)?;
            }
        }
    }

    info!("Loaded {} records into fragments, {} records filtered by flag", collector.num_used(), collector.num_filtered());
    Ok(collector.into_fragments())
}

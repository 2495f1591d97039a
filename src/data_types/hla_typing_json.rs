
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cli::typing::TypingSettings;
use crate::hla::alleles::{HlaAllele, HlaGene};
use crate::hla::caller::HlaTypingResult;
use crate::hla::coverage::{HlaAlleleCoverage, HlaComplexCoverage};

/// Number of ranked complexes that are written to the JSON report; the full list is in the debug output
pub const MAX_REPORTED_COMPLEXES: usize = 10;

/// Intended to be serialized to JSON as the final result
#[derive(Debug, Serialize)]
pub struct HlaTypingJson {
    /// Version of the tool that generated the calls
    pbhlatyper_version: String,
    /// The thresholds used for this run
    parameters: TypingParameters,
    /// Number of quality filtered fragments per gene
    gene_fragments: BTreeMap<HlaGene, usize>,
    /// Number of fragments covering at least one heterozygous locus
    informative_fragments: usize,
    /// Candidate alleles per gene
    candidates: BTreeMap<HlaGene, Vec<HlaAllele>>,
    /// Ranked allele group coverage
    group_coverage: Vec<HlaAlleleCoverage>,
    /// Ranked specific protein coverage
    protein_coverage: Vec<HlaAlleleCoverage>,
    /// Groups with enough unique coverage
    confirmed_groups: Vec<HlaAllele>,
    /// Proteins with enough unique coverage
    confirmed_proteins: Vec<HlaAllele>,
    /// Total number of complexes that were scored
    num_complexes: usize,
    /// The best ranked complexes
    complexes: Vec<HlaComplexCoverage>
}

impl HlaTypingJson {
    /// Builds the report from a finished typing run
    /// # Arguments
    /// * `result` - the typing result
    /// * `cli_settings` - the settings used for the run
    pub fn new(result: &HlaTypingResult, cli_settings: &TypingSettings) -> HlaTypingJson {
        let candidates: BTreeMap<HlaGene, Vec<HlaAllele>> = HlaGene::all().into_iter()
            .map(|gene| (gene, result.gene_candidates(gene)))
            .collect();
        HlaTypingJson {
            pbhlatyper_version: crate::cli::core::FULL_VERSION.to_string(),
            parameters: TypingParameters::from(cli_settings),
            gene_fragments: result.gene_fragment_counts().clone(),
            informative_fragments: result.num_informative_fragments(),
            candidates,
            group_coverage: result.group_coverage().to_vec(),
            protein_coverage: result.protein_coverage().to_vec(),
            confirmed_groups: result.confirmed_groups().iter().map(|c| c.allele().clone()).collect(),
            confirmed_proteins: result.confirmed_proteins().iter().map(|c| c.allele().clone()).collect(),
            num_complexes: result.complex_coverage().len(),
            complexes: result.complex_coverage().iter()
                .take(MAX_REPORTED_COMPLEXES)
                .cloned()
                .collect()
        }
    }
}

/// The thresholds of a run, copied out of the CLI settings
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TypingParameters {
    min_base_quality: u8,
    min_evidence: usize,
    min_fragments_per_allele: usize,
    min_fragments_to_remove_single: usize,
    min_confirmed_unique_coverage: usize,
    max_confirmed: usize
}

impl From<&TypingSettings> for TypingParameters {
    fn from(settings: &TypingSettings) -> Self {
        TypingParameters {
            min_base_quality: settings.min_base_quality,
            min_evidence: settings.min_evidence,
            min_fragments_per_allele: settings.min_fragments_per_allele,
            min_fragments_to_remove_single: settings.min_fragments_to_remove_single,
            min_confirmed_unique_coverage: settings.min_confirmed_unique_coverage,
            max_confirmed: settings.max_confirmed
        }
    }
}

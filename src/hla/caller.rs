
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashSet as HashSet;
use std::collections::{BTreeMap, BTreeSet};

use crate::cli::typing::TypingSettings;
use crate::data_types::fragments::NucleotideFragment;
use crate::hla::alleles::{HlaAllele, HlaContext, HlaGene, ALL_NUCLEOTIDE_EXON_BOUNDARIES, PROTEIN_EXON_BOUNDARIES};
use crate::hla::candidates::Candidates;
use crate::hla::complex::HlaComplex;
use crate::hla::coverage::{confirmed_coverage, rank_coverage, HlaAlleleCoverage, HlaAlleleCoverageFactory, HlaComplexCoverage};
use crate::hla::fragment_pipeline::AminoAcidFragmentPipeline;
use crate::hla::panel::ReferencePanel;
use crate::hla::sequence::HlaSequence;
use crate::hla::sequence_count::SequenceCount;

/// Everything computed during a typing run, consumed by the report writers
#[derive(Clone, Debug)]
pub struct HlaTypingResult {
    /// Number of quality filtered fragments per gene
    gene_fragment_counts: BTreeMap<HlaGene, usize>,
    /// Number of fragments after combining the genes
    num_fragments: usize,
    /// Number of fragments covering at least one heterozygous locus
    num_informative_fragments: usize,
    /// Amino acid counts over the combined fragments
    amino_acid_counts: SequenceCount,
    /// Nucleotide counts over the combined fragments
    nucleotide_counts: SequenceCount,
    /// Heterozygous amino acid loci
    amino_acid_heterozygous_loci: BTreeSet<usize>,
    /// Heterozygous nucleotide loci at the exon boundaries
    nucleotide_heterozygous_loci: BTreeSet<usize>,
    /// Amino acid candidates of all genes, sorted by allele
    candidates: Vec<HlaSequence>,
    /// Nucleotide sequences of the candidate proteins, sorted by allele
    nucleotide_candidates: Vec<HlaSequence>,
    /// Ranked allele group coverage
    group_coverage: Vec<HlaAlleleCoverage>,
    /// Ranked specific protein coverage
    protein_coverage: Vec<HlaAlleleCoverage>,
    /// Confirmed groups, best first, at most the configured maximum
    confirmed_groups: Vec<HlaAlleleCoverage>,
    /// Confirmed proteins, best first, at most the configured maximum
    confirmed_proteins: Vec<HlaAlleleCoverage>,
    /// Ranked complex coverage, best first
    complex_coverage: Vec<HlaComplexCoverage>
}

impl HlaTypingResult {
    pub fn gene_fragment_counts(&self) -> &BTreeMap<HlaGene, usize> {
        &self.gene_fragment_counts
    }

    pub fn num_fragments(&self) -> usize {
        self.num_fragments
    }

    pub fn num_informative_fragments(&self) -> usize {
        self.num_informative_fragments
    }

    pub fn amino_acid_counts(&self) -> &SequenceCount {
        &self.amino_acid_counts
    }

    pub fn nucleotide_counts(&self) -> &SequenceCount {
        &self.nucleotide_counts
    }

    pub fn amino_acid_heterozygous_loci(&self) -> &BTreeSet<usize> {
        &self.amino_acid_heterozygous_loci
    }

    pub fn nucleotide_heterozygous_loci(&self) -> &BTreeSet<usize> {
        &self.nucleotide_heterozygous_loci
    }

    pub fn candidates(&self) -> &[HlaSequence] {
        &self.candidates
    }

    pub fn nucleotide_candidates(&self) -> &[HlaSequence] {
        &self.nucleotide_candidates
    }

    /// The candidate alleles of one gene
    pub fn gene_candidates(&self, gene: HlaGene) -> Vec<HlaAllele> {
        self.candidates.iter()
            .filter(|c| c.allele().gene() == gene)
            .map(|c| c.allele().clone())
            .collect()
    }

    pub fn group_coverage(&self) -> &[HlaAlleleCoverage] {
        &self.group_coverage
    }

    pub fn protein_coverage(&self) -> &[HlaAlleleCoverage] {
        &self.protein_coverage
    }

    pub fn confirmed_groups(&self) -> &[HlaAlleleCoverage] {
        &self.confirmed_groups
    }

    pub fn confirmed_proteins(&self) -> &[HlaAlleleCoverage] {
        &self.confirmed_proteins
    }

    pub fn complex_coverage(&self) -> &[HlaComplexCoverage] {
        &self.complex_coverage
    }

    /// The best ranked complex, if any could be built
    pub fn best_complex(&self) -> Option<&HlaComplexCoverage> {
        self.complex_coverage.first()
    }
}

/// Runs HLA typing on a bounded worker pool.
/// # Arguments
/// * `panel` - the reference panel
/// * `raw_fragments` - the unfiltered nucleotide evidence
/// * `cli_settings` - thresholds and the thread count
/// # Errors
/// * if the worker pool cannot be created
pub fn type_hla(panel: &ReferencePanel, raw_fragments: &[NucleotideFragment], cli_settings: &TypingSettings) -> Result<HlaTypingResult, Box<dyn std::error::Error>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cli_settings.threads.max(1))
        .build()?;
    Ok(pool.install(|| type_hla_pooled(panel, raw_fragments, cli_settings)))
}

/// The typing steps, run inside the worker pool
fn type_hla_pooled(panel: &ReferencePanel, raw_fragments: &[NucleotideFragment], cli_settings: &TypingSettings) -> HlaTypingResult {
    info!("Processing {} raw fragments...", raw_fragments.len());
    let pipeline = AminoAcidFragmentPipeline::new(
        cli_settings.min_base_quality, cli_settings.min_evidence,
        &PROTEIN_EXON_BOUNDARIES, raw_fragments
    );
    let gene_fragment_counts: BTreeMap<HlaGene, usize> = HlaGene::all().into_iter()
        .map(|gene| (gene, pipeline.gene_fragments(gene).len()))
        .collect();
    for (gene, count) in gene_fragment_counts.iter() {
        info!("\t{gene}: {count} fragments");
    }

    // each gene is filtered independently
    let candidate_filter = Candidates::new(
        cli_settings.min_fragments_per_allele,
        cli_settings.min_fragments_to_remove_single,
        cli_settings.min_evidence
    );
    let mut candidates: Vec<HlaSequence> = HlaGene::all().into_par_iter()
        .map(|gene| {
            let context = HlaContext::from_defaults(gene);
            candidate_filter.candidates(&context, panel, pipeline.gene_fragments(gene))
        })
        .flatten()
        .collect();
    candidates.sort_by(|a, b| a.allele().cmp(b.allele()));
    info!("Identified {} candidate alleles: {}", candidates.len(), candidates.iter().map(|c| c.allele()).join(", "));

    // evidence across all genes
    let combined = pipeline.combined();
    let amino_acid_counts = SequenceCount::amino_acids(cli_settings.min_evidence, &combined);
    let nucleotide_counts = SequenceCount::nucleotides(cli_settings.min_evidence, &combined);
    let amino_acid_heterozygous_loci = amino_acid_counts.heterozygous_loci();
    let nucleotide_heterozygous_loci: BTreeSet<usize> = nucleotide_counts.heterozygous_loci()
        .intersection(&ALL_NUCLEOTIDE_EXON_BOUNDARIES)
        .cloned()
        .collect();
    debug!("Amino acid evidence up to locus {:?}, heterozygous loci: {amino_acid_heterozygous_loci:?}", amino_acid_counts.max_locus());
    debug!("Heterozygous exon boundary nucleotide loci: {nucleotide_heterozygous_loci:?}");

    let candidate_proteins: HashSet<HlaAllele> = candidates.iter()
        .map(|c| c.allele().specific_protein())
        .collect();
    let mut nucleotide_candidates: Vec<HlaSequence> = panel.all_nucleotide_sequences()
        .filter(|s| candidate_proteins.contains(&s.allele().specific_protein()))
        .cloned()
        .collect();
    nucleotide_candidates.sort_by(|a, b| a.allele().cmp(b.allele()));

    // coverage at the group and protein level
    let factory = HlaAlleleCoverageFactory::new(
        &combined,
        &amino_acid_heterozygous_loci, &candidates,
        &nucleotide_heterozygous_loci, &nucleotide_candidates
    );
    info!("{} of {} fragments cover a heterozygous locus", factory.num_informative_fragments(), combined.len());

    let candidate_alleles: Vec<HlaAllele> = candidates.iter().map(|c| c.allele().clone()).collect();
    let group_coverage = rank_coverage(factory.group_coverage(&candidate_alleles));
    let protein_coverage = rank_coverage(factory.protein_coverage(&candidate_alleles));
    let confirmed_groups: Vec<HlaAlleleCoverage> = confirmed_coverage(&group_coverage, cli_settings.min_confirmed_unique_coverage)
        .into_iter()
        .take(cli_settings.max_confirmed)
        .collect();
    let confirmed_proteins: Vec<HlaAlleleCoverage> = confirmed_coverage(&protein_coverage, cli_settings.min_confirmed_unique_coverage)
        .into_iter()
        .take(cli_settings.max_confirmed)
        .collect();
    info!("Confirmed groups: {}", confirmed_groups.iter().join(", "));
    info!("Confirmed proteins: {}", confirmed_proteins.iter().join(", "));

    // full genotype hypotheses
    let group_alleles: Vec<HlaAllele> = confirmed_groups.iter().map(|c| c.allele().clone()).collect();
    let protein_alleles: Vec<HlaAllele> = confirmed_proteins.iter().map(|c| c.allele().clone()).collect();
    let complexes = HlaComplex::complexes(&group_alleles, &protein_alleles, &candidate_alleles);
    info!("Scoring {} complexes...", complexes.len());
    let complex_coverage = factory.rank_complexes(&complexes);

    let result = HlaTypingResult {
        gene_fragment_counts,
        num_fragments: combined.len(),
        num_informative_fragments: factory.num_informative_fragments(),
        amino_acid_counts,
        nucleotide_counts,
        amino_acid_heterozygous_loci,
        nucleotide_heterozygous_loci,
        candidates,
        nucleotide_candidates,
        group_coverage,
        protein_coverage,
        confirmed_groups,
        confirmed_proteins,
        complex_coverage
    };
    match result.best_complex() {
        Some(best) => info!("Best complex: {} [{},{},{},{}]", best.complex(),
            best.total_coverage(), best.unique_coverage(), best.shared_coverage(), best.wild_coverage()),
        None => warn!("No complexes could be built, no HLA type is reported")
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::str::FromStr;

    // make the settings match the default from clap
    fn get_default_cli_settings() -> TypingSettings {
        TypingSettings {
            min_base_quality: 30,
            min_evidence: 2,
            min_fragments_per_allele: 7,
            min_fragments_to_remove_single: 40,
            min_confirmed_unique_coverage: 10,
            max_confirmed: 6,
            threads: 2,
            ..Default::default()
        }
    }

    fn load_test_panel() -> ReferencePanel {
        ReferencePanel::load(&PathBuf::from("./test_data/panel")).unwrap()
    }

    /// Builds `count` full length fragments for an allele's coding sequence
    fn allele_fragments(label: &str, gene: HlaGene, sequence: &[u8], count: usize) -> Vec<NucleotideFragment> {
        let loci: Vec<usize> = (0..sequence.len()).collect();
        (0..count)
            .map(|i| NucleotideFragment::from_parts(&format!("{label}_{i}"), &[gene], &loci, sequence, &vec![40; sequence.len()]))
            .collect()
    }

    /// Heterozygous sample A*01:01/A*02:01, B*07:02/B*08:01, C*01:02/C*07:01
    fn sample_fragments(count: usize) -> Vec<NucleotideFragment> {
        let mut fragments = vec![];
        fragments.extend(allele_fragments("a1", HlaGene::HlaA, b"ATGGCCGTGATGGCCCCCCGGACCCTCCTG", count));
        fragments.extend(allele_fragments("a2", HlaGene::HlaA, b"ATGGCCGTGATGGCCCCCCGGACCCTCGTG", count));
        fragments.extend(allele_fragments("b7", HlaGene::HlaB, b"ATGCTGGTCATGGCGCCCCGAACCGTCCTC", count));
        fragments.extend(allele_fragments("b8", HlaGene::HlaB, b"ATGCTGGTCATGGCGCCCCGAACCGCCCTC", count));
        fragments.extend(allele_fragments("c1", HlaGene::HlaC, b"ATGCGGGTCATGGCGCCCCGAACCCTCATC", count));
        fragments.extend(allele_fragments("c7", HlaGene::HlaC, b"ATGCGGGTCATGGCGCCCCGAGCCCTCATC", count));
        fragments
    }

    fn allele_strings(alleles: &[HlaAllele]) -> Vec<String> {
        alleles.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_type_heterozygous_sample() {
        let panel = load_test_panel();
        let result = type_hla(&panel, &sample_fragments(25), &get_default_cli_settings()).unwrap();

        assert_eq!(result.num_fragments(), 150);
        assert_eq!(result.gene_fragment_counts().values().cloned().collect::<Vec<usize>>(), vec![50, 50, 50]);

        // A*03:01 is wild at the only heterozygous locus and enough fragments are present to remove it
        assert_eq!(allele_strings(&result.gene_candidates(HlaGene::HlaA)), vec!["A*01:01", "A*02:01"]);
        // B*44:02 disagrees at a homozygous amino acid
        assert_eq!(allele_strings(&result.gene_candidates(HlaGene::HlaB)), vec!["B*07:02", "B*08:01"]);
        assert_eq!(allele_strings(&result.gene_candidates(HlaGene::HlaC)), vec!["C*01:02", "C*07:01"]);

        // the null allele shares the A*01:01 protein and is kept as a nucleotide candidate
        assert_eq!(result.nucleotide_candidates().len(), 7);

        let expected_het: BTreeSet<usize> = [1, 7, 8, 9].into_iter().collect();
        assert_eq!(result.amino_acid_heterozygous_loci(), &expected_het);
        assert!(result.nucleotide_heterozygous_loci().is_empty());
        assert_eq!(result.num_informative_fragments(), 150);

        let confirmed: Vec<String> = result.confirmed_proteins().iter().map(|c| c.to_string()).collect();
        assert_eq!(confirmed, vec![
            "A*01:01[25,25,0,0]", "A*02:01[25,25,0,0]",
            "B*07:02[25,25,0,0]", "B*08:01[25,25,0,0]",
            "C*01:02[25,25,0,0]", "C*07:01[25,25,0,0]"
        ]);
        assert_eq!(result.confirmed_groups().len(), 6);

        // two confirmed proteins per gene leave a single hypothesis
        assert_eq!(result.complex_coverage().len(), 1);
        let best = result.best_complex().unwrap();
        assert_eq!(best.complex().to_string(), "A*01:01,A*02:01,B*07:02,B*08:01,C*01:02,C*07:01");
        assert_eq!(best.report_row(), vec![
            "150", "150", "0", "0",
            "A*01:01", "A*02:01", "B*07:02", "B*08:01", "C*01:02", "C*07:01"
        ]);
    }

    #[test]
    fn test_type_sparse_sample() {
        // with few fragments nothing is confirmed and the sparse floor keeps the wild A*03:01
        let panel = load_test_panel();
        let result = type_hla(&panel, &sample_fragments(5), &get_default_cli_settings()).unwrap();
        assert!(result.gene_candidates(HlaGene::HlaA).contains(&HlaAllele::from_str("A*03:01").unwrap()));
        assert!(result.confirmed_groups().is_empty());
        assert!(result.confirmed_proteins().is_empty());

        // every homozygous and heterozygous combination: A has 3 candidates, B and C have 2
        assert_eq!(result.complex_coverage().len(), 6 * 3 * 3);
        let best = result.best_complex().unwrap();
        assert_eq!(best.total_coverage(), 30);
        assert!(result.complex_coverage().windows(2).all(|w| w[0].cmp_rank(&w[1]).is_lt()));
    }

    #[test]
    fn test_type_no_evidence() {
        let panel = load_test_panel();
        let result = type_hla(&panel, &[], &get_default_cli_settings()).unwrap();
        assert!(result.candidates().is_empty());
        assert!(result.complex_coverage().is_empty());
        assert!(result.best_complex().is_none());
    }

    #[test]
    fn test_low_quality_dropped() {
        let panel = load_test_panel();
        let mut settings = get_default_cli_settings();
        settings.min_base_quality = 50;
        let result = type_hla(&panel, &sample_fragments(25), &settings).unwrap();
        assert_eq!(result.num_fragments(), 0);
        assert!(result.best_complex().is_none());
    }
}

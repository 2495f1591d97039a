use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::BTreeSet;

use crate::data_types::fragments::AminoAcidFragment;
use crate::hla::alleles::{codon_loci, HlaAllele, HlaContext};
use crate::hla::panel::ReferencePanel;
use crate::hla::sequence::HlaSequence;
use crate::hla::sequence_count::SequenceCount;

/// Filters the reference panel of one gene down to the alleles consistent with the evidence
#[derive(Clone, Debug)]
pub struct Candidates {
    /// Candidates with less support than this are pruned
    min_fragments_per_allele: usize,
    /// The last candidate of an allele group is only pruned if the gene has at least this many fragments
    min_fragments_to_remove_single: usize,
    /// Minimum count for an observation to be considered real
    min_evidence: usize
}

impl Candidates {
    pub fn new(min_fragments_per_allele: usize, min_fragments_to_remove_single: usize, min_evidence: usize) -> Candidates {
        Candidates {
            min_fragments_per_allele,
            min_fragments_to_remove_single,
            min_evidence
        }
    }

    /// Returns the amino acid candidates for a gene.
    /// # Arguments
    /// * `context` - the gene and its exon boundaries
    /// * `panel` - the full reference panel
    /// * `fragments` - the amino acid fragments sourced from this gene
    pub fn candidates(&self, context: &HlaContext, panel: &ReferencePanel, fragments: &[AminoAcidFragment]) -> Vec<HlaSequence> {
        let gene = context.gene();
        if fragments.is_empty() {
            warn!("{gene}: no fragments, no candidates can be identified");
            return vec![];
        }

        let panel_sequences = panel.amino_acid_sequences(gene);
        if panel_sequences.is_empty() {
            warn!("{gene}: reference panel has no amino acid sequences");
            return vec![];
        }

        let aa_counts = SequenceCount::amino_acids(self.min_evidence, fragments);
        let aa_candidates = filter_on_amino_acids(
            panel_sequences.to_vec(), &aa_counts, context.all_protein_boundaries()
        );
        info!("{gene}: {} of {} candidates after amino acid filtering", aa_candidates.len(), panel_sequences.len());

        let aa_proteins: HashSet<HlaAllele> = aa_candidates.iter()
            .map(|c| c.allele().specific_protein())
            .collect();
        let nuc_candidates: Vec<HlaSequence> = panel.nucleotide_sequences(gene).iter()
            .filter(|s| aa_proteins.contains(&s.allele().specific_protein()))
            .cloned()
            .collect();
        let nuc_candidates = filter_on_exon_boundaries(
            context.protein_boundaries(), self.min_evidence, nuc_candidates, fragments
        );

        let nuc_proteins: HashSet<HlaAllele> = nuc_candidates.iter()
            .map(|c| c.allele().specific_protein())
            .collect();
        let boundary_candidates: Vec<HlaSequence> = aa_candidates.into_iter()
            .filter(|c| nuc_proteins.contains(&c.allele().specific_protein()))
            .collect();
        info!("{gene}: {} candidates after exon boundary filtering", boundary_candidates.len());

        let heterozygous_loci = aa_counts.heterozygous_loci();
        let pruned = self.prune_low_support(boundary_candidates, fragments, &heterozygous_loci);
        info!("{gene}: {} candidates after minimum fragment filtering", pruned.len());
        pruned
    }

    /// Removes candidates with fewer than `min_fragments_per_allele` supporting fragments.
    /// Low support candidates are visited in ascending (support, allele) order, so the outcome does not
    /// depend on panel order. A candidate is retained if it is the last candidate of the gene, or if it is
    /// the last of its allele group while the gene has fewer than `min_fragments_to_remove_single` fragments.
    /// # Arguments
    /// * `candidates` - the candidates of one gene
    /// * `fragments` - the fragments of the same gene
    /// * `heterozygous_loci` - amino acid heterozygous loci of the gene
    pub fn prune_low_support(&self, candidates: Vec<HlaSequence>, fragments: &[AminoAcidFragment], heterozygous_loci: &BTreeSet<usize>) -> Vec<HlaSequence> {
        let support: Vec<usize> = candidates.par_iter()
            .map(|c| count_support(c, fragments, heterozygous_loci))
            .collect();

        let mut low_support: Vec<usize> = (0..candidates.len())
            .filter(|&i| support[i] < self.min_fragments_per_allele)
            .collect();
        low_support.sort_by(|&a, &b| {
            support[a].cmp(&support[b])
                .then_with(|| candidates[a].allele().cmp(candidates[b].allele()))
        });

        let mut retained: Vec<bool> = vec![true; candidates.len()];
        let sparse_evidence = fragments.len() < self.min_fragments_to_remove_single;
        for index in low_support.into_iter() {
            let num_remaining = retained.iter().filter(|&&r| r).count();
            if num_remaining <= 1 {
                debug!("Retaining {} with {} fragments, last candidate", candidates[index].allele(), support[index]);
                continue;
            }

            let group = candidates[index].allele().allele_group();
            let num_group_remaining = candidates.iter().zip(retained.iter())
                .filter(|(c, &r)| r && c.allele().allele_group() == group)
                .count();
            if num_group_remaining <= 1 && sparse_evidence {
                debug!("Retaining {} with {} fragments, last of its group", candidates[index].allele(), support[index]);
                continue;
            }

            debug!("Removing {} with {} fragments", candidates[index].allele(), support[index]);
            retained[index] = false;
        }

        candidates.into_iter().zip(retained)
            .filter_map(|(c, r)| if r { Some(c) } else { None })
            .collect()
    }
}

/// Counts the fragments that support a candidate at the heterozygous loci they cover.
/// Without heterozygous loci every fragment with an amino acid supports every candidate.
fn count_support(candidate: &HlaSequence, fragments: &[AminoAcidFragment], heterozygous_loci: &BTreeSet<usize>) -> usize {
    if heterozygous_loci.is_empty() {
        return fragments.iter().filter(|f| f.num_amino_acids() > 0).count();
    }

    fragments.iter()
        .filter(|f| {
            let loci = f.amino_acid_loci_in(heterozygous_loci);
            if loci.is_empty() {
                return false;
            }
            let observed: Vec<u8> = loci.iter()
                .filter_map(|&l| f.amino_acid(l))
                .collect();
            candidate.match_loci(&loci, &observed).is_supporting()
        })
        .count()
}

/// Keeps candidates that agree with the evidence at every amino acid locus away from the exon boundaries.
/// Wildcards in the candidate and loci without qualifying evidence are don't-care.
/// # Arguments
/// * `candidates` - the candidates to filter
/// * `aa_counts` - amino acid counts of the gene's fragments
/// * `boundaries` - protein exon boundaries of all genes, these loci are skipped
pub fn filter_on_amino_acids(candidates: Vec<HlaSequence>, aa_counts: &SequenceCount, boundaries: &BTreeSet<usize>) -> Vec<HlaSequence> {
    let expected: Vec<(usize, Vec<u8>)> = aa_counts.loci()
        .filter(|l| !boundaries.contains(l))
        .map(|l| (l, aa_counts.sequence_at(l)))
        .filter(|(_l, symbols)| !symbols.is_empty())
        .collect();

    candidates.into_iter()
        .filter(|c| {
            expected.iter().all(|(locus, symbols)| {
                match c.symbol_at(*locus) {
                    Some(s) => symbols.contains(&s),
                    None => true
                }
            })
        })
        .collect()
}

/// Applies the exon boundary check for each boundary in turn; the candidate set only shrinks.
/// # Arguments
/// * `boundaries` - protein exon boundaries of the gene
/// * `min_evidence` - minimum count for an observation to be considered real
/// * `candidates` - nucleotide candidates
/// * `fragments` - the gene's fragments
pub fn filter_on_exon_boundaries(boundaries: &BTreeSet<usize>, min_evidence: usize, candidates: Vec<HlaSequence>, fragments: &[AminoAcidFragment]) -> Vec<HlaSequence> {
    boundaries.iter().fold(candidates, |current, &boundary| {
        filter_on_exon_boundary(boundary, min_evidence, current, fragments)
    })
}

/// One boundary step: the first base of the codon alone, then the remaining two bases together
pub fn filter_on_exon_boundary(boundary: usize, min_evidence: usize, candidates: Vec<HlaSequence>, fragments: &[AminoAcidFragment]) -> Vec<HlaSequence> {
    let [first, second, third] = codon_loci(boundary);
    let first_base_candidates = filter_on_nucleotides(&[first], min_evidence, candidates, fragments);
    filter_on_nucleotides(&[second, third], min_evidence, first_base_candidates, fragments)
}

/// Keeps candidates whose bases at `loci` form a combination observed together in at least
/// `min_evidence` fragments. A wildcard in the candidate matches any observed base.
/// When nothing is observed often enough, the candidates are returned unchanged.
fn filter_on_nucleotides(loci: &[usize], min_evidence: usize, candidates: Vec<HlaSequence>, fragments: &[AminoAcidFragment]) -> Vec<HlaSequence> {
    let mut observed: HashMap<Vec<u8>, usize> = Default::default();
    for fragment in fragments.iter() {
        if let Some(bases) = fragment.nucleotide_fragment().nucleotides_at(loci) {
            *observed.entry(bases).or_insert(0) += 1;
        }
    }

    let passing: Vec<Vec<u8>> = observed.into_iter()
        .filter(|(_bases, count)| *count >= min_evidence)
        .map(|(bases, _count)| bases)
        .collect();
    // an unobserved boundary cannot rule anything out
    if passing.is_empty() {
        return candidates;
    }

    candidates.into_iter()
        .filter(|c| {
            let symbols = c.symbols_at(loci);
            passing.iter().any(|bases| {
                symbols.iter().zip(bases.iter())
                    .all(|(s, b)| s.map(|s| s == *b).unwrap_or(true))
            })
        })
        .collect()
}

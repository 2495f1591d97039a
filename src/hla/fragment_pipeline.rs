use log::debug;
use rayon::prelude::*;
use rustc_hash::FxHashSet as HashSet;
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::fragments::{AminoAcidFragment, BaseObservation, NucleotideFragment};
use crate::hla::alleles::HlaGene;
use crate::hla::sequence_count::SequenceCount;

/// Converts raw nucleotide evidence into per-gene amino acid fragments
#[derive(Clone, Debug, Default)]
pub struct AminoAcidFragmentPipeline {
    /// The processed fragments for each gene
    gene_fragments: BTreeMap<HlaGene, Vec<AminoAcidFragment>>
}

impl AminoAcidFragmentPipeline {
    /// Runs the pipeline for every gene in parallel.
    /// # Arguments
    /// * `min_base_quality` - bases below this quality are dropped
    /// * `min_evidence` - minimum count for a base to be trusted when filling exon boundaries
    /// * `protein_boundaries` - the protein exon boundaries of each gene
    /// * `raw_fragments` - the unfiltered read source output
    pub fn new(
        min_base_quality: u8, min_evidence: usize,
        protein_boundaries: &BTreeMap<HlaGene, BTreeSet<usize>>,
        raw_fragments: &[NucleotideFragment]
    ) -> AminoAcidFragmentPipeline {
        let empty_boundaries = BTreeSet::new();
        let gene_fragments: BTreeMap<HlaGene, Vec<AminoAcidFragment>> = HlaGene::all().into_par_iter()
            .map(|gene| {
                let boundaries = protein_boundaries.get(&gene).unwrap_or(&empty_boundaries);
                let filtered: Vec<NucleotideFragment> = raw_fragments.iter()
                    .filter(|f| f.genes().contains(&gene))
                    .map(|f| f.quality_filter(min_base_quality))
                    .filter(|f| !f.is_empty())
                    .collect();
                let enriched = enrich_splice_boundaries(min_base_quality, min_evidence, boundaries, filtered);
                let aa_fragments: Vec<AminoAcidFragment> = enriched.iter()
                    .map(|f| f.to_amino_acid_fragment())
                    .collect();
                debug!("{gene}: {} fragments after quality filtering", aa_fragments.len());
                (gene, aa_fragments)
            })
            .collect();

        AminoAcidFragmentPipeline {
            gene_fragments
        }
    }

    /// The fragments sourced from a gene
    pub fn gene_fragments(&self, gene: HlaGene) -> &[AminoAcidFragment] {
        self.gene_fragments.get(&gene).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn type_a(&self) -> &[AminoAcidFragment] {
        self.gene_fragments(HlaGene::HlaA)
    }

    pub fn type_b(&self) -> &[AminoAcidFragment] {
        self.gene_fragments(HlaGene::HlaB)
    }

    pub fn type_c(&self) -> &[AminoAcidFragment] {
        self.gene_fragments(HlaGene::HlaC)
    }

    /// The union over all genes; a fragment sourced from several genes is kept once, from the first gene
    pub fn combined(&self) -> Vec<AminoAcidFragment> {
        let mut seen: HashSet<&str> = Default::default();
        let mut ret = vec![];
        for fragments in self.gene_fragments.values() {
            for fragment in fragments.iter() {
                if seen.insert(fragment.id()) {
                    ret.push(fragment.clone());
                }
            }
        }
        ret
    }
}

/// Fills homozygous bases into fragments that stop right at an exon boundary codon.
/// For boundary codon `b` starting at nucleotide `s = 3b`:
/// * a homozygous base at `s` is added to fragments with `s+1` and `s+2` but not `s`
/// * homozygous bases at `s+1` and `s+2` are added to fragments with `s` but neither of the others
///
/// Filled bases are given `min_base_quality`.
/// # Arguments
/// * `min_base_quality` - the quality assigned to filled bases
/// * `min_evidence` - minimum count for a base to be considered homozygous
/// * `boundaries` - the protein exon boundaries of the gene
/// * `fragments` - quality filtered fragments of one gene
pub fn enrich_splice_boundaries(
    min_base_quality: u8, min_evidence: usize,
    boundaries: &BTreeSet<usize>, fragments: Vec<NucleotideFragment>
) -> Vec<NucleotideFragment> {
    let counts = SequenceCount::raw_nucleotides(min_evidence, &fragments);
    let homozygous = counts.homozygous_loci();
    let hom_base = |locus: usize| -> Option<u8> {
        if homozygous.contains(&locus) {
            counts.sequence_at(locus).first().cloned()
        } else {
            None
        }
    };

    let mut start_fills: Vec<(usize, u8)> = vec![];
    let mut end_fills: Vec<(usize, u8, u8)> = vec![];
    for &boundary in boundaries.iter() {
        let start = 3 * boundary;
        if let Some(base) = hom_base(start) {
            start_fills.push((start, base));
        }
        if let (Some(b1), Some(b2)) = (hom_base(start + 1), hom_base(start + 2)) {
            end_fills.push((start, b1, b2));
        }
    }

    if start_fills.is_empty() && end_fills.is_empty() {
        return fragments;
    }

    fragments.into_iter()
        .map(|mut fragment| {
            for &(start, base) in start_fills.iter() {
                if !fragment.contains_locus(start) && fragment.contains_all_loci(&[start + 1, start + 2]) {
                    fragment.add_observation(start, BaseObservation::new(base, min_base_quality));
                }
            }
            for &(start, b1, b2) in end_fills.iter() {
                if fragment.contains_locus(start) && !fragment.contains_locus(start + 1) && !fragment.contains_locus(start + 2) {
                    fragment.add_observation(start + 1, BaseObservation::new(b1, min_base_quality));
                    fragment.add_observation(start + 2, BaseObservation::new(b2, min_base_quality));
                }
            }
            fragment
        })
        .collect()
}

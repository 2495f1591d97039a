use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::hla::alleles::{codon_loci, HlaGene};
use crate::util::sequence::translate_codon;

/// A single observed base with its quality
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BaseObservation {
    /// The observed nucleotide, upper case or the gap symbol
    base: u8,
    /// The base quality (phred)
    quality: u8
}

impl BaseObservation {
    pub fn new(base: u8, quality: u8) -> BaseObservation {
        BaseObservation {
            base: base.to_ascii_uppercase(),
            quality
        }
    }

    pub fn base(&self) -> u8 {
        self.base
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

/// Nucleotide evidence from one sequenced fragment (a read or read pair), keyed by coding locus
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NucleotideFragment {
    /// Fragment identifier, usually the read name
    id: String,
    /// The genes this fragment was sourced from
    genes: BTreeSet<HlaGene>,
    /// Locus -> observation; a BTreeMap keeps each locus unique and ordered
    nucleotides: BTreeMap<usize, BaseObservation>
}

impl NucleotideFragment {
    /// Creates an empty fragment
    pub fn new(id: String, genes: BTreeSet<HlaGene>) -> NucleotideFragment {
        NucleotideFragment {
            id,
            genes,
            nucleotides: Default::default()
        }
    }

    /// Creates a fragment from parallel loci/bases/qualities for testing.
    /// # Panics
    /// * if the three slices have different lengths
    #[cfg(test)]
    pub fn from_parts(id: &str, genes: &[HlaGene], loci: &[usize], bases: &[u8], qualities: &[u8]) -> NucleotideFragment {
        assert!(loci.len() == bases.len() && loci.len() == qualities.len());
        let mut fragment = NucleotideFragment::new(id.to_string(), genes.iter().cloned().collect());
        for ((&locus, &base), &quality) in loci.iter().zip(bases.iter()).zip(qualities.iter()) {
            fragment.add_observation(locus, BaseObservation::new(base, quality));
        }
        fragment
    }

    /// Adds an observation; if the locus is already present, the higher quality observation is kept.
    /// On a quality tie the existing observation wins.
    /// # Arguments
    /// * `locus` - the nucleotide locus
    /// * `observation` - the base and quality
    pub fn add_observation(&mut self, locus: usize, observation: BaseObservation) {
        let entry = self.nucleotides.entry(locus).or_insert(observation);
        if observation.quality() > entry.quality() {
            *entry = observation;
        }
    }

    /// Adds the genes of another source, used when mates are merged
    pub fn add_gene(&mut self, gene: HlaGene) {
        self.genes.insert(gene);
    }

    /// Returns a copy with all bases below `min_base_quality` removed
    pub fn quality_filter(&self, min_base_quality: u8) -> NucleotideFragment {
        NucleotideFragment {
            id: self.id.clone(),
            genes: self.genes.clone(),
            nucleotides: self.nucleotides.iter()
                .filter(|(_locus, obs)| obs.quality() >= min_base_quality)
                .map(|(&locus, &obs)| (locus, obs))
                .collect()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn genes(&self) -> &BTreeSet<HlaGene> {
        &self.genes
    }

    pub fn is_empty(&self) -> bool {
        self.nucleotides.is_empty()
    }

    pub fn contains_locus(&self, locus: usize) -> bool {
        self.nucleotides.contains_key(&locus)
    }

    pub fn contains_all_loci(&self, loci: &[usize]) -> bool {
        loci.iter().all(|l| self.nucleotides.contains_key(l))
    }

    /// All loci covered by this fragment, ascending
    pub fn nucleotide_loci(&self) -> impl Iterator<Item = usize> + '_ {
        self.nucleotides.keys().cloned()
    }

    /// The covered loci that are also in `loci`, ascending
    pub fn nucleotide_loci_in(&self, loci: &BTreeSet<usize>) -> Vec<usize> {
        self.nucleotide_loci()
            .filter(|l| loci.contains(l))
            .collect()
    }

    pub fn nucleotide(&self, locus: usize) -> Option<u8> {
        self.nucleotides.get(&locus).map(|obs| obs.base())
    }

    /// Returns the bases at the given loci, or None if any locus is missing
    pub fn nucleotides_at(&self, loci: &[usize]) -> Option<Vec<u8>> {
        loci.iter()
            .map(|l| self.nucleotide(*l))
            .collect()
    }

    /// Iterates over (locus, base)
    pub fn nucleotide_iter(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.nucleotides.iter().map(|(&locus, obs)| (locus, obs.base()))
    }

    /// Iterates over (locus, observation), including the qualities
    pub fn observation_iter(&self) -> impl Iterator<Item = (usize, &BaseObservation)> + '_ {
        self.nucleotides.iter().map(|(&locus, obs)| (locus, obs))
    }

    /// Translates every complete codon into an amino acid fragment.
    /// Codons missing any of their three bases are omitted rather than filled.
    pub fn to_amino_acid_fragment(&self) -> AminoAcidFragment {
        let mut amino_acids: BTreeMap<usize, u8> = Default::default();
        let codon_indices: BTreeSet<usize> = self.nucleotides.keys()
            .map(|l| l / 3)
            .collect();
        for codon_index in codon_indices.into_iter() {
            let loci = codon_loci(codon_index);
            if let Some(bases) = self.nucleotides_at(&loci) {
                if let Some(aa) = translate_codon([bases[0], bases[1], bases[2]]) {
                    amino_acids.insert(codon_index, aa);
                }
            }
        }

        AminoAcidFragment {
            nucleotide_fragment: self.clone(),
            amino_acids
        }
    }
}

/// A nucleotide fragment with its translated codons.
/// Codon locus `i` is backed by nucleotide loci `3i`, `3i+1`, `3i+2` of the inner fragment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AminoAcidFragment {
    /// The underlying nucleotide evidence
    nucleotide_fragment: NucleotideFragment,
    /// Codon locus -> amino acid
    amino_acids: BTreeMap<usize, u8>
}

impl AminoAcidFragment {
    pub fn nucleotide_fragment(&self) -> &NucleotideFragment {
        &self.nucleotide_fragment
    }

    pub fn id(&self) -> &str {
        self.nucleotide_fragment.id()
    }

    pub fn genes(&self) -> &BTreeSet<HlaGene> {
        self.nucleotide_fragment.genes()
    }

    pub fn amino_acid(&self, locus: usize) -> Option<u8> {
        self.amino_acids.get(&locus).cloned()
    }

    /// Covered codon loci, ascending
    pub fn amino_acid_loci(&self) -> impl Iterator<Item = usize> + '_ {
        self.amino_acids.keys().cloned()
    }

    /// The covered codon loci that are also in `loci`, ascending
    pub fn amino_acid_loci_in(&self, loci: &BTreeSet<usize>) -> Vec<usize> {
        self.amino_acid_loci()
            .filter(|l| loci.contains(l))
            .collect()
    }

    /// Iterates over (codon locus, amino acid)
    pub fn amino_acid_iter(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.amino_acids.iter().map(|(&locus, &aa)| (locus, aa))
    }

    pub fn num_amino_acids(&self) -> usize {
        self.amino_acids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_locus_keeps_best() {
        let fragment = NucleotideFragment::from_parts(
            "read", &[HlaGene::HlaA],
            &[5, 5, 6], b"ACG", &[20, 30, 30]
        );
        assert_eq!(fragment.nucleotide(5), Some(b'C'));

        // ties keep the first observation
        let fragment = NucleotideFragment::from_parts(
            "read", &[HlaGene::HlaA],
            &[5, 5], b"AC", &[30, 30]
        );
        assert_eq!(fragment.nucleotide(5), Some(b'A'));
    }

    #[test]
    fn test_quality_filter() {
        let fragment = NucleotideFragment::from_parts(
            "read", &[HlaGene::HlaA],
            &[0, 1, 2], b"ATG", &[30, 10, 30]
        );
        let filtered = fragment.quality_filter(20);
        assert_eq!(filtered.nucleotide_loci().collect::<Vec<usize>>(), vec![0, 2]);
        assert!(fragment.quality_filter(40).is_empty());
    }

    #[test]
    fn test_containment() {
        let fragment = NucleotideFragment::from_parts(
            "read", &[HlaGene::HlaB],
            &[3, 4, 5, 9], b"ATGC", &[30; 4]
        );
        assert!(fragment.contains_all_loci(&[3, 4, 5]));
        assert!(!fragment.contains_all_loci(&[5, 6]));
        assert_eq!(fragment.nucleotides_at(&[4, 9]), Some(b"TC".to_vec()));
        assert_eq!(fragment.nucleotides_at(&[4, 8]), None);

        let subset: BTreeSet<usize> = [4, 8, 9].into_iter().collect();
        assert_eq!(fragment.nucleotide_loci_in(&subset), vec![4, 9]);
    }

    #[test]
    fn test_to_amino_acid_fragment() {
        // codon 0 is complete (ATG), codon 1 is complete (GGA), codon 2 is missing its last base
        let fragment = NucleotideFragment::from_parts(
            "read", &[HlaGene::HlaA],
            &[0, 1, 2, 3, 4, 5, 6, 7], b"ATGGGATG", &[30; 8]
        );
        let aa_fragment = fragment.to_amino_acid_fragment();
        assert_eq!(aa_fragment.amino_acid_loci().collect::<Vec<usize>>(), vec![0, 1]);
        assert_eq!(aa_fragment.amino_acid(0), Some(b'M'));
        assert_eq!(aa_fragment.amino_acid(1), Some(b'G'));
        assert_eq!(aa_fragment.amino_acid(2), None);

        // the nucleotides stay available
        assert!(aa_fragment.nucleotide_fragment().contains_locus(7));
    }

    #[test]
    fn test_partial_codon_start() {
        // starting mid-codon only yields the complete codon
        let fragment = NucleotideFragment::from_parts(
            "read", &[HlaGene::HlaA],
            &[1, 2, 3, 4, 5], b"TGGGA", &[30; 5]
        );
        let aa_fragment = fragment.to_amino_acid_fragment();
        assert_eq!(aa_fragment.amino_acid_loci().collect::<Vec<usize>>(), vec![1]);
    }
}

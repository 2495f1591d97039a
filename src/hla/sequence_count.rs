use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::fragments::{AminoAcidFragment, NucleotideFragment};

/// Per-locus symbol counts
type LocusCounts = BTreeMap<usize, BTreeMap<u8, usize>>;

/// Immutable locus -> symbol -> count table built from a fragment collection
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceCount {
    /// Minimum count for a symbol to be considered real evidence
    min_evidence: usize,
    /// The counts themselves
    counts: LocusCounts
}

impl SequenceCount {
    /// Counts the nucleotides underlying a collection of amino acid fragments
    pub fn nucleotides(min_evidence: usize, fragments: &[AminoAcidFragment]) -> SequenceCount {
        SequenceCount::build(min_evidence, fragments, |f| f.nucleotide_fragment().nucleotide_iter().collect())
    }

    /// Counts the nucleotides of raw nucleotide fragments
    pub fn raw_nucleotides(min_evidence: usize, fragments: &[NucleotideFragment]) -> SequenceCount {
        SequenceCount::build(min_evidence, fragments, |f| f.nucleotide_iter().collect())
    }

    /// Counts the amino acids of a collection of amino acid fragments
    pub fn amino_acids(min_evidence: usize, fragments: &[AminoAcidFragment]) -> SequenceCount {
        SequenceCount::build(min_evidence, fragments, |f| f.amino_acid_iter().collect())
    }

    /// Builds partial tables in parallel and merges them; addition is associative and commutative,
    /// so the result does not depend on how fragments are split across threads.
    /// # Arguments
    /// * `min_evidence` - minimum count for a symbol to be considered real evidence
    /// * `fragments` - the fragments to count
    /// * `observations` - extracts the (locus, symbol) pairs from one fragment
    fn build<T, F>(min_evidence: usize, fragments: &[T], observations: F) -> SequenceCount
    where
        T: Sync,
        F: Fn(&T) -> Vec<(usize, u8)> + Sync + Send
    {
        let counts = fragments.par_iter()
            .fold(LocusCounts::default, |mut acc, fragment| {
                for (locus, symbol) in observations(fragment).into_iter() {
                    *acc.entry(locus).or_default().entry(symbol).or_insert(0) += 1;
                }
                acc
            })
            .reduce(LocusCounts::default, merge_counts);

        SequenceCount {
            min_evidence,
            counts
        }
    }

    pub fn min_evidence(&self) -> usize {
        self.min_evidence
    }

    /// The count of a symbol at a locus
    pub fn count(&self, locus: usize, symbol: u8) -> usize {
        self.counts.get(&locus)
            .and_then(|c| c.get(&symbol))
            .cloned()
            .unwrap_or(0)
    }

    /// Total number of observations at a locus
    pub fn depth(&self, locus: usize) -> usize {
        self.counts.get(&locus)
            .map(|c| c.values().sum())
            .unwrap_or(0)
    }

    /// The highest locus with any observation
    pub fn max_locus(&self) -> Option<usize> {
        self.counts.keys().next_back().cloned()
    }

    /// All loci with any observation, ascending
    pub fn loci(&self) -> impl Iterator<Item = usize> + '_ {
        self.counts.keys().cloned()
    }

    /// Symbols at a locus with count >= min evidence, most frequent first, ties by symbol
    pub fn sequence_at(&self, locus: usize) -> Vec<u8> {
        sorted_symbols(self.counts.get(&locus), self.min_evidence)
    }

    /// Loci where at least two symbols meet the minimum evidence
    pub fn heterozygous_loci(&self) -> BTreeSet<usize> {
        self.loci_with_evidence(|n| n >= 2)
    }

    /// Loci where exactly one symbol meets the minimum evidence
    pub fn homozygous_loci(&self) -> BTreeSet<usize> {
        self.loci_with_evidence(|n| n == 1)
    }

    fn loci_with_evidence<F: Fn(usize) -> bool>(&self, predicate: F) -> BTreeSet<usize> {
        self.counts.iter()
            .filter(|(_locus, symbols)| {
                let num_passing = symbols.values().filter(|&&c| c >= self.min_evidence).count();
                predicate(num_passing)
            })
            .map(|(&locus, _symbols)| locus)
            .collect()
    }

    /// Rows for the vertical diagnostic table: the locus, then each observed symbol and its count,
    /// most frequent first.
    pub fn vertical_rows(&self) -> Vec<Vec<String>> {
        self.counts.iter()
            .map(|(locus, symbols)| {
                let mut row = vec![locus.to_string()];
                for symbol in sorted_symbols(Some(symbols), 1).into_iter() {
                    row.push((symbol as char).to_string());
                    row.push(symbols[&symbol].to_string());
                }
                row
            })
            .collect()
    }
}

/// Merges two partial tables
fn merge_counts(mut a: LocusCounts, b: LocusCounts) -> LocusCounts {
    for (locus, symbols) in b.into_iter() {
        let entry = a.entry(locus).or_default();
        for (symbol, count) in symbols.into_iter() {
            *entry.entry(symbol).or_insert(0) += count;
        }
    }
    a
}

/// Orders the symbols passing a minimum count by count descending, then symbol
fn sorted_symbols(symbols: Option<&BTreeMap<u8, usize>>, min_count: usize) -> Vec<u8> {
    let mut passing: Vec<(u8, usize)> = match symbols {
        Some(s) => s.iter()
            .filter(|(_s, &c)| c >= min_count)
            .map(|(&s, &c)| (s, c))
            .collect(),
        None => return vec![]
    };
    passing.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    passing.into_iter().map(|(s, _c)| s).collect()
}

use rayon::prelude::*;
use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::data_types::fragments::AminoAcidFragment;
use crate::hla::alleles::HlaAllele;
use crate::hla::complex::HlaComplex;
use crate::hla::sequence::{HlaSequence, SequenceMatch};

/// Coverage of a single allele, allele group, or protein
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct HlaAlleleCoverage {
    /// The allele the fragments are counted against
    allele: HlaAllele,
    /// Fragments supporting this allele and no other in the comparison
    unique_coverage: usize,
    /// Fragments supporting this allele and at least one other
    shared_coverage: usize,
    /// Fragments that are consistent with this allele only through wildcards
    wild_coverage: usize
}

impl HlaAlleleCoverage {
    pub fn new(allele: HlaAllele, unique_coverage: usize, shared_coverage: usize, wild_coverage: usize) -> HlaAlleleCoverage {
        HlaAlleleCoverage {
            allele,
            unique_coverage,
            shared_coverage,
            wild_coverage
        }
    }

    pub fn allele(&self) -> &HlaAllele {
        &self.allele
    }

    /// All supporting fragments, unique plus shared
    pub fn total_coverage(&self) -> usize {
        self.unique_coverage + self.shared_coverage
    }

    pub fn unique_coverage(&self) -> usize {
        self.unique_coverage
    }

    pub fn shared_coverage(&self) -> usize {
        self.shared_coverage
    }

    pub fn wild_coverage(&self) -> usize {
        self.wild_coverage
    }

    /// Ranking comparison; `Less` means `self` ranks ahead of `other`.
    /// Total coverage descending, then unique coverage descending, then allele.
    pub fn cmp_rank(&self, other: &HlaAlleleCoverage) -> Ordering {
        other.total_coverage().cmp(&self.total_coverage())
            .then_with(|| other.unique_coverage.cmp(&self.unique_coverage))
            .then_with(|| self.allele.cmp(&other.allele))
    }
}

impl std::fmt::Display for HlaAlleleCoverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{},{},{},{}]", self.allele, self.total_coverage(), self.unique_coverage, self.shared_coverage, self.wild_coverage)
    }
}

/// Sorts coverage into ranking order, best first
pub fn rank_coverage(mut coverage: Vec<HlaAlleleCoverage>) -> Vec<HlaAlleleCoverage> {
    coverage.sort_by(|a, b| a.cmp_rank(b));
    coverage
}

/// Keeps the coverage with at least `min_unique_coverage` unique fragments, in ranking order
pub fn confirmed_coverage(coverage: &[HlaAlleleCoverage], min_unique_coverage: usize) -> Vec<HlaAlleleCoverage> {
    rank_coverage(
        coverage.iter()
            .filter(|c| c.unique_coverage >= min_unique_coverage)
            .cloned()
            .collect()
    )
}

/// Coverage of a whole genotype hypothesis
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HlaComplexCoverage {
    /// The complex that was scored
    complex: HlaComplex,
    /// Fragments supporting exactly one allele of the complex
    unique_coverage: usize,
    /// Fragments supporting two or more alleles of the complex
    shared_coverage: usize,
    /// Fragments supporting no allele but wild for at least one
    wild_coverage: usize,
    /// Per-allele coverage within this complex
    allele_coverage: Vec<HlaAlleleCoverage>
}

impl HlaComplexCoverage {
    pub fn complex(&self) -> &HlaComplex {
        &self.complex
    }

    pub fn total_coverage(&self) -> usize {
        self.unique_coverage + self.shared_coverage
    }

    pub fn unique_coverage(&self) -> usize {
        self.unique_coverage
    }

    pub fn shared_coverage(&self) -> usize {
        self.shared_coverage
    }

    pub fn wild_coverage(&self) -> usize {
        self.wild_coverage
    }

    pub fn allele_coverage(&self) -> &[HlaAlleleCoverage] {
        &self.allele_coverage
    }

    /// Ranking comparison, same order as allele coverage with the allele list as the final key
    pub fn cmp_rank(&self, other: &HlaComplexCoverage) -> Ordering {
        other.total_coverage().cmp(&self.total_coverage())
            .then_with(|| other.unique_coverage.cmp(&self.unique_coverage))
            .then_with(|| self.complex.cmp(&other.complex))
    }

    /// The fixed column layout of the complex report: total, unique, shared, wild, then up to six alleles
    pub fn report_row(&self) -> Vec<String> {
        let mut row = vec![
            self.total_coverage().to_string(),
            self.unique_coverage.to_string(),
            self.shared_coverage.to_string(),
            self.wild_coverage.to_string()
        ];
        row.extend(self.complex.alleles().iter().map(|a| a.to_string()));
        row
    }
}

/// The alleles a single fragment supports and the ones it is only wild for
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FragmentAlleles {
    supporting: BTreeSet<HlaAllele>,
    wild: BTreeSet<HlaAllele>
}

impl FragmentAlleles {
    pub fn supporting(&self) -> &BTreeSet<HlaAllele> {
        &self.supporting
    }

    pub fn wild(&self) -> &BTreeSet<HlaAllele> {
        &self.wild
    }
}

/// Match of one informative fragment against every amino acid candidate
#[derive(Clone, Debug)]
struct FragmentMatches {
    matches: Vec<(HlaAllele, SequenceMatch)>
}

/// Computes coverage of candidates against the evidence.
/// Each fragment is compared once against every candidate, then projected onto the requested granularity.
#[derive(Clone, Debug)]
pub struct HlaAlleleCoverageFactory {
    /// One entry per fragment that covers at least one heterozygous locus
    fragment_matches: Vec<FragmentMatches>
}

impl HlaAlleleCoverageFactory {
    /// Compares every fragment against every candidate.
    /// # Arguments
    /// * `fragments` - the amino acid fragments of all genes
    /// * `aa_heterozygous_loci` - heterozygous amino acid loci
    /// * `aa_candidates` - amino acid candidate sequences
    /// * `nuc_heterozygous_loci` - heterozygous nucleotide loci, typically restricted to exon boundaries
    /// * `nuc_candidates` - nucleotide sequences for the candidate proteins
    pub fn new(
        fragments: &[AminoAcidFragment],
        aa_heterozygous_loci: &BTreeSet<usize>, aa_candidates: &[HlaSequence],
        nuc_heterozygous_loci: &BTreeSet<usize>, nuc_candidates: &[HlaSequence]
    ) -> HlaAlleleCoverageFactory {
        let mut nuc_by_protein: HashMap<HlaAllele, Vec<&HlaSequence>> = Default::default();
        for sequence in nuc_candidates.iter() {
            nuc_by_protein.entry(sequence.allele().specific_protein()).or_default().push(sequence);
        }

        let fragment_matches: Vec<FragmentMatches> = fragments.par_iter()
            .filter_map(|fragment| {
                let aa_loci = fragment.amino_acid_loci_in(aa_heterozygous_loci);
                let nuc_loci = fragment.nucleotide_fragment().nucleotide_loci_in(nuc_heterozygous_loci);
                if aa_loci.is_empty() && nuc_loci.is_empty() {
                    return None;
                }

                let aa_observed: Vec<u8> = aa_loci.iter().filter_map(|&l| fragment.amino_acid(l)).collect();
                let nuc_observed: Vec<u8> = nuc_loci.iter().filter_map(|&l| fragment.nucleotide_fragment().nucleotide(l)).collect();
                let matches = aa_candidates.iter()
                    .map(|candidate| {
                        let aa_match = if aa_loci.is_empty() {
                            None
                        } else {
                            Some(candidate.match_loci(&aa_loci, &aa_observed))
                        };
                        let nuc_match = if nuc_loci.is_empty() {
                            None
                        } else {
                            let best = nuc_by_protein.get(&candidate.allele().specific_protein())
                                .map(|sequences| {
                                    sequences.iter()
                                        .map(|s| s.match_loci(&nuc_loci, &nuc_observed))
                                        .fold(SequenceMatch::NoMatch, SequenceMatch::best)
                                })
                                .unwrap_or(SequenceMatch::Wild);
                            Some(best)
                        };

                        let combined = match (aa_match, nuc_match) {
                            (Some(a), Some(n)) => a.combine(n),
                            (Some(a), None) => a,
                            (None, Some(n)) => n,
                            (None, None) => SequenceMatch::Wild
                        };
                        (candidate.allele().clone(), combined)
                    })
                    .collect();
                Some(FragmentMatches { matches })
            })
            .collect();

        HlaAlleleCoverageFactory {
            fragment_matches
        }
    }

    /// The number of fragments that cover at least one heterozygous locus
    pub fn num_informative_fragments(&self) -> usize {
        self.fragment_matches.len()
    }

    /// Projects every informative fragment onto a target set.
    /// A fragment supports a target if any candidate projecting to it is a full or partial match,
    /// and is wild for a target it does not support if any candidate projecting to it is a wild match.
    pub fn fragment_alleles<F>(&self, targets: &BTreeSet<HlaAllele>, project: F) -> Vec<FragmentAlleles>
    where
        F: Fn(&HlaAllele) -> HlaAllele + Sync
    {
        self.fragment_matches.par_iter()
            .map(|fm| {
                let mut result = FragmentAlleles::default();
                for (allele, m) in fm.matches.iter() {
                    let target = project(allele);
                    if !targets.contains(&target) {
                        continue;
                    }
                    if m.is_supporting() {
                        result.supporting.insert(target);
                    } else if *m == SequenceMatch::Wild {
                        result.wild.insert(target);
                    }
                }
                let supporting = &result.supporting;
                result.wild.retain(|a| !supporting.contains(a));
                result
            })
            .collect()
    }

    /// Coverage for each allele group of the given alleles
    pub fn group_coverage(&self, alleles: &[HlaAllele]) -> Vec<HlaAlleleCoverage> {
        let targets: BTreeSet<HlaAllele> = alleles.iter().map(|a| a.allele_group()).collect();
        self.coverage(&targets, |a| a.allele_group())
    }

    /// Coverage for each specific protein of the given alleles
    pub fn protein_coverage(&self, alleles: &[HlaAllele]) -> Vec<HlaAlleleCoverage> {
        let targets: BTreeSet<HlaAllele> = alleles.iter().map(|a| a.specific_protein()).collect();
        self.coverage(&targets, |a| a.specific_protein())
    }

    /// Coverage of a complex; its alleles are compared only against each other
    pub fn complex_coverage(&self, complex: &HlaComplex) -> HlaComplexCoverage {
        let targets: BTreeSet<HlaAllele> = complex.alleles().iter().map(|a| a.specific_protein()).collect();
        let fragment_alleles = self.fragment_alleles(&targets, |a| a.specific_protein());

        let mut unique_coverage = 0;
        let mut shared_coverage = 0;
        let mut wild_coverage = 0;
        for fa in fragment_alleles.iter() {
            match fa.supporting.len() {
                0 => if !fa.wild.is_empty() { wild_coverage += 1; },
                1 => unique_coverage += 1,
                _ => shared_coverage += 1
            }
        }

        HlaComplexCoverage {
            complex: complex.clone(),
            unique_coverage,
            shared_coverage,
            wild_coverage,
            allele_coverage: rank_coverage(tally(&targets, &fragment_alleles))
        }
    }

    /// Scores every complex in parallel and ranks them, best first
    pub fn rank_complexes(&self, complexes: &[HlaComplex]) -> Vec<HlaComplexCoverage> {
        let mut coverage: Vec<HlaComplexCoverage> = complexes.par_iter()
            .map(|c| self.complex_coverage(c))
            .collect();
        coverage.sort_by(|a, b| a.cmp_rank(b));
        coverage
    }

    fn coverage<F>(&self, targets: &BTreeSet<HlaAllele>, project: F) -> Vec<HlaAlleleCoverage>
    where
        F: Fn(&HlaAllele) -> HlaAllele + Sync
    {
        let fragment_alleles = self.fragment_alleles(targets, project);
        tally(targets, &fragment_alleles)
    }
}

/// Counts unique, shared, and wild fragments for every target
fn tally(targets: &BTreeSet<HlaAllele>, fragment_alleles: &[FragmentAlleles]) -> Vec<HlaAlleleCoverage> {
    let mut counts: HashMap<&HlaAllele, (usize, usize, usize)> = targets.iter()
        .map(|t| (t, (0, 0, 0)))
        .collect();
    for fa in fragment_alleles.iter() {
        let is_unique = fa.supporting.len() == 1;
        for allele in fa.supporting.iter() {
            if let Some(entry) = counts.get_mut(allele) {
                if is_unique { entry.0 += 1; } else { entry.1 += 1; }
            }
        }
        for allele in fa.wild.iter() {
            if let Some(entry) = counts.get_mut(allele) {
                entry.2 += 1;
            }
        }
    }

    targets.iter()
        .map(|t| {
            let (unique, shared, wild) = counts[t];
            HlaAlleleCoverage::new(t.clone(), unique, shared, wild)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::str::FromStr;

    use crate::data_types::fragments::NucleotideFragment;
    use crate::hla::alleles::HlaGene;

    fn allele(s: &str) -> HlaAllele {
        HlaAllele::from_str(s).unwrap()
    }

    fn seq(a: &str, text: &str) -> HlaSequence {
        HlaSequence::from_text(allele(a), text).unwrap()
    }

    fn aa_fragment(id: &str, bases: &[u8]) -> AminoAcidFragment {
        let loci: Vec<usize> = (0..bases.len()).collect();
        NucleotideFragment::from_parts(id, &[HlaGene::HlaA], &loci, bases, &vec![30; bases.len()])
            .to_amino_acid_fragment()
    }

    fn loci(l: &[usize]) -> BTreeSet<usize> {
        l.iter().cloned().collect()
    }

    fn find<'a>(coverage: &'a [HlaAlleleCoverage], a: &str) -> &'a HlaAlleleCoverage {
        coverage.iter().find(|c| c.allele() == &allele(a)).unwrap()
    }

    #[test]
    fn test_unique_coverage() {
        // three fragments matching X at both heterozygous loci, Y differs at both
        let candidates = vec![seq("A*01:01", "MWA"), seq("A*02:01", "MRG")];
        let fragments: Vec<AminoAcidFragment> = (0..3)
            .map(|i| aa_fragment(&format!("f{i}"), b"ATGTGGGCC"))
            .collect();
        let factory = HlaAlleleCoverageFactory::new(&fragments, &loci(&[1, 2]), &candidates, &BTreeSet::new(), &[]);
        let alleles: Vec<HlaAllele> = candidates.iter().map(|c| c.allele().clone()).collect();
        let coverage = factory.protein_coverage(&alleles);

        let x = find(&coverage, "A*01:01");
        assert_eq!((x.total_coverage(), x.unique_coverage(), x.shared_coverage(), x.wild_coverage()), (3, 3, 0, 0));
        let y = find(&coverage, "A*02:01");
        assert_eq!(y.total_coverage(), 0);
    }

    #[test]
    fn test_shared_coverage() {
        // the fragment only covers locus 1 where X and Y agree
        let candidates = vec![seq("A*01:01", "MWA"), seq("A*02:01", "MWG")];
        let fragments = vec![aa_fragment("f", b"ATGTGG")];
        let factory = HlaAlleleCoverageFactory::new(&fragments, &loci(&[1, 2]), &candidates, &BTreeSet::new(), &[]);
        let alleles: Vec<HlaAllele> = candidates.iter().map(|c| c.allele().clone()).collect();
        let coverage = factory.protein_coverage(&alleles);
        for a in ["A*01:01", "A*02:01"] {
            let c = find(&coverage, a);
            assert_eq!((c.unique_coverage(), c.shared_coverage()), (0, 1));
        }
    }

    #[test]
    fn test_coverage_partition() {
        let candidates = vec![seq("A*01:01", "MWA"), seq("A*02:01", "MRG"), seq("A*03:01", "M**")];
        let fragments = vec![
            aa_fragment("x", b"ATGTGGGCC"),
            aa_fragment("y", b"ATGAGGGGC"),
            aa_fragment("mixed", b"ATGTGGGGC"),
            aa_fragment("uninformative", b"ATG")
        ];
        let factory = HlaAlleleCoverageFactory::new(&fragments, &loci(&[1, 2]), &candidates, &BTreeSet::new(), &[]);
        assert_eq!(factory.num_informative_fragments(), 3);

        let alleles: Vec<HlaAllele> = candidates.iter().map(|c| c.allele().clone()).collect();
        let coverage = factory.protein_coverage(&alleles);
        let fragment_alleles = factory.fragment_alleles(&alleles.iter().cloned().collect(), |a| a.specific_protein());
        for c in coverage.iter() {
            let inconsistent = fragment_alleles.iter()
                .filter(|fa| !fa.supporting().contains(c.allele()) && !fa.wild().contains(c.allele()))
                .count();
            assert_eq!(c.total_coverage(), c.unique_coverage() + c.shared_coverage());
            assert_eq!(c.unique_coverage() + c.shared_coverage() + c.wild_coverage() + inconsistent, 3);
        }

        // A*03:01 is wild everywhere, the mixed fragment matches neither X nor Y
        assert_eq!(find(&coverage, "A*03:01").wild_coverage(), 3);
        assert_eq!(find(&coverage, "A*01:01").unique_coverage(), 1);
        assert_eq!(find(&coverage, "A*02:01").unique_coverage(), 1);
    }

    #[test]
    fn test_partial_support() {
        // Z is defined at locus 1 only, so a fragment matching X is partial support for Z
        let candidates = vec![seq("A*01:01", "MWA"), seq("A*04:01", "MW*")];
        let fragments = vec![aa_fragment("x", b"ATGTGGGCC")];
        let factory = HlaAlleleCoverageFactory::new(&fragments, &loci(&[1, 2]), &candidates, &BTreeSet::new(), &[]);
        let alleles: Vec<HlaAllele> = candidates.iter().map(|c| c.allele().clone()).collect();
        let coverage = factory.protein_coverage(&alleles);
        assert_eq!(find(&coverage, "A*04:01").shared_coverage(), 1);
        assert_eq!(find(&coverage, "A*01:01").shared_coverage(), 1);
    }

    #[test]
    fn test_nucleotide_disambiguation() {
        // identical at the amino acid heterozygous locus, different at nucleotide locus 7
        let aa_candidates = vec![seq("A*01:01", "MWK"), seq("A*02:01", "MWR")];
        let nuc_candidates = vec![
            seq("A*01:01:01", "ATGTGGAAA"),
            seq("A*01:01:02", "ATGTGGAAG"),
            seq("A*02:01:01", "ATGTGGAGA")
        ];
        let fragments = vec![aa_fragment("f", b"ATGTGGAA")];
        let factory = HlaAlleleCoverageFactory::new(&fragments, &loci(&[1]), &aa_candidates, &loci(&[7]), &nuc_candidates);
        let alleles: Vec<HlaAllele> = aa_candidates.iter().map(|c| c.allele().clone()).collect();
        let coverage = factory.protein_coverage(&alleles);
        assert_eq!(find(&coverage, "A*01:01").unique_coverage(), 1);
        assert_eq!(find(&coverage, "A*02:01").total_coverage(), 0);
    }

    #[test]
    fn test_group_coverage() {
        let candidates = vec![seq("A*01:01", "MWA"), seq("A*01:02", "MWC"), seq("A*02:01", "MRG")];
        let fragments = vec![aa_fragment("f", b"ATGTGG"), aa_fragment("g", b"ATGAGG")];
        let factory = HlaAlleleCoverageFactory::new(&fragments, &loci(&[1, 2]), &candidates, &BTreeSet::new(), &[]);
        let alleles: Vec<HlaAllele> = candidates.iter().map(|c| c.allele().clone()).collect();

        // both A*01 proteins are supported by "f", which is still unique at the group level
        let groups = factory.group_coverage(&alleles);
        assert_eq!(groups.len(), 2);
        assert_eq!(find(&groups, "A*01").unique_coverage(), 1);
        assert_eq!(find(&groups, "A*02").unique_coverage(), 1);

        let proteins = factory.protein_coverage(&alleles);
        assert_eq!(find(&proteins, "A*01:01").shared_coverage(), 1);
    }

    #[test]
    fn test_ranking_and_confirmed() {
        let coverage = vec![
            HlaAlleleCoverage::new(allele("A*01:01"), 5, 5, 0),
            HlaAlleleCoverage::new(allele("A*02:01"), 12, 0, 0),
            HlaAlleleCoverage::new(allele("A*03:01"), 10, 0, 3),
            HlaAlleleCoverage::new(allele("A*11:01"), 6, 4, 0)
        ];
        let ranked: Vec<String> = rank_coverage(coverage.clone()).iter().map(|c| c.allele().to_string()).collect();
        assert_eq!(ranked, vec!["A*02:01", "A*03:01", "A*11:01", "A*01:01"]);

        let confirmed: Vec<String> = confirmed_coverage(&coverage, 10).iter().map(|c| c.allele().to_string()).collect();
        assert_eq!(confirmed, vec!["A*02:01", "A*03:01"]);
    }

    #[test]
    fn test_complex_coverage() {
        let candidates = vec![seq("A*01:01", "MWA"), seq("A*02:01", "MRG"), seq("A*03:01", "M**")];
        let fragments = vec![
            aa_fragment("x1", b"ATGTGGGCC"),
            aa_fragment("x2", b"ATGTGGGCC"),
            aa_fragment("y", b"ATGAGGGGC"),
            aa_fragment("w", b"ATGTGGGGC")
        ];
        let factory = HlaAlleleCoverageFactory::new(&fragments, &loci(&[1, 2]), &candidates, &BTreeSet::new(), &[]);

        let het = factory.complex_coverage(&HlaComplex::new(vec![allele("A*01:01"), allele("A*02:01")]));
        assert_eq!((het.total_coverage(), het.unique_coverage(), het.shared_coverage(), het.wild_coverage()), (3, 3, 0, 0));
        let unique_sum: usize = het.allele_coverage().iter().map(|c| c.unique_coverage()).sum();
        assert_eq!(unique_sum, het.unique_coverage());

        let wild = factory.complex_coverage(&HlaComplex::new(vec![allele("A*01:01"), allele("A*03:01")]));
        assert_eq!((wild.unique_coverage(), wild.shared_coverage(), wild.wild_coverage()), (2, 0, 2));

        let ranked = factory.rank_complexes(&[
            HlaComplex::new(vec![allele("A*01:01"), allele("A*03:01")]),
            HlaComplex::new(vec![allele("A*01:01"), allele("A*02:01")])
        ]);
        assert_eq!(ranked[0].complex(), &HlaComplex::new(vec![allele("A*01:01"), allele("A*02:01")]));
        assert_eq!(ranked[0].report_row(), vec!["3", "3", "0", "0", "A*01:01", "A*02:01"]);
    }
}

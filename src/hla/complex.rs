use itertools::{iproduct, Itertools};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::hla::alleles::{HlaAllele, HlaGene};

/// Maximum number of confirmed groups or proteins considered per gene
const MAX_CONFIRMED_PER_GENE: usize = 2;

/// A genotype hypothesis: one or two alleles for each gene.
/// A homozygous gene is represented by a single allele.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HlaComplex {
    /// Sorted alleles; gene is the leading sort key so genes appear in A, B, C order
    alleles: Vec<HlaAllele>
}

impl HlaComplex {
    /// Creates a complex, sorting and de-duplicating the alleles
    pub fn new(mut alleles: Vec<HlaAllele>) -> HlaComplex {
        alleles.sort();
        alleles.dedup();
        HlaComplex {
            alleles
        }
    }

    pub fn alleles(&self) -> &[HlaAllele] {
        &self.alleles
    }

    /// Builds every genotype hypothesis from the confirmed groups, confirmed proteins, and candidates.
    /// Per gene, with the top two confirmed of each kind for that gene:
    /// * two confirmed proteins give the single heterozygous pair
    /// * one confirmed protein gives it homozygous, plus paired with every other candidate, restricted
    ///   to the other confirmed group when there is one
    /// * two confirmed groups give every pair across the two groups
    /// * one confirmed group gives each of its members homozygous and paired with any other candidate
    /// * otherwise every homozygous and heterozygous combination of the candidates
    ///
    /// The gene options are then crossed A x B x C. Output is sorted.
    /// # Arguments
    /// * `confirmed_groups` - confirmed allele groups, best first
    /// * `confirmed_proteins` - confirmed specific proteins, best first
    /// * `candidates` - all candidate alleles
    pub fn complexes(confirmed_groups: &[HlaAllele], confirmed_proteins: &[HlaAllele], candidates: &[HlaAllele]) -> Vec<HlaComplex> {
        let mut gene_options: Vec<BTreeSet<Vec<HlaAllele>>> = vec![];
        for gene in HlaGene::all() {
            let options = gene_complexes(gene, confirmed_groups, confirmed_proteins, candidates);
            debug!("{gene}: {} allele combinations", options.len());
            if options.is_empty() {
                warn!("{gene}: no candidates, no complexes can be built");
                return vec![];
            }
            gene_options.push(options);
        }

        iproduct!(gene_options[0].iter(), gene_options[1].iter(), gene_options[2].iter())
            .map(|(a, b, c)| {
                HlaComplex::new(a.iter().chain(b.iter()).chain(c.iter()).cloned().collect())
            })
            .sorted()
            .dedup()
            .collect()
    }
}

impl std::fmt::Display for HlaComplex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.alleles.iter().map(|a| a.to_string()).join(","))
    }
}

/// The one or two allele options for a single gene
fn gene_complexes(gene: HlaGene, confirmed_groups: &[HlaAllele], confirmed_proteins: &[HlaAllele], candidates: &[HlaAllele]) -> BTreeSet<Vec<HlaAllele>> {
    let gene_candidates: BTreeSet<HlaAllele> = candidates.iter()
        .filter(|a| a.gene() == gene)
        .cloned()
        .collect();
    let groups: Vec<HlaAllele> = confirmed_groups.iter()
        .filter(|g| g.gene() == gene)
        .map(|g| g.allele_group())
        .unique()
        .take(MAX_CONFIRMED_PER_GENE)
        .collect();
    let proteins: Vec<HlaAllele> = confirmed_proteins.iter()
        .filter(|p| p.gene() == gene && gene_candidates.contains(*p))
        .cloned()
        .unique()
        .take(MAX_CONFIRMED_PER_GENE)
        .collect();
    let members = |group: &HlaAllele| -> Vec<HlaAllele> {
        gene_candidates.iter()
            .filter(|c| &c.allele_group() == group)
            .cloned()
            .collect()
    };

    let mut options: BTreeSet<Vec<HlaAllele>> = Default::default();
    let mut add_pair = |x: &HlaAllele, y: &HlaAllele| {
        if x == y {
            options.insert(vec![x.clone()]);
        } else {
            let mut pair = vec![x.clone(), y.clone()];
            pair.sort();
            options.insert(pair);
        }
    };

    match (proteins.len(), groups.len()) {
        (2, _) => add_pair(&proteins[0], &proteins[1]),
        (1, _) => {
            let protein = &proteins[0];
            let other_group = groups.iter().find(|g| **g != protein.allele_group());
            let partners: Vec<HlaAllele> = match other_group {
                Some(g) => members(g),
                None => gene_candidates.iter().cloned().collect()
            };
            add_pair(protein, protein);
            for partner in partners.iter() {
                add_pair(protein, partner);
            }
        },
        (0, 2) => {
            let first_members = members(&groups[0]);
            let second_members = members(&groups[1]);
            for (x, y) in iproduct!(first_members.iter(), second_members.iter()) {
                add_pair(x, y);
            }
        },
        (0, 1) => {
            for x in members(&groups[0]).iter() {
                for y in gene_candidates.iter() {
                    add_pair(x, y);
                }
            }
        },
        _ => {
            for (i, x) in gene_candidates.iter().enumerate() {
                for y in gene_candidates.iter().skip(i) {
                    add_pair(x, y);
                }
            }
        }
    }
    options
}

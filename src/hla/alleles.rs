use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use simple_error::{bail, SimpleError};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use strum::IntoEnumIterator;

lazy_static! {
    /// Protein-level (codon index) exon boundaries for each supported gene
    pub static ref PROTEIN_EXON_BOUNDARIES: BTreeMap<HlaGene, BTreeSet<usize>> = {
        let boundaries = [
            (HlaGene::HlaA, vec![24, 114, 206, 298, 337, 348, 364, 365]),
            (HlaGene::HlaB, vec![24, 114, 206, 298, 337, 348, 362]),
            (HlaGene::HlaC, vec![24, 114, 206, 298, 338, 349, 365, 366])
        ];
        boundaries.into_iter()
            .map(|(gene, b)| (gene, b.into_iter().collect()))
            .collect()
    };

    /// The union of all protein exon boundaries across the supported genes
    pub static ref ALL_PROTEIN_EXON_BOUNDARIES: BTreeSet<usize> = {
        PROTEIN_EXON_BOUNDARIES.values()
            .flat_map(|b| b.iter().cloned())
            .collect()
    };

    /// Every nucleotide locus belonging to a boundary codon of any supported gene
    pub static ref ALL_NUCLEOTIDE_EXON_BOUNDARIES: BTreeSet<usize> = {
        ALL_PROTEIN_EXON_BOUNDARIES.iter()
            .flat_map(|&b| codon_loci(b))
            .collect()
    };

    /// Parser for the IMGT star-allele nomenclature, e.g. "A*01:01:01:02N"
    static ref ALLELE_REGEX: Regex = Regex::new(
        r"^(?:HLA-)?([ABC])\*(\d{2,4})(?::(\d{2,4}))?(?::(\d{2,4}))?(?::(\d{2,4}))?([A-Z])?$"
    ).unwrap();
}

/// Returns the three nucleotide loci that make up a codon
/// # Arguments
/// * `codon_index` - the amino acid index
pub fn codon_loci(codon_index: usize) -> [usize; 3] {
    [3 * codon_index, 3 * codon_index + 1, 3 * codon_index + 2]
}

/// The class I genes we can type
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum_macros::Display, strum_macros::EnumIter)]
pub enum HlaGene {
    #[strum(to_string = "HLA-A")]
    #[serde(rename = "HLA-A")]
    HlaA,
    #[strum(to_string = "HLA-B")]
    #[serde(rename = "HLA-B")]
    HlaB,
    #[strum(to_string = "HLA-C")]
    #[serde(rename = "HLA-C")]
    HlaC
}

impl HlaGene {
    /// The single letter used in allele names and resource file names
    pub fn letter(&self) -> char {
        match self {
            HlaGene::HlaA => 'A',
            HlaGene::HlaB => 'B',
            HlaGene::HlaC => 'C'
        }
    }

    /// Inverse of `letter()`
    pub fn from_letter(letter: char) -> Result<HlaGene, SimpleError> {
        match letter {
            'A' => Ok(HlaGene::HlaA),
            'B' => Ok(HlaGene::HlaB),
            'C' => Ok(HlaGene::HlaC),
            _ => bail!("Unsupported HLA gene letter: {}", letter)
        }
    }

    /// The protein exon boundaries for this gene
    pub fn protein_exon_boundaries(&self) -> &'static BTreeSet<usize> {
        // every variant is populated in the table above
        &PROTEIN_EXON_BOUNDARIES[self]
    }

    /// Convenience wrapper over the strum iterator
    pub fn all() -> Vec<HlaGene> {
        HlaGene::iter().collect()
    }
}

impl FromStr for HlaGene {
    type Err = SimpleError;

    /// Accepts either "HLA-A" or "A"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("HLA-").unwrap_or(s);
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => HlaGene::from_letter(letter),
            _ => bail!("Unsupported HLA gene: {}", s)
        }
    }
}

/// A hierarchical HLA allele identifier.
/// Fields are compared numerically, so "A*02:01" and "A*02:101" can never be confused by prefix matching.
/// Field order in the struct drives the derived ordering: gene, group, protein, synonymous, non-coding, suffix.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct HlaAllele {
    /// The gene this allele belongs to
    gene: HlaGene,
    /// First field, the allele group
    group: u32,
    /// Second field, the specific protein
    protein: Option<u32>,
    /// Third field, synonymous changes in the coding region
    synonymous: Option<u32>,
    /// Fourth field, changes outside the coding region
    non_coding: Option<u32>,
    /// Expression suffix, e.g. N for null alleles
    suffix: Option<char>
}

impl HlaAllele {
    /// Constructor for a specific protein, which is the level most of the typing happens at
    pub fn new_protein(gene: HlaGene, group: u32, protein: u32) -> HlaAllele {
        HlaAllele {
            gene,
            group,
            protein: Some(protein),
            synonymous: None,
            non_coding: None,
            suffix: None
        }
    }

    /// Constructor for an allele group
    pub fn new_group(gene: HlaGene, group: u32) -> HlaAllele {
        HlaAllele {
            gene,
            group,
            protein: None,
            synonymous: None,
            non_coding: None,
            suffix: None
        }
    }

    /// Projects this allele down to the allele group, e.g. A*01:02:03 -> A*01
    pub fn allele_group(&self) -> HlaAllele {
        HlaAllele::new_group(self.gene, self.group)
    }

    /// Projects this allele down to the specific protein, e.g. A*01:02:03 -> A*01:02.
    /// Group-level alleles are returned unchanged.
    pub fn specific_protein(&self) -> HlaAllele {
        match self.protein {
            Some(protein) => HlaAllele::new_protein(self.gene, self.group, protein),
            None => self.allele_group()
        }
    }

    pub fn gene(&self) -> HlaGene {
        self.gene
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    pub fn protein(&self) -> Option<u32> {
        self.protein
    }
}

impl FromStr for HlaAllele {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = match ALLELE_REGEX.captures(s.trim()) {
            Some(c) => c,
            None => bail!("Failed to parse HLA allele: \"{}\"", s)
        };

        let letter = captures[1].chars().next().unwrap_or_default();
        let gene = HlaGene::from_letter(letter)?;
        let parse_field = |index: usize| -> Result<Option<u32>, SimpleError> {
            match captures.get(index) {
                Some(m) => match m.as_str().parse::<u32>() {
                    Ok(v) => Ok(Some(v)),
                    Err(e) => bail!("Failed to parse field {} of \"{}\": {}", index, s, e)
                },
                None => Ok(None)
            }
        };

        let group = match parse_field(2)? {
            Some(g) => g,
            None => bail!("Missing allele group in \"{}\"", s)
        };
        Ok(HlaAllele {
            gene,
            group,
            protein: parse_field(3)?,
            synonymous: parse_field(4)?,
            non_coding: parse_field(5)?,
            suffix: captures.get(6).and_then(|m| m.as_str().chars().next())
        })
    }
}

impl TryFrom<String> for HlaAllele {
    type Error = SimpleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HlaAllele::from_str(&value)
    }
}

impl From<HlaAllele> for String {
    fn from(value: HlaAllele) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for HlaAllele {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{:02}", self.gene.letter(), self.group)?;
        for field in [self.protein, self.synonymous, self.non_coding].iter().flatten() {
            write!(f, ":{field:02}")?;
        }
        if let Some(suffix) = self.suffix {
            write!(f, "{suffix}")?;
        }
        Ok(())
    }
}

/// The boundary information needed to select candidates for one gene
#[derive(Clone, Debug)]
pub struct HlaContext {
    /// The gene being typed
    gene: HlaGene,
    /// The protein exon boundaries of this gene
    protein_boundaries: BTreeSet<usize>,
    /// The protein exon boundaries of all genes
    all_protein_boundaries: BTreeSet<usize>
}

impl HlaContext {
    /// Builds the context for a gene from the supplied boundary table
    /// # Arguments
    /// * `gene` - the gene we are typing
    /// * `boundaries` - protein exon boundaries for every gene
    pub fn new(gene: HlaGene, boundaries: &BTreeMap<HlaGene, BTreeSet<usize>>) -> HlaContext {
        let protein_boundaries = boundaries.get(&gene).cloned().unwrap_or_default();
        let all_protein_boundaries = boundaries.values()
            .flat_map(|b| b.iter().cloned())
            .collect();
        HlaContext {
            gene,
            protein_boundaries,
            all_protein_boundaries
        }
    }

    /// Builds the context using the fixed class I boundaries
    pub fn from_defaults(gene: HlaGene) -> HlaContext {
        HlaContext::new(gene, &PROTEIN_EXON_BOUNDARIES)
    }

    pub fn gene(&self) -> HlaGene {
        self.gene
    }

    pub fn protein_boundaries(&self) -> &BTreeSet<usize> {
        &self.protein_boundaries
    }

    pub fn all_protein_boundaries(&self) -> &BTreeSet<usize> {
        &self.all_protein_boundaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allele() {
        let allele = HlaAllele::from_str("A*01:02:03:04N").unwrap();
        assert_eq!(allele.gene(), HlaGene::HlaA);
        assert_eq!(allele.group(), 1);
        assert_eq!(allele.protein(), Some(2));
        assert_eq!(allele.to_string(), "A*01:02:03:04N");

        // the HLA- prefix is tolerated
        let allele = HlaAllele::from_str("HLA-C*07:101").unwrap();
        assert_eq!(allele.gene(), HlaGene::HlaC);
        assert_eq!(allele.to_string(), "C*07:101");
    }

    #[test]
    fn test_bad_alleles() {
        assert!(HlaAllele::from_str("D*01:01").is_err());
        assert!(HlaAllele::from_str("A01:01").is_err());
        assert!(HlaAllele::from_str("A*01:01:01:01:01").is_err());
        assert!(HlaAllele::from_str("").is_err());
    }

    #[test]
    fn test_projections() {
        let allele = HlaAllele::from_str("B*07:02:01").unwrap();
        assert_eq!(allele.allele_group(), HlaAllele::from_str("B*07").unwrap());
        assert_eq!(allele.specific_protein(), HlaAllele::from_str("B*07:02").unwrap());
        assert_eq!(allele.specific_protein().allele_group(), allele.allele_group());
        // group level alleles have no protein to project to
        assert_eq!(allele.allele_group().specific_protein(), allele.allele_group());
    }

    #[test]
    fn test_no_prefix_confusion() {
        // string prefix matching would consider these related
        let a = HlaAllele::from_str("A*02:01").unwrap();
        let b = HlaAllele::from_str("A*02:101").unwrap();
        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(a.allele_group(), b.allele_group());

        let c = HlaAllele::from_str("A*20:01").unwrap();
        assert_ne!(a.allele_group(), c.allele_group());
    }

    #[test]
    fn test_allele_ordering() {
        let mut alleles: Vec<HlaAllele> = ["C*01:02", "A*11:01", "A*02:01", "B*07:02"].iter()
            .map(|s| HlaAllele::from_str(s).unwrap())
            .collect();
        alleles.sort();
        let ordered: Vec<String> = alleles.iter().map(|a| a.to_string()).collect();
        assert_eq!(ordered, vec!["A*02:01", "A*11:01", "B*07:02", "C*01:02"]);
    }

    #[test]
    fn test_allele_serde() {
        let allele = HlaAllele::from_str("A*01:01").unwrap();
        let json = serde_json::to_string(&allele).unwrap();
        assert_eq!(json, "\"A*01:01\"");
        let loaded: HlaAllele = serde_json::from_str(&json).unwrap();
        assert_eq!(allele, loaded);
    }

    #[test]
    fn test_gene_parse() {
        assert_eq!(HlaGene::from_str("HLA-B").unwrap(), HlaGene::HlaB);
        assert_eq!(HlaGene::from_str("C").unwrap(), HlaGene::HlaC);
        assert!(HlaGene::from_str("HLA-DRB1").is_err());
        assert_eq!(HlaGene::HlaA.to_string(), "HLA-A");
        assert_eq!(HlaGene::all(), vec![HlaGene::HlaA, HlaGene::HlaB, HlaGene::HlaC]);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(HlaGene::HlaB.protein_exon_boundaries().len(), 7);
        assert!(ALL_NUCLEOTIDE_EXON_BOUNDARIES.contains(&72));
        assert!(ALL_NUCLEOTIDE_EXON_BOUNDARIES.contains(&74));
        assert!(!ALL_NUCLEOTIDE_EXON_BOUNDARIES.contains(&75));

        let context = HlaContext::from_defaults(HlaGene::HlaC);
        assert!(context.protein_boundaries().contains(&338));
        assert!(!context.protein_boundaries().contains(&337));
        assert!(context.all_protein_boundaries().contains(&337));
    }
}

use log::debug;
use serde::{Deserialize, Serialize};
use simple_error::{bail, SimpleError};
use std::collections::BTreeMap;
use std::path::Path;

use crate::data_types::coordinates::Coordinates;
use crate::hla::alleles::HlaGene;
use crate::util::file_io::load_json;
use crate::util::sequence::complement;

/// Genomic layout of the coding sequence for a single HLA gene
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HlaGeneDefinition {
    /// Coordinates for the full gene; reads are fetched from here
    coordinates: Coordinates,
    /// if True, this gene is on the forward strand; otherwise, reverse-complement
    is_forward_strand: bool,
    /// Coding portions of each exon; these are *always* in forward order, regardless of the gene strand
    coding_exons: Vec<Coordinates>
}

impl HlaGeneDefinition {
    /// Creates a new definition and checks that the coding exons are ordered, non-overlapping, and inside the gene.
    /// # Arguments
    /// * `coordinates` - the gene coordinates, 0-based
    /// * `is_forward_strand` - if True, this is on the reference strand
    /// * `coding_exons` - the coding exon coordinates in forward order
    /// # Errors
    /// * if an exon is on a different chromosome or outside the gene
    /// * if exons are out of order or overlapping
    pub fn new(coordinates: Coordinates, is_forward_strand: bool, coding_exons: Vec<Coordinates>) -> Result<HlaGeneDefinition, SimpleError> {
        let definition = HlaGeneDefinition {
            coordinates,
            is_forward_strand,
            coding_exons
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Checks the internal consistency of the definition
    fn validate(&self) -> Result<(), SimpleError> {
        if self.coordinates.start() > self.coordinates.end() {
            bail!("Gene start is after its end: {} > {}", self.coordinates.start(), self.coordinates.end());
        }
        if self.coding_exons.is_empty() {
            bail!("Gene definition at {} has no coding exons", self.coordinates);
        }

        let mut previous: Option<&Coordinates> = None;
        for exon in self.coding_exons.iter() {
            if exon.start() > exon.end() {
                bail!("Exon start is after its end: {} > {}", exon.start(), exon.end());
            }
            if exon.chrom() != self.coordinates.chrom() {
                bail!("Exon chromosome does not match gene chromosome: {} != {}", exon, self.coordinates);
            }
            if exon.start() < self.coordinates.start() || exon.end() > self.coordinates.end() {
                bail!("Exon {} is outside of the gene coordinates {}", exon, self.coordinates);
            }
            if let Some(prev) = previous {
                if prev.end() > exon.start() {
                    bail!("Exon {} must start after the previous exon {}", exon, prev);
                }
            }
            previous = Some(exon);
        }
        Ok(())
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    pub fn is_forward_strand(&self) -> bool {
        self.is_forward_strand
    }

    pub fn coding_exons(&self) -> &[Coordinates] {
        &self.coding_exons
    }

    /// Total number of coding bases
    pub fn coding_length(&self) -> u64 {
        self.coding_exons.iter().map(|e| e.len()).sum()
    }

    /// Converts a 0-based genomic position into a 0-based coding locus, or None if the position is not coding.
    /// Reverse strand genes are counted from the last coding base.
    pub fn coding_index(&self, position: u64) -> Option<usize> {
        let mut offset = 0;
        for exon in self.coding_exons.iter() {
            if exon.contains(position) {
                let forward_index = offset + (position - exon.start());
                let index = if self.is_forward_strand {
                    forward_index
                } else {
                    self.coding_length() - 1 - forward_index
                };
                return Some(index as usize);
            }
            offset += exon.len();
        }
        None
    }

    /// Converts a base observed on the reference strand into the coding strand
    /// # Errors
    /// * if the base is not one of ACGTN, e.g. an ambiguous IUPAC code
    pub fn coding_base(&self, base: u8) -> Result<u8, SimpleError> {
        let upper = base.to_ascii_uppercase();
        if self.is_forward_strand {
            match upper {
                b'A' | b'C' | b'G' | b'T' | b'N' => Ok(upper),
                _ => bail!("Unexpected character for coding base: {}", base as char)
            }
        } else {
            complement(upper)
        }
    }
}

/// The gene definitions used to turn aligned reads into coding evidence
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HlaGeneConfig {
    /// Version string for the definitions, typically the reference build
    version: String,
    /// The gene lookup
    genes: BTreeMap<HlaGene, HlaGeneDefinition>
}

impl HlaGeneConfig {
    /// Loads a configuration from JSON and verifies every gene is present and consistent.
    /// # Errors
    /// * if the file cannot be read or parsed
    /// * if a gene is missing or has an inconsistent definition
    pub fn load(filename: &Path) -> Result<HlaGeneConfig, Box<dyn std::error::Error>> {
        let config: HlaGeneConfig = load_json(filename)?;
        for gene in HlaGene::all() {
            match config.genes.get(&gene) {
                Some(definition) => {
                    definition.validate()?;
                    debug!("{gene}: {} with {} coding exons, {} coding bases", definition.coordinates(), definition.coding_exons().len(), definition.coding_length());
                },
                None => bail!("Gene configuration is missing a definition for {}", gene)
            }
        }
        Ok(config)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn gene(&self, gene: HlaGene) -> Option<&HlaGeneDefinition> {
        self.genes.get(&gene)
    }

    pub fn genes(&self) -> &BTreeMap<HlaGene, HlaGeneDefinition> {
        &self.genes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn coords(start: u64, end: u64) -> Coordinates {
        Coordinates::new("chr6".to_string(), start, end)
    }

    #[test]
    fn test_forward_coding_index() {
        let definition = HlaGeneDefinition::new(coords(100, 200), true, vec![coords(110, 120), coords(150, 155)]).unwrap();
        assert_eq!(definition.coding_length(), 15);
        assert_eq!(definition.coding_index(109), None);
        assert_eq!(definition.coding_index(110), Some(0));
        assert_eq!(definition.coding_index(119), Some(9));
        assert_eq!(definition.coding_index(120), None);
        assert_eq!(definition.coding_index(150), Some(10));
        assert_eq!(definition.coding_index(154), Some(14));
        assert_eq!(definition.coding_base(b'a').unwrap(), b'A');
        assert!(definition.coding_base(b'R').is_err());
    }

    #[test]
    fn test_reverse_coding_index() {
        let definition = HlaGeneDefinition::new(coords(100, 200), false, vec![coords(110, 120), coords(150, 155)]).unwrap();
        assert_eq!(definition.coding_index(154), Some(0));
        assert_eq!(definition.coding_index(150), Some(4));
        assert_eq!(definition.coding_index(119), Some(5));
        assert_eq!(definition.coding_index(110), Some(14));
        assert_eq!(definition.coding_base(b'A').unwrap(), b'T');
        assert_eq!(definition.coding_base(b'g').unwrap(), b'C');
        assert!(definition.coding_base(b'Y').is_err());
    }

    #[test]
    fn test_bad_definitions() {
        // overlapping
        assert!(HlaGeneDefinition::new(coords(100, 200), true, vec![coords(110, 120), coords(115, 130)]).is_err());
        // outside the gene
        assert!(HlaGeneDefinition::new(coords(100, 200), true, vec![coords(190, 210)]).is_err());
        // wrong chromosome
        assert!(HlaGeneDefinition::new(coords(100, 200), true, vec![Coordinates::new("chr1".to_string(), 110, 120)]).is_err());
        // nothing coding
        assert!(HlaGeneDefinition::new(coords(100, 200), true, vec![]).is_err());
    }

    #[test]
    fn test_load_config() {
        let config = HlaGeneConfig::load(&PathBuf::from("./test_data/gene_config.json")).unwrap();
        assert_eq!(config.version(), "synthetic");
        let b_def = config.gene(HlaGene::HlaB).unwrap();
        assert!(!b_def.is_forward_strand());
        assert_eq!(b_def.coding_length(), 30);
        assert_eq!(config.genes().len(), 3);
    }

    #[test]
    fn test_load_inverted_coordinates() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let filename = tmp_dir.path().join("config.json");
        let template = r#"{"version": "inverted", "genes": {
            "HLA-A": {"coordinates": GENE_A, "is_forward_strand": true, "coding_exons": [EXON_A]},
            "HLA-B": {"coordinates": {"chrom": "chr6", "start": 2000, "end": 2100}, "is_forward_strand": false, "coding_exons": [{"chrom": "chr6", "start": 2010, "end": 2020}]},
            "HLA-C": {"coordinates": {"chrom": "chr6", "start": 3000, "end": 3100}, "is_forward_strand": true, "coding_exons": [{"chrom": "chr6", "start": 3005, "end": 3035}]}
        }}"#;

        // an exon with start after end
        let text = template
            .replace("GENE_A", r#"{"chrom": "chr6", "start": 1000, "end": 1100}"#)
            .replace("EXON_A", r#"{"chrom": "chr6", "start": 1050, "end": 1020}"#);
        std::fs::write(&filename, text).unwrap();
        assert!(HlaGeneConfig::load(&filename).is_err());

        // a gene with start after end
        let text = template
            .replace("GENE_A", r#"{"chrom": "chr6", "start": 1100, "end": 1000}"#)
            .replace("EXON_A", r#"{"chrom": "chr6", "start": 1050, "end": 1060}"#);
        std::fs::write(&filename, text).unwrap();
        assert!(HlaGeneConfig::load(&filename).is_err());

        // sanity check that the template itself is valid
        let text = template
            .replace("GENE_A", r#"{"chrom": "chr6", "start": 1000, "end": 1100}"#)
            .replace("EXON_A", r#"{"chrom": "chr6", "start": 1050, "end": 1060}"#);
        std::fs::write(&filename, text).unwrap();
        assert!(HlaGeneConfig::load(&filename).is_ok());
    }

    #[test]
    fn test_load_missing_gene() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let filename = tmp_dir.path().join("config.json");
        std::fs::write(&filename, r#"{"version": "partial", "genes": {}}"#).unwrap();
        assert!(HlaGeneConfig::load(&filename).is_err());
    }
}

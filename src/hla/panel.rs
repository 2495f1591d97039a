use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::hla::alleles::{HlaAllele, HlaGene};
use crate::hla::errors::{HlaTypingError, SequenceType};
use crate::hla::sequence::HlaSequence;
use crate::hla::sequence_file::{read_sequence_file, resource_filename, specific_proteins};

/// The reference allele panel, nucleotide and amino acid sequences for every gene.
/// All sequences of one type share the same padded length.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferencePanel {
    /// Nucleotide sequences, every allele of the panel
    nucleotide_sequences: BTreeMap<HlaGene, Vec<HlaSequence>>,
    /// Amino acid sequences, one per specific protein
    amino_acid_sequences: BTreeMap<HlaGene, Vec<HlaSequence>>
}

impl ReferencePanel {
    /// Creates a panel after checking it is structurally sound.
    /// # Arguments
    /// * `nucleotide_sequences` - the nucleotide sequences per gene
    /// * `amino_acid_sequences` - the amino acid sequences per gene
    /// # Errors
    /// * if any gene is missing either sequence type
    /// * if a sequence is filed under the wrong gene
    /// * if the sequences of one type do not all share the same length
    pub fn new(
        nucleotide_sequences: BTreeMap<HlaGene, Vec<HlaSequence>>,
        amino_acid_sequences: BTreeMap<HlaGene, Vec<HlaSequence>>
    ) -> Result<ReferencePanel, HlaTypingError> {
        validate_sequences(&nucleotide_sequences, SequenceType::Nucleotide)?;
        validate_sequences(&amino_acid_sequences, SequenceType::AminoAcid)?;
        Ok(ReferencePanel {
            nucleotide_sequences,
            amino_acid_sequences
        })
    }

    /// Loads the panel from a resource folder containing `{A,B,C}_{nuc,prot}.txt`, optionally gzipped.
    /// Amino acid sequences are reduced to one per specific protein, empty sequences are dropped,
    /// and each sequence type is padded with wildcards to its longest sequence.
    /// # Arguments
    /// * `resource_folder` - the folder with the six panel files
    /// # Errors
    /// * if a file is missing or cannot be parsed
    /// * if the loaded panel fails validation
    pub fn load(resource_folder: &Path) -> Result<ReferencePanel, Box<dyn std::error::Error>> {
        info!("Loading reference panel from {resource_folder:?}...");
        let nucleotide_sequences = load_sequence_type(resource_folder, "nuc", |s| s)?;
        let amino_acid_sequences = load_sequence_type(resource_folder, "prot", |s| specific_proteins(&s))?;
        let panel = ReferencePanel::new(nucleotide_sequences, amino_acid_sequences)?;
        for gene in HlaGene::all() {
            info!("\t{gene}: {} nucleotide sequences, {} amino acid sequences",
                panel.nucleotide_sequences(gene).len(), panel.amino_acid_sequences(gene).len());
        }
        Ok(panel)
    }

    /// The nucleotide sequences for a gene
    pub fn nucleotide_sequences(&self, gene: HlaGene) -> &[HlaSequence] {
        self.nucleotide_sequences.get(&gene).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The amino acid sequences for a gene
    pub fn amino_acid_sequences(&self, gene: HlaGene) -> &[HlaSequence] {
        self.amino_acid_sequences.get(&gene).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All nucleotide sequences in gene order
    pub fn all_nucleotide_sequences(&self) -> impl Iterator<Item = &HlaSequence> {
        self.nucleotide_sequences.values().flat_map(|v| v.iter())
    }

    /// All amino acid sequences in gene order
    pub fn all_amino_acid_sequences(&self) -> impl Iterator<Item = &HlaSequence> {
        self.amino_acid_sequences.values().flat_map(|v| v.iter())
    }

    /// The padded length of each sequence type, (nucleotide, amino acid)
    pub fn sequence_lengths(&self) -> (usize, usize) {
        let nuc = self.all_nucleotide_sequences().next().map(|s| s.len()).unwrap_or(0);
        let aa = self.all_amino_acid_sequences().next().map(|s| s.len()).unwrap_or(0);
        (nuc, aa)
    }

    /// Number of distinct allele groups for a gene in the amino acid panel
    pub fn num_allele_groups(&self, gene: HlaGene) -> usize {
        let groups: BTreeSet<HlaAllele> = self.amino_acid_sequences(gene).iter()
            .map(|s| s.allele().allele_group())
            .collect();
        groups.len()
    }
}

/// Loads one sequence type for all genes and pads it to a common length
fn load_sequence_type<F>(resource_folder: &Path, suffix: &str, transform: F) -> Result<BTreeMap<HlaGene, Vec<HlaSequence>>, Box<dyn std::error::Error>>
where
    F: Fn(Vec<HlaSequence>) -> Vec<HlaSequence>
{
    let mut loaded: Vec<(HlaGene, Vec<HlaSequence>)> = vec![];
    for gene in HlaGene::all() {
        let filename = resource_filename(resource_folder, gene, suffix)?;
        debug!("Reading {filename:?}");
        let sequences: Vec<HlaSequence> = transform(read_sequence_file(&filename)?).into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        loaded.push((gene, sequences));
    }

    // padding is global across genes so every locus index is comparable
    let max_length = loaded.iter()
        .flat_map(|(_g, v)| v.iter().map(|s| s.len()))
        .max()
        .unwrap_or(0);
    let mut ret: BTreeMap<HlaGene, Vec<HlaSequence>> = Default::default();
    for (gene, mut sequences) in loaded.into_iter() {
        for s in sequences.iter_mut() {
            s.pad(max_length);
        }
        ret.insert(gene, sequences);
    }
    Ok(ret)
}

/// Verifies that every gene is present, alleles are filed correctly, and lengths agree
fn validate_sequences(sequences: &BTreeMap<HlaGene, Vec<HlaSequence>>, sequence_type: SequenceType) -> Result<(), HlaTypingError> {
    let mut expected_length: Option<usize> = None;
    for gene in HlaGene::all() {
        let gene_sequences = match sequences.get(&gene) {
            Some(v) if !v.is_empty() => v,
            _ => return Err(HlaTypingError::MissingGene { gene, sequence_type })
        };

        for sequence in gene_sequences.iter() {
            if sequence.allele().gene() != gene {
                return Err(HlaTypingError::WrongGene { gene, sequence_type, allele: sequence.allele().clone() });
            }
            let expected = *expected_length.get_or_insert(sequence.len());
            if sequence.len() != expected {
                return Err(HlaTypingError::SequenceLengthMismatch {
                    gene, sequence_type,
                    allele: sequence.allele().clone(),
                    length: sequence.len(),
                    expected
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::str::FromStr;

    fn seq(allele: &str, text: &str) -> HlaSequence {
        HlaSequence::from_text(HlaAllele::from_str(allele).unwrap(), text).unwrap()
    }

    fn simple_map(a: &str, b: &str, c: &str) -> BTreeMap<HlaGene, Vec<HlaSequence>> {
        [
            (HlaGene::HlaA, vec![seq("A*01:01", a)]),
            (HlaGene::HlaB, vec![seq("B*07:02", b)]),
            (HlaGene::HlaC, vec![seq("C*01:02", c)])
        ].into_iter().collect()
    }

    #[test]
    fn test_load_panel() {
        let panel = ReferencePanel::load(&PathBuf::from("./test_data/panel")).unwrap();
        assert_eq!(panel.nucleotide_sequences(HlaGene::HlaA).len(), 4);
        assert_eq!(panel.amino_acid_sequences(HlaGene::HlaA).len(), 3);
        assert_eq!(panel.amino_acid_sequences(HlaGene::HlaB).len(), 3);
        assert_eq!(panel.amino_acid_sequences(HlaGene::HlaC).len(), 2);
        assert_eq!(panel.sequence_lengths(), (30, 10));
        assert_eq!(panel.num_allele_groups(HlaGene::HlaB), 3);

        let c07 = &panel.amino_acid_sequences(HlaGene::HlaC)[1];
        assert_eq!(c07.allele().to_string(), "C*07:01");
        assert_eq!(c07.to_text(), "MRVMAPRALI");
    }

    #[test]
    fn test_missing_folder() {
        let err = ReferencePanel::load(&PathBuf::from("./test_data/does_not_exist")).unwrap_err();
        assert!(crate::hla::errors::is_input_unavailable(err.as_ref()));
    }

    #[test]
    fn test_missing_gene() {
        let mut nuc = simple_map("ACG", "ACG", "ACG");
        let aa = simple_map("M", "M", "M");
        nuc.remove(&HlaGene::HlaB);
        assert_eq!(
            ReferencePanel::new(nuc, aa).unwrap_err(),
            HlaTypingError::MissingGene { gene: HlaGene::HlaB, sequence_type: SequenceType::Nucleotide }
        );
    }

    #[test]
    fn test_length_mismatch() {
        let nuc = simple_map("ACG", "ACG", "ACG");
        let aa = simple_map("M", "MA", "M");
        let err = ReferencePanel::new(nuc, aa).unwrap_err();
        assert!(matches!(err, HlaTypingError::SequenceLengthMismatch { gene: HlaGene::HlaB, length: 2, expected: 1, .. }));
    }

    #[test]
    fn test_wrong_gene() {
        let mut nuc = simple_map("ACG", "ACG", "ACG");
        let aa = simple_map("M", "M", "M");
        nuc.insert(HlaGene::HlaC, vec![seq("A*02:01", "ACG")]);
        assert!(matches!(ReferencePanel::new(nuc, aa).unwrap_err(), HlaTypingError::WrongGene { .. }));
    }
}

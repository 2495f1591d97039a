use std::path::{Path, PathBuf};

use crate::hla::alleles::{HlaAllele, HlaGene};

/// The two kinds of sequences held by the reference panel
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum SequenceType {
    #[strum(to_string = "nucleotide")]
    Nucleotide,
    #[strum(to_string = "amino acid")]
    AminoAcid
}

/// Errors that make a typing run impossible, these result in a failure state with no report
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum HlaTypingError {
    #[error("no {sequence_type} sequences were loaded for {gene}")]
    MissingGene { gene: HlaGene, sequence_type: SequenceType },
    #[error("{sequence_type} sequence for {allele} has length {length}, expected {expected} for {gene}")]
    SequenceLengthMismatch { gene: HlaGene, sequence_type: SequenceType, allele: HlaAllele, length: usize, expected: usize },
    #[error("{sequence_type} sequence for {allele} was provided under {gene}")]
    WrongGene { gene: HlaGene, sequence_type: SequenceType, allele: HlaAllele },
    #[error("{label} is unavailable at {path:?}: {cause}")]
    InputUnavailable { label: String, path: PathBuf, cause: String }
}

impl HlaTypingError {
    /// Wraps a failure to open one of the run inputs
    pub fn input_unavailable(label: &str, path: &Path, cause: impl std::fmt::Display) -> HlaTypingError {
        HlaTypingError::InputUnavailable {
            label: label.to_string(),
            path: path.to_path_buf(),
            cause: cause.to_string()
        }
    }
}

/// True if the error, or the error it wraps, is an unavailable input
pub fn is_input_unavailable(error: &(dyn std::error::Error + 'static)) -> bool {
    matches!(error.downcast_ref::<HlaTypingError>(), Some(HlaTypingError::InputUnavailable { .. }))
}


/// Contains definitions related to HLA alleles
pub mod alleles;
/// Contains the core typing functionality
pub mod caller;
/// Filters the reference panel down to candidate alleles
pub mod candidates;
/// Genotype hypotheses built from candidate alleles
pub mod complex;
/// Total, unique, shared and wild coverage of alleles and complexes
pub mod coverage;
/// Contains debug out functionality that is targeted to HLA
pub mod debug;
/// Fatal errors for inconsistent panels
pub mod errors;
/// Turns raw nucleotide evidence into per-gene amino acid fragments
pub mod fragment_pipeline;
/// The per-gene reference sequences
pub mod panel;
/// Allele sequences and matching
pub mod sequence;
/// Per-locus symbol count tables
pub mod sequence_count;
/// Reading and writing of the aligned sequence text format
pub mod sequence_file;

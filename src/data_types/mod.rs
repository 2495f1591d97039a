
/// Contains the coordinates functionality
pub mod coordinates;
/// Per-locus evidence fragments at nucleotide and amino acid level
pub mod fragments;
/// Contains gene layout information for the HLA genes; coordinates, strand, coding exons
pub mod gene_definition;
/// The final JSON typing report
pub mod hla_typing_json;


use log::debug;
use std::path::Path;

use crate::hla::alleles::HlaGene;
use crate::hla::caller::HlaTypingResult;
use crate::hla::sequence_file::{write_deflated_file, write_sequence_file};
use crate::util::file_io::save_tsv_rows;

/// Column headers of the complex coverage table
pub const COMPLEX_HEADER: [&str; 10] = [
    "TotalCoverage", "UniqueCoverage", "SharedCoverage", "WildCoverage",
    "Allele1", "Allele2", "Allele3", "Allele4", "Allele5", "Allele6"
];

/// Writes the diagnostic outputs of a typing run into a folder:
/// * `aminoacids.count.txt` and `nucleotides.count.txt` - vertical count tables
/// * `candidates.inflate.txt` and `candidates.deflate.txt` - the amino acid candidates
/// * `complexes.txt` - every scored complex in ranked order
/// # Arguments
/// * `result` - the typing result
/// * `debug_folder` - an existing folder to write into
/// # Errors
/// * if any file cannot be written
pub fn write_debug_files(result: &HlaTypingResult, debug_folder: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let aa_count_fn = debug_folder.join("aminoacids.count.txt");
    debug!("Saving amino acid counts to {aa_count_fn:?}");
    save_tsv_rows(None, &result.amino_acid_counts().vertical_rows(), &aa_count_fn)?;

    let nuc_count_fn = debug_folder.join("nucleotides.count.txt");
    debug!("Saving nucleotide counts to {nuc_count_fn:?}");
    save_tsv_rows(None, &result.nucleotide_counts().vertical_rows(), &nuc_count_fn)?;

    let inflate_fn = debug_folder.join("candidates.inflate.txt");
    debug!("Saving candidate sequences to {inflate_fn:?}");
    write_sequence_file(result.candidates(), &inflate_fn)?;

    let deflate_fn = debug_folder.join("candidates.deflate.txt");
    debug!("Saving deflated candidate sequences to {deflate_fn:?}");
    let boundaries: Vec<(HlaGene, _)> = HlaGene::all().into_iter()
        .map(|gene| (gene, gene.protein_exon_boundaries()))
        .collect();
    write_deflated_file(&boundaries, result.candidates(), &deflate_fn)?;

    let complex_fn = debug_folder.join("complexes.txt");
    debug!("Saving complex coverage to {complex_fn:?}");
    let rows: Vec<Vec<String>> = result.complex_coverage().iter()
        .map(|c| c.report_row())
        .collect();
    save_tsv_rows(Some(&COMPLEX_HEADER[..]), &rows, &complex_fn)?;

    Ok(())
}

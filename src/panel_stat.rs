
use crate::hla::alleles::HlaGene;
use crate::hla::panel::ReferencePanel;

/// Prints the statistics for a given reference panel
/// # Arguments
/// * `panel` - the panel to print the statistics for
pub fn print_stats(panel: &ReferencePanel) {
    let (nuc_length, aa_length) = panel.sequence_lengths();
    println!("Reference panel statistics:");
    println!("\tVersion: {}", crate::cli::core::FULL_VERSION.as_str());
    println!("\tNucleotide sequence length: {nuc_length}");
    println!("\tAmino acid sequence length: {aa_length}");
    println!("\tTotal nucleotide alleles: {}", panel.all_nucleotide_sequences().count());
    println!("\tTotal amino acid alleles: {}", panel.all_amino_acid_sequences().count());

    println!("Panel gene statistics:");
    println!("gene\tallele_groups\tproteins\tnucleotide_alleles\tprotein_exon_boundaries");
    for gene in HlaGene::all() {
        let boundaries: Vec<String> = gene.protein_exon_boundaries().iter()
            .map(|b| b.to_string())
            .collect();
        println!("{gene}\t{}\t{}\t{}\t{}",
            panel.num_allele_groups(gene),
            panel.amino_acid_sequences(gene).len(),
            panel.nucleotide_sequences(gene).len(),
            boundaries.join(",")
        );
    }

    // per-allele listing is only for elevated verbosity
    if log::log_enabled!(log::Level::Debug) {
        println!();
        println!("Amino acid alleles:");
        for sequence in panel.all_amino_acid_sequences() {
            let wild = sequence.sequence().iter().filter(|s| s.is_none()).count();
            println!("{}\t{}\t{wild}", sequence.allele(), sequence.len());
        }
        println!();
    }
}

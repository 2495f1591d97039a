
use clap::Args;
use log::{debug, info, warn};
use simple_error::bail;
use std::path::PathBuf;

use crate::cli::core::{AFTER_HELP, check_optional_filename, check_required_filename};

#[derive(Args, Clone, Default)]
#[clap(author, about,
    after_help = &**AFTER_HELP)]
pub struct TypingSettings {
    /// Folder containing the reference panel files, e.g. A_nuc.txt and A_prot.txt
    #[clap(required = true)]
    #[clap(short = 'd')]
    #[clap(long = "resources")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub resource_folder: PathBuf,

    /// Input evidence table (TSV) with columns fragment_id, gene, locus, base, quality
    #[clap(short = 'e')]
    #[clap(long = "evidence")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub evidence_filename: Option<PathBuf>,

    /// Input alignment file in BAM format, can be specified multiple times
    #[clap(short = 'b')]
    #[clap(long = "bam")]
    #[clap(value_name = "BAM")]
    #[clap(help_heading = Some("Input/Output"))]
    pub bam_filenames: Vec<PathBuf>,

    /// HLA gene layout (JSON); required with --bam
    #[clap(short = 'g')]
    #[clap(long = "gene-config")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub gene_config: Option<PathBuf>,

    /// Reference FASTA file; required for CRAM input
    #[clap(short = 'r')]
    #[clap(long = "reference")]
    #[clap(value_name = "FASTA")]
    #[clap(help_heading = Some("Input/Output"))]
    pub reference_filename: Option<PathBuf>,

    /// Output HLA typing file (JSON)
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-calls")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Optional output debug folder
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// Bases with a lower quality are ignored
    #[clap(long = "min-base-quality")]
    #[clap(value_name = "QUAL")]
    #[clap(default_value = "30")]
    #[clap(help_heading = Some("Evidence"))]
    pub min_base_quality: u8,

    /// Minimum number of fragments for an observed base or amino acid to count as evidence
    #[clap(long = "min-evidence")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "2")]
    #[clap(help_heading = Some("Evidence"))]
    pub min_evidence: usize,

    /// Candidates with fewer supporting fragments are removed
    #[clap(long = "min-fragments-per-allele")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "7")]
    #[clap(help_heading = Some("Candidates"))]
    pub min_fragments_per_allele: usize,

    /// The last candidate of an allele group is only removed if its gene has at least this many fragments
    #[clap(long = "min-fragments-to-remove-single")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "40")]
    #[clap(help_heading = Some("Candidates"))]
    pub min_fragments_to_remove_single: usize,

    /// Minimum unique coverage for a group or protein to be confirmed
    #[clap(long = "min-confirmed-unique-coverage")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "10")]
    #[clap(help_heading = Some("Coverage"))]
    pub min_confirmed_unique_coverage: usize,

    /// Maximum number of confirmed groups and proteins used to build complexes
    #[clap(long = "max-confirmed")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "6")]
    #[clap(help_heading = Some("Coverage"))]
    pub max_confirmed: usize,

    /// Number of threads to use for typing.
    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_typing_settings(mut settings: TypingSettings) -> Result<TypingSettings, Box<dyn std::error::Error>> {
    info!("Inputs:");

    // check for all the required input files
    check_required_filename(&settings.resource_folder, "Resource folder");
    check_optional_filename(settings.evidence_filename.as_deref(), "Evidence table");
    check_optional_filename(settings.gene_config.as_deref(), "Gene configuration");
    check_optional_filename(settings.reference_filename.as_deref(), "Reference FASTA");
    for bam_fn in settings.bam_filenames.iter() {
        check_required_filename(bam_fn, "Alignment file");
    }

    // dump stuff to the logger
    info!("\tResources: {:?}", settings.resource_folder);
    match (settings.evidence_filename.as_ref(), settings.bam_filenames.is_empty()) {
        (Some(_), false) => bail!("Only one of --evidence and --bam can be specified."),
        (None, true) => bail!("Must provide an evidence table or an aligned BAM file to perform typing."),
        (Some(evidence_fn), true) => {
            info!("\tEvidence: {:?}", evidence_fn);
            if settings.gene_config.is_some() {
                warn!("\tGene configuration is only used with --bam, ignoring it");
            }
        },
        (None, false) => {
            for bam_fn in settings.bam_filenames.iter() {
                info!("\tBAM: {:?}", bam_fn);
            }
            match settings.gene_config.as_ref() {
                Some(gc) => info!("\tGene configuration: {:?}", gc),
                None => bail!("--gene-config is required when --bam is provided.")
            };
            if let Some(ref_fn) = settings.reference_filename.as_ref() {
                info!("\tReference: {:?}", ref_fn);
            }
        }
    };

    // outputs
    info!("Outputs:");
    info!("\tHLA calls: {:?}", settings.output_filename);
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    info!("Evidence settings:");
    info!("\tMinimum base quality: {}", settings.min_base_quality);
    if settings.min_evidence == 0 {
        bail!("--min-evidence must be at least 1");
    }
    info!("\tMinimum evidence: {}", settings.min_evidence);

    info!("Candidate settings:");
    info!("\tMinimum fragments per allele: {}", settings.min_fragments_per_allele);
    info!("\tMinimum fragments to remove single: {}", settings.min_fragments_to_remove_single);

    info!("Coverage settings:");
    info!("\tMinimum confirmed unique coverage: {}", settings.min_confirmed_unique_coverage);
    if settings.max_confirmed == 0 {
        bail!("--max-confirmed must be at least 1");
    }
    info!("\tMaximum confirmed: {}", settings.max_confirmed);

    if settings.threads == 0 {
        settings.threads = 1;
    }
    debug!("Threads: {}", settings.threads);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> TypingSettings {
        TypingSettings {
            resource_folder: PathBuf::from("./test_data/panel"),
            output_filename: PathBuf::from("out.json"),
            min_evidence: 2,
            max_confirmed: 6,
            ..Default::default()
        }
    }

    #[test]
    fn test_evidence_input() {
        let mut settings = base_settings();
        settings.evidence_filename = Some(PathBuf::from("./test_data/evidence/small_evidence.tsv"));
        let checked = check_typing_settings(settings).unwrap();
        // zero threads is bumped to one
        assert_eq!(checked.threads, 1);
    }

    #[test]
    fn test_input_conflicts() {
        // nothing provided
        assert!(check_typing_settings(base_settings()).is_err());

        // bam without a gene config
        let mut settings = base_settings();
        settings.bam_filenames = vec![PathBuf::from("./test_data/gene_config.json")];
        assert!(check_typing_settings(settings.clone()).is_err());

        // both inputs
        settings.gene_config = Some(PathBuf::from("./test_data/gene_config.json"));
        settings.evidence_filename = Some(PathBuf::from("./test_data/evidence/small_evidence.tsv"));
        assert!(check_typing_settings(settings).is_err());
    }

    #[test]
    fn test_bad_thresholds() {
        let mut settings = base_settings();
        settings.evidence_filename = Some(PathBuf::from("./test_data/evidence/small_evidence.tsv"));
        settings.min_evidence = 0;
        assert!(check_typing_settings(settings.clone()).is_err());
        settings.min_evidence = 2;
        settings.max_confirmed = 0;
        assert!(check_typing_settings(settings).is_err());
    }
}

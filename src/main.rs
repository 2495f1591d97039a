
use log::{LevelFilter, error, info};

use pbhlatyper::cli::core::{Commands, get_cli};
use pbhlatyper::cli::panel_stat::{PanelStatSettings, check_panel_stat_settings};
use pbhlatyper::cli::typing::{TypingSettings, check_typing_settings};
use pbhlatyper::data_types::fragments::NucleotideFragment;
use pbhlatyper::data_types::gene_definition::HlaGeneConfig;
use pbhlatyper::data_types::hla_typing_json::HlaTypingJson;
use pbhlatyper::evidence::bam_reader::load_bam_fragments;
use pbhlatyper::evidence::evidence_table::{load_evidence_table, save_evidence_table};
use pbhlatyper::hla::caller::HlaTypingResult;
use pbhlatyper::hla::errors::is_input_unavailable;
use pbhlatyper::hla::panel::ReferencePanel;
use pbhlatyper::util::file_io::save_json;

/// Sets up the logger at the requested verbosity
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };

    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

/// Exit code for a failed load; inputs that cannot be opened are NOINPUT, everything else is IOERR
fn load_exit_code(error: &(dyn std::error::Error + 'static)) -> exitcode::ExitCode {
    if is_input_unavailable(error) {
        exitcode::NOINPUT
    } else {
        exitcode::IOERR
    }
}

/// Loads the reference panel or exits
fn load_panel(settings_folder: &std::path::Path) -> ReferencePanel {
    info!("Loading reference panel from {settings_folder:?}...");
    match ReferencePanel::load(settings_folder) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while loading reference panel: {e}");
            std::process::exit(load_exit_code(e.as_ref()));
        }
    }
}

/// This will run the "type" mode of the tool
/// # Arguments
/// * `settings` - the TypingSettings object
fn run_type(settings: TypingSettings) {
    // immediately setup logging first
    init_logging(settings.verbosity);

    // okay, now we can check all the other settings
    let cli_settings: TypingSettings = match check_typing_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while processing CLI settings: {e}");
            std::process::exit(exitcode::USAGE);
        }
    };

    // create a debug folder if specified
    if let Some(debug_folder) = cli_settings.debug_folder.as_ref() {
        info!("Creating debug folder at {debug_folder:?}...");
        match std::fs::create_dir_all(debug_folder) {
            Ok(()) => {},
            Err(e) => {
                error!("Error while creating debug folder: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }
    }

    let panel: ReferencePanel = load_panel(&cli_settings.resource_folder);

    // now collect the evidence from whichever source was provided
    let fragments: Vec<NucleotideFragment> = if let Some(evidence_fn) = cli_settings.evidence_filename.as_ref() {
        info!("Loading evidence table from {evidence_fn:?}...");
        match load_evidence_table(evidence_fn) {
            Ok(f) => f,
            Err(e) => {
                error!("Error while loading evidence table: {e}");
                std::process::exit(load_exit_code(e.as_ref()));
            }
        }
    } else {
        // settings checks guarantee the gene config is present with BAM input
        let gene_config: HlaGeneConfig = match cli_settings.gene_config.as_deref().map(HlaGeneConfig::load) {
            Some(Ok(gc)) => gc,
            Some(Err(e)) => {
                error!("Error while loading gene configuration: {e}");
                std::process::exit(exitcode::IOERR);
            },
            None => {
                error!("A gene configuration is required with BAM input");
                std::process::exit(exitcode::USAGE);
            }
        };
        info!("Loaded gene configuration version {:?}", gene_config.version());

        let fragments = match load_bam_fragments(&cli_settings.bam_filenames, cli_settings.reference_filename.as_deref(), &gene_config) {
            Ok(f) => f,
            Err(e) => {
                error!("Error while loading alignment files: {e}");
                std::process::exit(load_exit_code(e.as_ref()));
            }
        };

        if let Some(debug_folder) = cli_settings.debug_folder.as_ref() {
            let evidence_fn = debug_folder.join("evidence.tsv.gz");
            info!("Saving extracted evidence to {evidence_fn:?}");
            if let Err(e) = save_evidence_table(&fragments, &evidence_fn) {
                error!("Error while writing evidence table: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }
        fragments
    };
    info!("Loaded {} fragments.", fragments.len());

    // all the work
    let result: HlaTypingResult = match pbhlatyper::hla::caller::type_hla(&panel, &fragments, &cli_settings) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while typing HLA genes: {e}");
            std::process::exit(exitcode::DATAERR);
        }
    };

    info!("Saving HLA calls to {:?}", cli_settings.output_filename);
    let report = HlaTypingJson::new(&result, &cli_settings);
    match save_json(&report, &cli_settings.output_filename) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while writing HLA calls to file: {e}");
            std::process::exit(exitcode::IOERR);
        }
    };

    if let Some(debug_folder) = cli_settings.debug_folder.as_ref() {
        info!("Saving debug files to {debug_folder:?}");
        if let Err(e) = pbhlatyper::hla::debug::write_debug_files(&result, debug_folder) {
            error!("Error while writing debug files: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }
}

/// This will run the "panel_stat" mode of the tool
/// # Arguments
/// * `settings` - the PanelStatSettings object
fn run_panel_stat(settings: PanelStatSettings) {
    init_logging(settings.verbosity);

    // okay, now we can check all the other settings
    let cli_settings: PanelStatSettings = check_panel_stat_settings(settings);

    let panel: ReferencePanel = load_panel(&cli_settings.resource_folder);
    info!("Reference panel loaded successfully.");

    // display the panel statistics
    pbhlatyper::panel_stat::print_stats(&panel);
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Type(settings) => {
            run_type(*settings);
        },
        Commands::PanelStat(settings) => {
            run_panel_stat(*settings);
        }
    }

    info!("Process finished successfully.");
}

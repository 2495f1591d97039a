
use clap::Args;
use log::info;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP};

#[derive(Clone, Args)]
#[clap(author, about,
    after_help = &**AFTER_HELP)]
pub struct PanelStatSettings {
    /// Folder containing the reference panel files, e.g. A_nuc.txt and A_prot.txt
    #[clap(required = true)]
    #[clap(short = 'd')]
    #[clap(long = "resources")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub resource_folder: PathBuf,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_panel_stat_settings(settings: PanelStatSettings) -> PanelStatSettings {
    // dump stuff to the logger
    check_required_filename(&settings.resource_folder, "Resource folder");

    info!("Resource folder: {:?}", &settings.resource_folder);

    settings
}

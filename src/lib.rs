
/// Contains all the CLI related functionality
pub mod cli;
/// Contains any specialized data types that are shared across the tooling
pub mod data_types;
/// Contains the read sources that turn inputs into evidence fragments
pub mod evidence;
/// Contains the HLA typing engine
pub mod hla;
/// Contains functionality for displaying reference panel statistics
pub mod panel_stat;
/// Contains generic utilities that are handy wrappers
pub mod util;

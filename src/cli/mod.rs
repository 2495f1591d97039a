
/// the main CLI module
pub mod core;
/// The panel-stat CLI subcommand for summarizing a reference panel
pub mod panel_stat;
/// the type CLI subcommand for calling HLA alleles
pub mod typing;

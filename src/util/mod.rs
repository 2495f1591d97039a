
/// Generic functionality for reading/writing serializable object to file
pub mod file_io;
/// Functions for sequence manipulation
pub mod sequence;

/// Reads aligned BAM/CRAM records into coding evidence
pub mod bam_reader;
/// Reads and writes the tab-delimited evidence table
pub mod evidence_table;

use log::{debug, warn};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::BTreeSet;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::hla::alleles::{HlaAllele, HlaGene};
use crate::hla::errors::HlaTypingError;
use crate::hla::sequence::{deflate_all, DeflatedSequence, HlaSequence, EXON_MARKER_CHAR};
use crate::util::file_io::{open_reader, open_writer};

/// Width of the allele column when writing sequence files
const ALLELE_COLUMN_WIDTH: usize = 20;

/// Parses the raw allele/sequence text pairs from an aligned sequence file.
/// Lines whose first token is not an allele (headers, rulers, boundary lines) are skipped.
/// Alleles that appear on multiple lines, as in blocked alignments, have their text concatenated in order.
/// # Arguments
/// * `reader` - the text source
/// # Errors
/// * if the reader fails
pub fn parse_sequence_lines<R: Read>(reader: R) -> Result<Vec<(HlaAllele, String)>, Box<dyn std::error::Error>> {
    let mut entries: Vec<(HlaAllele, String)> = vec![];
    let mut lookup: HashMap<HlaAllele, usize> = Default::default();

    for line_result in BufReader::new(reader).lines() {
        let line = line_result?;
        let mut tokens = line.split_whitespace();
        let allele = match tokens.next().map(HlaAllele::from_str) {
            Some(Ok(a)) => a,
            _ => continue
        };
        let text: String = tokens.collect();
        match lookup.get(&allele) {
            Some(&index) => entries[index].1.push_str(&text),
            None => {
                lookup.insert(allele.clone(), entries.len());
                entries.push((allele, text));
            }
        }
    }
    Ok(entries)
}

/// Loads an aligned sequence file and inflates every entry against the first one.
/// The file may be gzipped.
/// # Arguments
/// * `filename` - the file to load
/// # Errors
/// * if the file cannot be opened or parsed
/// * if a deflated entry extends past the reference entry
pub fn read_sequence_file(filename: &Path) -> Result<Vec<HlaSequence>, Box<dyn std::error::Error>> {
    let reader = open_reader(filename)
        .map_err(|e| HlaTypingError::input_unavailable("Sequence file", filename, e))?;
    let entries = parse_sequence_lines(reader)?;
    let mut iter = entries.into_iter();
    let reference = match iter.next() {
        Some((allele, text)) => HlaSequence::from_text(allele, &text)?,
        None => {
            warn!("No sequences found in {filename:?}");
            return Ok(vec![]);
        }
    };

    let mut sequences: Vec<HlaSequence> = vec![];
    for (allele, text) in iter {
        let deflated = DeflatedSequence::from_text(allele, &text)?;
        sequences.push(deflated.inflate(&reference)?);
    }
    sequences.insert(0, reference);
    debug!("Loaded {} sequences from {filename:?}", sequences.len());
    Ok(sequences)
}

/// Reduces a collection to one sequence per specific protein, renamed to the protein.
/// The first sequence seen for each protein is kept.
pub fn specific_proteins(sequences: &[HlaSequence]) -> Vec<HlaSequence> {
    let mut seen: HashSet<HlaAllele> = Default::default();
    sequences.iter()
        .filter_map(|s| {
            let protein = s.allele().specific_protein();
            if seen.insert(protein.clone()) {
                Some(HlaSequence::new(protein, s.sequence().to_vec()))
            } else {
                None
            }
        })
        .collect()
}

/// Renders a line with the boundary marker at each boundary locus
fn boundary_line(boundaries: &BTreeSet<usize>) -> String {
    let length = boundaries.iter().max().map(|m| m + 1).unwrap_or(0);
    let markers: String = (0..length)
        .map(|i| if boundaries.contains(&i) { EXON_MARKER_CHAR } else { ' ' })
        .collect();
    format!("{:<width$}{}", "", markers, width = ALLELE_COLUMN_WIDTH)
}

/// Writes fully explicit sequences to a file.
/// # Arguments
/// * `sequences` - the sequences to write
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
pub fn write_sequence_file(sequences: &[HlaSequence], out_filename: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = open_writer(out_filename)?;
    for sequence in sequences.iter() {
        writeln!(writer, "{:<width$}{}", sequence.allele().to_string(), sequence.to_text(), width = ALLELE_COLUMN_WIDTH)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes sequences deflated against the first entry, preceded by one exon boundary line per gene.
/// # Arguments
/// * `boundaries` - protein exon boundaries to mark, in gene order
/// * `sequences` - the sequences to deflate and write
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
pub fn write_deflated_file(boundaries: &[(HlaGene, &BTreeSet<usize>)], sequences: &[HlaSequence], out_filename: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = open_writer(out_filename)?;
    for (_gene, gene_boundaries) in boundaries.iter() {
        writeln!(writer, "{}", boundary_line(gene_boundaries))?;
    }
    for deflated in deflate_all(sequences).iter() {
        writeln!(writer, "{:<width$}{}", deflated.allele().to_string(), deflated.to_text(), width = ALLELE_COLUMN_WIDTH)?;
    }
    writer.flush()?;
    Ok(())
}

/// Determines the resource file name for a gene, preferring an uncompressed file.
/// # Arguments
/// * `resource_folder` - the folder containing the panel files
/// * `gene` - the gene to look up
/// * `suffix` - "nuc" or "prot"
/// # Errors
/// * if neither the plain nor the gzipped file exists
pub fn resource_filename(resource_folder: &Path, gene: HlaGene, suffix: &str) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
    let plain = resource_folder.join(format!("{}_{}.txt", gene.letter(), suffix));
    if plain.exists() {
        return Ok(plain);
    }
    let gzipped = resource_folder.join(format!("{}_{}.txt.gz", gene.letter(), suffix));
    if gzipped.exists() {
        return Ok(gzipped);
    }
    Err(HlaTypingError::input_unavailable(&format!("{gene} {suffix} resource"), &plain, "file not found").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn allele(s: &str) -> HlaAllele {
        HlaAllele::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_blocked_lines() {
        let text = " Prot   -30\n\n A*01:01:01:01   MAV MAP\n A*01:01:01:02N  --- -*-\n\n A*01:01:01:01   RTL\n A*01:01:01:02N  -*.\n";
        let entries = parse_sequence_lines(text.as_bytes()).unwrap();
        assert_eq!(entries, vec![
            (allele("A*01:01:01:01"), "MAVMAPRTL".to_string()),
            (allele("A*01:01:01:02N"), "----*--*.".to_string())
        ]);
    }

    #[test]
    fn test_read_sequence_file() {
        let filename = PathBuf::from("./test_data/panel/A_prot.txt");
        let sequences = read_sequence_file(&filename).unwrap();
        assert_eq!(sequences.len(), 4);
        assert_eq!(sequences[0].allele(), &allele("A*01:01:01:01"));
        assert_eq!(sequences[0].to_text(), "MAVMAPRTLL");
        assert_eq!(sequences[1].to_text(), "MAVMAPRTLL");
        assert_eq!(sequences[2].to_text(), "MAVMAPRTLV");
        assert_eq!(sequences[3].to_text(), "MAVMAPR***");
    }

    #[test]
    fn test_specific_proteins() {
        let filename = PathBuf::from("./test_data/panel/A_prot.txt");
        let sequences = read_sequence_file(&filename).unwrap();
        let proteins = specific_proteins(&sequences);
        let alleles: Vec<String> = proteins.iter().map(|s| s.allele().to_string()).collect();
        assert_eq!(alleles, vec!["A*01:01", "A*02:01", "A*03:01"]);
        // the first entry of a protein is kept
        assert_eq!(proteins[0].to_text(), "MAVMAPRTLL");
    }

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sequences = vec![
            HlaSequence::from_text(allele("A*01:01"), "ACGT*").unwrap(),
            HlaSequence::from_text(allele("A*02:01"), "ACCT.").unwrap()
        ];

        let inflated = temp_dir.path().join("candidates.inflate.txt");
        write_sequence_file(&sequences, &inflated).unwrap();
        assert_eq!(read_sequence_file(&inflated).unwrap(), sequences);

        // boundary lines are skipped when read back
        let deflated = temp_dir.path().join("candidates.deflate.txt");
        let boundaries: BTreeSet<usize> = [1, 3].into_iter().collect();
        write_deflated_file(&[(HlaGene::HlaA, &boundaries)], &sequences, &deflated).unwrap();
        assert_eq!(read_sequence_file(&deflated).unwrap(), sequences);
    }

    #[test]
    fn test_boundary_line() {
        let boundaries: BTreeSet<usize> = [1, 3].into_iter().collect();
        assert_eq!(boundary_line(&boundaries).trim_start(), "| |");
    }

    #[test]
    fn test_resource_filename() {
        let folder = PathBuf::from("./test_data/panel");
        assert!(resource_filename(&folder, HlaGene::HlaA, "prot").is_ok());
        assert!(resource_filename(&folder, HlaGene::HlaA, "missing").is_err());
    }
}

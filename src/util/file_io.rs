use std::io::{BufReader, BufWriter, Write};
use std::fs::File;
use std::path::Path;

/// Opens a file for reading, transparently decompressing it if the extension is ".gz"
/// # Arguments
/// * `filename` - the file path to open
/// # Errors
/// * if the file does not open properly
pub fn open_reader(filename: &Path) -> Result<Box<dyn std::io::Read>, Box<dyn std::error::Error>> {
    let fp: Box<dyn std::io::Read> = if filename.extension().unwrap_or_default() == "gz" {
        Box::new(
            flate2::read::MultiGzDecoder::new(
                BufReader::new(File::open(filename)?)
            )
        )
    } else {
        Box::new(BufReader::new(File::open(filename)?))
    };
    Ok(fp)
}

/// Opens a file for writing, compressing it if the extension is ".gz"
/// # Arguments
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if the file cannot be created
pub fn open_writer(out_filename: &Path) -> Result<BufWriter<Box<dyn std::io::Write>>, Box<dyn std::error::Error>> {
    let file: Box<dyn std::io::Write> = if out_filename.extension().unwrap_or_default() == "gz" {
        Box::new(
            flate2::write::GzEncoder::new(
                File::create(out_filename)?,
                flate2::Compression::best()
            )
        )
    } else {
        Box::new(File::create(out_filename)?)
    };
    Ok(BufWriter::new(file))
}

/// Helper function that loads a file into some type, helpful generic
/// # Arguments
/// * `filename` - the file path to open and parse
/// # Errors
/// * if the file does not open properly
/// * if the deserialization throws errors
pub fn load_json<T: serde::de::DeserializeOwned>(filename: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let fp = open_reader(filename)?;
    let result: T = serde_json::from_reader(fp)?;
    Ok(result)
}

/// This will save a generic serializable struct to JSON.
/// # Arguments
/// * `data` - the data in memory
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
/// * if JSON serialization throws errors
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = open_writer(out_filename)?;
    serde_json::to_writer_pretty(&mut writer, data)?;
    writer.flush()?;
    Ok(())
}

/// Writes a collection of pre-formatted rows to a tab-delimited file.
/// Rows are allowed to have different lengths, which the vertical count tables rely on.
/// # Arguments
/// * `header` - optional header row
/// * `rows` - the rows to write
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
pub fn save_tsv_rows(header: Option<&[&str]>, rows: &[Vec<String>], out_filename: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(open_writer(out_filename)?);

    if let Some(h) = header {
        csv_writer.write_record(h)?;
    }
    for row in rows.iter() {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde::{Deserialize, Serialize};
    use std::io::Read;

    #[derive(Debug, Deserialize, PartialEq, Serialize)]
    struct Dummy {
        name: String,
        value: usize
    }

    #[test]
    fn test_json_round_trip_gz() {
        let temp_dir = tempfile::tempdir().unwrap();
        let filename = temp_dir.path().join("dummy.json.gz");
        let data = Dummy { name: "test".to_string(), value: 3 };
        save_json(&data, &filename).unwrap();
        let loaded: Dummy = load_json(&filename).unwrap();
        assert_eq!(data, loaded);
    }

    #[test]
    fn test_save_tsv_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let filename = temp_dir.path().join("rows.tsv");
        let rows = vec![
            vec!["0".to_string(), "A".to_string(), "3".to_string()],
            vec!["1".to_string()]
        ];
        save_tsv_rows(Some(&["Locus"]), &rows, &filename).unwrap();

        let mut contents = String::new();
        open_reader(&filename).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "Locus\n0\tA\t3\n1\n");
    }
}

use simple_error::{bail, SimpleError};

/// Symbol used for a base or residue that is absent in an alignment
pub const GAP_SYMBOL: u8 = b'.';
/// Residue reported for any stop codon, matching the IMGT protein alignments
pub const STOP_SYMBOL: u8 = b'X';

/// Complements a single nucleotide.
/// # Arguments
/// * `base` - the base to complement
/// # Errors
/// * if any non-ACGNT character is provided
pub fn complement(base: u8) -> Result<u8, SimpleError> {
    match base {
        b'A' => Ok(b'T'),
        b'C' => Ok(b'G'),
        b'G' => Ok(b'C'),
        b'T' => Ok(b'A'),
        b'N' => Ok(b'N'),
        _ => bail!("Unexpected character for complement: {}", base as char)
    }
}

/// Translates a codon into the amino acid it encodes using the standard genetic code.
/// A codon that is entirely gaps translates to the gap symbol.
/// Returns None when the codon cannot be translated, e.g. partial gaps or ambiguous bases.
/// # Arguments
/// * `codon` - the three nucleotides of the codon, upper case
pub fn translate_codon(codon: [u8; 3]) -> Option<u8> {
    if codon.iter().all(|&b| b == GAP_SYMBOL) {
        return Some(GAP_SYMBOL);
    }

    let aa = match &codon {
        b"TTT" | b"TTC" => b'F',
        b"TTA" | b"TTG" | b"CTT" | b"CTC" | b"CTA" | b"CTG" => b'L',
        b"ATT" | b"ATC" | b"ATA" => b'I',
        b"ATG" => b'M',
        b"GTT" | b"GTC" | b"GTA" | b"GTG" => b'V',
        b"TCT" | b"TCC" | b"TCA" | b"TCG" | b"AGT" | b"AGC" => b'S',
        b"CCT" | b"CCC" | b"CCA" | b"CCG" => b'P',
        b"ACT" | b"ACC" | b"ACA" | b"ACG" => b'T',
        b"GCT" | b"GCC" | b"GCA" | b"GCG" => b'A',
        b"TAT" | b"TAC" => b'Y',
        b"TAA" | b"TAG" | b"TGA" => STOP_SYMBOL,
        b"CAT" | b"CAC" => b'H',
        b"CAA" | b"CAG" => b'Q',
        b"AAT" | b"AAC" => b'N',
        b"AAA" | b"AAG" => b'K',
        b"GAT" | b"GAC" => b'D',
        b"GAA" | b"GAG" => b'E',
        b"TGT" | b"TGC" => b'C',
        b"TGG" => b'W',
        b"CGT" | b"CGC" | b"CGA" | b"CGG" | b"AGA" | b"AGG" => b'R',
        b"GGT" | b"GGC" | b"GGA" | b"GGG" => b'G',
        _ => return None
    };
    Some(aa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement() {
        let sequence = b"ACGTN";
        let expected = b"TGCAN";
        let result: Vec<u8> = sequence.iter()
            .map(|&b| complement(b).unwrap())
            .collect();
        assert_eq!(&result, expected);
    }

    #[test]
    fn test_complement_invalid() {
        assert!(complement(b'b').is_err());
    }

    #[test]
    fn test_translate_codon() {
        assert_eq!(translate_codon(*b"ATG"), Some(b'M'));
        assert_eq!(translate_codon(*b"GGA"), Some(b'G'));
        assert_eq!(translate_codon(*b"TGA"), Some(STOP_SYMBOL));
        assert_eq!(translate_codon(*b"..."), Some(GAP_SYMBOL));

        // partial gaps and ambiguous bases are not translated
        assert_eq!(translate_codon(*b"A.G"), None);
        assert_eq!(translate_codon(*b"ANG"), None);
    }
}

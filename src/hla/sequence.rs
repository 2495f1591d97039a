use serde::{Deserialize, Serialize};
use simple_error::{bail, SimpleError};

use crate::hla::alleles::HlaAllele;

/// Text symbol for a wildcard (unknown) position
pub const WILDCARD_CHAR: char = '*';
/// Text symbol for "same as the reference" in a deflated sequence
pub const MATCH_REFERENCE_CHAR: char = '-';
/// Text symbol that marks exon boundaries in the aligned files, carries no sequence
pub const EXON_MARKER_CHAR: char = '|';

/// Outcome of comparing an allele sequence against observed symbols
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum_macros::Display)]
pub enum SequenceMatch {
    /// Every compared locus is defined and equal
    Full,
    /// Some compared loci are defined and equal, the rest are wildcards
    Partial,
    /// Every compared locus is a wildcard
    Wild,
    /// At least one defined locus disagrees
    NoMatch
}

impl SequenceMatch {
    /// True for matches that count as support for an allele
    pub fn is_supporting(&self) -> bool {
        matches!(self, SequenceMatch::Full | SequenceMatch::Partial)
    }

    /// Combines the matches from two independent sets of loci.
    /// A mismatch anywhere dominates, identical outcomes are kept, anything else is partial.
    pub fn combine(self, other: SequenceMatch) -> SequenceMatch {
        match (self, other) {
            (SequenceMatch::NoMatch, _) | (_, SequenceMatch::NoMatch) => SequenceMatch::NoMatch,
            (SequenceMatch::Full, SequenceMatch::Full) => SequenceMatch::Full,
            (SequenceMatch::Wild, SequenceMatch::Wild) => SequenceMatch::Wild,
            _ => SequenceMatch::Partial
        }
    }

    /// Ranking used to pick the best of several alternatives, higher is better
    fn rank(&self) -> u8 {
        match self {
            SequenceMatch::Full => 3,
            SequenceMatch::Partial => 2,
            SequenceMatch::Wild => 1,
            SequenceMatch::NoMatch => 0
        }
    }

    /// Returns the better of two matches
    pub fn best(self, other: SequenceMatch) -> SequenceMatch {
        if other.rank() > self.rank() { other } else { self }
    }
}

/// An allele with its aligned sequence.
/// `None` symbols are wildcards, `Some(b'.')` is a real alignment gap.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct HlaSequence {
    /// The allele identifier
    allele: HlaAllele,
    /// One symbol per locus
    sequence: Vec<Option<u8>>
}

impl HlaSequence {
    pub fn new(allele: HlaAllele, sequence: Vec<Option<u8>>) -> HlaSequence {
        HlaSequence {
            allele,
            sequence
        }
    }

    /// Parses a fully explicit text sequence, where `*` is a wildcard.
    /// # Errors
    /// * if the text contains the deflated "same as reference" symbol
    pub fn from_text(allele: HlaAllele, text: &str) -> Result<HlaSequence, SimpleError> {
        let mut sequence: Vec<Option<u8>> = Vec::with_capacity(text.len());
        for c in text.chars() {
            match c {
                WILDCARD_CHAR => sequence.push(None),
                MATCH_REFERENCE_CHAR => bail!("Reference symbol found in explicit sequence for {}", allele),
                EXON_MARKER_CHAR => {},
                c if c.is_ascii_graphic() => sequence.push(Some(c as u8)),
                _ => bail!("Unexpected character {:?} in sequence for {}", c, allele)
            }
        }
        Ok(HlaSequence::new(allele, sequence))
    }

    pub fn allele(&self) -> &HlaAllele {
        &self.allele
    }

    pub fn sequence(&self) -> &[Option<u8>] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Returns the symbol at a locus; wildcards and loci past the end are None
    pub fn symbol_at(&self, locus: usize) -> Option<u8> {
        self.sequence.get(locus).cloned().flatten()
    }

    /// Returns the symbols at the given loci, None for wildcards
    pub fn symbols_at(&self, loci: &[usize]) -> Vec<Option<u8>> {
        loci.iter()
            .map(|&l| self.symbol_at(l))
            .collect()
    }

    /// Compares this sequence against symbols observed at a set of loci.
    /// # Arguments
    /// * `loci` - the loci to compare
    /// * `observed` - the observed symbol for each locus
    /// # Panics
    /// * if `loci` and `observed` have different lengths
    pub fn match_loci(&self, loci: &[usize], observed: &[u8]) -> SequenceMatch {
        assert_eq!(loci.len(), observed.len());
        let mut num_wild: usize = 0;
        for (&locus, &obs) in loci.iter().zip(observed.iter()) {
            match self.symbol_at(locus) {
                None => num_wild += 1,
                Some(s) if s != obs => return SequenceMatch::NoMatch,
                Some(_) => {}
            }
        }

        if num_wild == 0 {
            SequenceMatch::Full
        } else if num_wild == loci.len() {
            SequenceMatch::Wild
        } else {
            SequenceMatch::Partial
        }
    }

    /// Pads the sequence with wildcards up to `length`; longer sequences are left alone
    pub fn pad(&mut self, length: usize) {
        if self.sequence.len() < length {
            self.sequence.resize(length, None);
        }
    }

    /// Renders the explicit sequence as text
    pub fn to_text(&self) -> String {
        self.sequence.iter()
            .map(|s| match s {
                Some(c) => *c as char,
                None => WILDCARD_CHAR
            })
            .collect()
    }

    /// Encodes this sequence as a diff against a reference sequence.
    /// Any locus equal to the reference, including shared wildcards, becomes `SameAsReference`.
    pub fn deflate(&self, reference: &HlaSequence) -> DeflatedSequence {
        let symbols = self.sequence.iter().enumerate()
            .map(|(i, &s)| {
                match reference.sequence.get(i) {
                    Some(&r) if r == s => DeflatedSymbol::SameAsReference,
                    _ => DeflatedSymbol::Explicit(s)
                }
            })
            .collect();
        DeflatedSequence {
            allele: self.allele.clone(),
            symbols
        }
    }
}

/// One symbol of a deflated sequence
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeflatedSymbol {
    /// Identical to the reference at this locus
    SameAsReference,
    /// Explicit symbol, None is a wildcard
    Explicit(Option<u8>)
}

/// A sequence stored as a diff against the first sequence of its gene
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeflatedSequence {
    allele: HlaAllele,
    symbols: Vec<DeflatedSymbol>
}

impl DeflatedSequence {
    /// Parses deflated text where `-` means "same as reference" and `*` is a wildcard.
    /// Exon markers are dropped.
    /// # Errors
    /// * if a non-printable character is found
    pub fn from_text(allele: HlaAllele, text: &str) -> Result<DeflatedSequence, SimpleError> {
        let mut symbols: Vec<DeflatedSymbol> = Vec::with_capacity(text.len());
        for c in text.chars() {
            let symbol = match c {
                MATCH_REFERENCE_CHAR => DeflatedSymbol::SameAsReference,
                WILDCARD_CHAR => DeflatedSymbol::Explicit(None),
                EXON_MARKER_CHAR => continue,
                c if c.is_ascii_graphic() => DeflatedSymbol::Explicit(Some(c as u8)),
                _ => bail!("Unexpected character {:?} in sequence for {}", c, allele)
            };
            symbols.push(symbol);
        }
        Ok(DeflatedSequence {
            allele,
            symbols
        })
    }

    pub fn allele(&self) -> &HlaAllele {
        &self.allele
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Renders the deflated sequence as text
    pub fn to_text(&self) -> String {
        self.symbols.iter()
            .map(|s| match s {
                DeflatedSymbol::SameAsReference => MATCH_REFERENCE_CHAR,
                DeflatedSymbol::Explicit(Some(c)) => *c as char,
                DeflatedSymbol::Explicit(None) => WILDCARD_CHAR
            })
            .collect()
    }

    /// Expands back to an explicit sequence against the same reference used to deflate.
    /// # Errors
    /// * if a "same as reference" symbol lands past the end of the reference
    pub fn inflate(&self, reference: &HlaSequence) -> Result<HlaSequence, SimpleError> {
        let mut sequence: Vec<Option<u8>> = Vec::with_capacity(self.symbols.len());
        for (i, symbol) in self.symbols.iter().enumerate() {
            match symbol {
                DeflatedSymbol::SameAsReference => {
                    match reference.sequence.get(i) {
                        Some(&r) => sequence.push(r),
                        None => bail!("{} references locus {} beyond the reference {}", self.allele, i, reference.allele)
                    }
                },
                DeflatedSymbol::Explicit(s) => sequence.push(*s)
            }
        }
        Ok(HlaSequence::new(self.allele.clone(), sequence))
    }
}

/// Deflates a list of sequences against its first entry; the first stays explicit
pub fn deflate_all(sequences: &[HlaSequence]) -> Vec<DeflatedSequence> {
    let reference = match sequences.first() {
        Some(r) => r,
        None => return vec![]
    };
    sequences.iter().enumerate()
        .map(|(i, s)| {
            if i == 0 {
                DeflatedSequence {
                    allele: s.allele.clone(),
                    symbols: s.sequence.iter().map(|&c| DeflatedSymbol::Explicit(c)).collect()
                }
            } else {
                s.deflate(reference)
            }
        })
        .collect()
}

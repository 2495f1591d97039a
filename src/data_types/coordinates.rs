
use serde::{Deserialize, Serialize};

/// Region coordinates on a reference chromosome
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Coordinates {
    /// Chromosome string
    chrom: String,
    /// 0-based start, inclusive
    start: u64,
    /// 0-based end, exclusive
    end: u64
}

impl Coordinates {
    /// Constructor, requires `start <= end`
    pub fn new(chrom: String, start: u64, end: u64) -> Coordinates {
        assert!(start <= end);
        Coordinates {
            chrom, start, end
        }
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bases in the region
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if the 0-based position is inside the region
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position < self.end
    }

    /// Wrapper for sending to htslib fetch
    pub fn fetch_definition(&self) -> (&str, u64, u64) {
        (&self.chrom, self.start, self.end)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // start and end are 0-based, so shift start+1
        write!(f, "{}:{}-{}", self.chrom, self.start+1, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates() {
        let chrom = "chr6".to_string();
        let coordinate = Coordinates::new(chrom.clone(), 10, 20);
        assert_eq!(coordinate.fetch_definition(), (chrom.as_str(), 10, 20));
        assert_eq!(coordinate.len(), 10);
        assert_eq!(coordinate.to_string(), "chr6:11-20");
        assert!(coordinate.contains(10));
        assert!(coordinate.contains(19));
        assert!(!coordinate.contains(20));
    }

    #[test]
    #[should_panic]
    fn test_bad_coordinates() {
        let _coordinate = Coordinates::new("chr6".to_string(), 10, 5);
    }
}

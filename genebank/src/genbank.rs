//! GenBank flat-file sequence extraction.
//!
//! Only the sequence sections matter here. A section starts on the line
//! after one containing `ORIGIN` (any case) and ends at a line containing
//! `//`:
//!
//! ```text
//! ORIGIN
//!         1 gatcctccat atacaacggt atctccacct caggtttaga tctcaacaac ggaaccattg
//!        61 ccgacatgag acagttaggt atcgtcgaga gttacaagct aaaacgagca gtagtcagct
//! //
//! ```
//!
//! Position numbers and whitespace are dropped; everything else is kept
//! verbatim, so invalid symbols such as `n` survive until windowing.

use std::io::BufRead;

use crate::kmer::{self, KmerError, MAX_ENCODED_LENGTH};

/// Iterator over the sequence sections of a GenBank file.
///
/// Each item is one section's symbols concatenated across lines. A section
/// cut off by end of input is still yielded.
pub struct SequenceReader<R> {
    reader: R,
    line: String,
    done: bool,
}

impl<R: BufRead> SequenceReader<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            done: false,
        }
    }

    fn next_sequence(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut sequence: Option<Vec<u8>> = None;

        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                self.done = true;
                return Ok(sequence);
            }

            if self.line.contains("//") {
                if let Some(finished) = sequence.take() {
                    return Ok(Some(finished));
                }
                continue;
            }

            if let Some(buffer) = sequence.as_mut() {
                buffer.extend(
                    self.line
                        .bytes()
                        .filter(|b| !b.is_ascii_digit() && !b.is_ascii_whitespace()),
                );
            } else if self.line.to_ascii_uppercase().contains("ORIGIN") {
                sequence = Some(Vec::new());
            }
        }
    }
}

impl<R: BufRead> Iterator for SequenceReader<R> {
    type Item = std::io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.next_sequence().transpose()
    }
}

/// Sliding windows of a fixed length over a sequence.
///
/// Yields one item per window, in order: `Some(key)` for a window of valid
/// nucleotides, `None` for a window containing any other symbol. A sequence
/// shorter than the window length yields nothing.
pub struct KmerWindows<'a> {
    sequence: &'a [u8],
    length: usize,
    mask: u64,
    position: usize,
    key: u64,
    run: usize,
}

/// Windows of `length` symbols over `sequence`.
pub fn kmer_windows(sequence: &[u8], length: usize) -> Result<KmerWindows<'_>, KmerError> {
    if length == 0 || length > MAX_ENCODED_LENGTH {
        return Err(KmerError::InvalidLength(length));
    }
    let mask = if length == MAX_ENCODED_LENGTH {
        u64::MAX
    } else {
        (1u64 << (2 * length)) - 1
    };

    Ok(KmerWindows {
        sequence,
        length,
        mask,
        position: 0,
        key: 0,
        run: 0,
    })
}

impl Iterator for KmerWindows<'_> {
    type Item = Option<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position < self.sequence.len() {
            let symbol = self.sequence[self.position];
            self.position += 1;

            // `run` counts the valid symbols ending at the current position.
            if let Some(code) = kmer::symbol_code(symbol) {
                self.key = ((self.key << 2) | code) & self.mask;
                self.run += 1;
            } else {
                self.run = 0;
            }

            if self.position >= self.length {
                return Some((self.run >= self.length).then_some(self.key));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::encode;

    const SAMPLE: &str = "\
LOCUS       TEST                     20 bp    DNA     linear   PRI 01-JAN-2000
DEFINITION  Test sequence.
FEATURES             Location/Qualifiers
     source          1..20
ORIGIN
        1 gatcctccat atacaacggt
       11 nnagc
//
LOCUS       SECOND
ORIGIN
        1 ACGT
//
";

    fn sequences(input: &str) -> Vec<String> {
        SequenceReader::new(input.as_bytes())
            .map(|s| String::from_utf8(s.expect("read")).expect("utf8"))
            .collect()
    }

    #[test]
    fn test_reads_each_origin_section() {
        assert_eq!(
            sequences(SAMPLE),
            vec!["gatcctccatatacaacggtnnagc".to_string(), "ACGT".to_string()]
        );
    }

    #[test]
    fn test_ignores_text_outside_sections() {
        assert!(sequences("LOCUS X\nDEFINITION acgt\n//\n").is_empty());
        assert!(sequences("").is_empty());
    }

    #[test]
    fn test_unterminated_section_is_yielded() {
        assert_eq!(sequences("origin\n 1 ac\n 3 gt"), vec!["acgt".to_string()]);
    }

    #[test]
    fn test_windows_span_lines() {
        let input = "ORIGIN\n 1 ac\n 3 gt\n//\n";
        let sequence = &sequences(input)[0];
        let keys: Vec<Option<u64>> = kmer_windows(sequence.as_bytes(), 3)
            .expect("windows")
            .collect();
        assert_eq!(
            keys,
            vec![
                Some(encode("ACG").expect("encode")),
                Some(encode("CGT").expect("encode"))
            ]
        );
    }

    #[test]
    fn test_windows_skip_invalid_symbols() {
        let keys: Vec<Option<u64>> = kmer_windows(b"aanaaa", 2).expect("windows").collect();
        assert_eq!(keys, vec![Some(0), None, None, Some(0), Some(0)]);
    }

    #[test]
    fn test_window_keys_match_encoder() {
        let sequence = b"GATTACAGATTACA";
        for length in [1, 4, 7, 14] {
            let keys: Vec<u64> = kmer_windows(sequence, length)
                .expect("windows")
                .flatten()
                .collect();
            let expected: Vec<u64> = sequence
                .windows(length)
                .map(|w| encode(std::str::from_utf8(w).expect("utf8")).expect("encode"))
                .collect();
            assert_eq!(keys, expected, "length {length}");
        }
    }

    #[test]
    fn test_short_sequence_has_no_windows() {
        assert_eq!(kmer_windows(b"ac", 3).expect("windows").count(), 0);
    }

    #[test]
    fn test_window_length_bounds() {
        assert!(kmer_windows(b"a", 0).is_err());
        assert!(kmer_windows(b"a", 33).is_err());

        let sequence = "T".repeat(33);
        let keys: Vec<Option<u64>> = kmer_windows(sequence.as_bytes(), 32)
            .expect("windows")
            .collect();
        assert_eq!(keys, vec![Some(u64::MAX), Some(u64::MAX)]);
    }
}

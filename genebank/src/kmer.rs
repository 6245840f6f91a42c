//! 2-bit nucleotide encoding of k-mers.
//!
//! Each symbol maps to two bits, most significant symbol first:
//!
//! | symbol | bits |
//! |--------|------|
//! | A      | 00   |
//! | C      | 01   |
//! | G      | 10   |
//! | T      | 11   |
//!
//! Encoding is case-insensitive; decoding renders lowercase. The encoded value
//! does not record its length, so decoding needs it back.

/// Longest k-mer a sequence can be indexed with.
pub const MAX_KMER_LENGTH: u32 = 31;

/// Longest string that fits in a `u64` key.
pub const MAX_ENCODED_LENGTH: usize = 32;

/// Errors from encoding a k-mer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KmerError {
    /// A symbol outside `{A, C, G, T}`, with its byte position.
    InvalidSymbol { symbol: char, position: usize },
    /// Empty input or more symbols than fit in a key.
    InvalidLength(usize),
}

impl std::fmt::Display for KmerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSymbol { symbol, position } => {
                write!(f, "invalid nucleotide {symbol:?} at position {position}")
            }
            Self::InvalidLength(len) => write!(
                f,
                "invalid k-mer length {len}: must be 1 to {MAX_ENCODED_LENGTH}"
            ),
        }
    }
}

impl std::error::Error for KmerError {}

/// Two-bit code of a nucleotide, if it is one.
#[must_use]
pub const fn symbol_code(symbol: u8) -> Option<u64> {
    match symbol {
        b'A' | b'a' => Some(0b00),
        b'C' | b'c' => Some(0b01),
        b'G' | b'g' => Some(0b10),
        b'T' | b't' => Some(0b11),
        _ => None,
    }
}

/// Encode a k-mer into its integer key.
pub fn encode(kmer: &str) -> Result<u64, KmerError> {
    let bytes = kmer.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_ENCODED_LENGTH {
        return Err(KmerError::InvalidLength(bytes.len()));
    }

    let mut key = 0u64;
    for (position, &symbol) in bytes.iter().enumerate() {
        let code = symbol_code(symbol).ok_or_else(|| KmerError::InvalidSymbol {
            symbol: kmer[position..].chars().next().unwrap_or('?'),
            position,
        })?;
        key = (key << 2) | code;
    }
    Ok(key)
}

/// Render the `length`-symbol k-mer encoded by `key`, in lowercase.
///
/// Bits above `2 * length` are ignored.
#[must_use]
pub fn decode(key: u64, length: usize) -> String {
    const SYMBOLS: [char; 4] = ['a', 'c', 'g', 't'];

    (0..length.min(MAX_ENCODED_LENGTH))
        .rev()
        .map(|i| {
            #[allow(clippy::cast_possible_truncation)] // masked to 2 bits
            let code = ((key >> (2 * i)) & 0b11) as usize;
            SYMBOLS[code]
        })
        .collect()
}

//! Tree header structure and serialization.
//!
//! The header occupies bytes `[0, 12)` of the tree file and is written once,
//! as the last write of a build session. Layout (big-endian):
//!
//! - `root_location`: 4 bytes
//! - `node_count`: 4 bytes
//! - `degree`: 4 bytes
//!
//! A file whose build never reached finalization has an all-zero header.

use crate::storage::btree::{Location, MIN_DEGREE, record_length};

/// Size of the header in bytes. The first node record starts here.
pub const HEADER_SIZE: usize = 12;

/// `HEADER_SIZE` as a file offset.
#[allow(clippy::cast_possible_truncation)] // 12 fits in u32
pub const HEADER_SIZE_U32: u32 = HEADER_SIZE as u32;

/// Header field offsets.
mod offsets {
    pub const ROOT_LOCATION: usize = 0;
    pub const NODE_COUNT: usize = 4;
    pub const DEGREE: usize = 8;
}

/// Tree metadata persisted at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHeader {
    /// File offset of the root node.
    pub root_location: Location,
    /// Number of nodes ever allocated.
    pub node_count: u32,
    /// Degree the tree was built with.
    pub degree: u32,
}

impl TreeHeader {
    /// Serialize the header.
    #[must_use]
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[offsets::ROOT_LOCATION..offsets::ROOT_LOCATION + 4]
            .copy_from_slice(&self.root_location.to_be_bytes());
        buf[offsets::NODE_COUNT..offsets::NODE_COUNT + 4]
            .copy_from_slice(&self.node_count.to_be_bytes());
        buf[offsets::DEGREE..offsets::DEGREE + 4].copy_from_slice(&self.degree.to_be_bytes());
        buf
    }

    /// Deserialize and validate a header.
    ///
    /// The root must sit on a record boundary inside the allocated region.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort(bytes.len()));
        }
        if bytes[..HEADER_SIZE].iter().all(|&b| b == 0) {
            return Err(HeaderError::Unfinalized);
        }

        let read = |offset: usize| {
            u32::from_be_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };

        let header = Self {
            root_location: read(offsets::ROOT_LOCATION),
            node_count: read(offsets::NODE_COUNT),
            degree: read(offsets::DEGREE),
        };

        if header.degree < MIN_DEGREE {
            return Err(HeaderError::InvalidDegree(header.degree));
        }
        let record = record_length(header.degree).ok_or(HeaderError::InvalidDegree(header.degree))?;

        let in_region = header.root_location >= HEADER_SIZE_U32
            && (header.root_location - HEADER_SIZE_U32) % record == 0
            && (header.root_location - HEADER_SIZE_U32) / record < header.node_count;
        if !in_region {
            return Err(HeaderError::InvalidRootLocation {
                root_location: header.root_location,
                node_count: header.node_count,
            });
        }

        Ok(header)
    }
}

/// Errors that can occur when reading a tree header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Fewer than `HEADER_SIZE` bytes available.
    TooShort(usize),
    /// The header was never written; the build did not finish.
    Unfinalized,
    /// Degree below the minimum or too large to address.
    InvalidDegree(u32),
    /// Root does not point at an allocated record.
    InvalidRootLocation { root_location: Location, node_count: u32 },
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort(len) => write!(f, "header too short: {len} bytes"),
            Self::Unfinalized => write!(f, "tree metadata was never written"),
            Self::InvalidDegree(d) => write!(f, "invalid degree in header: {d}"),
            Self::InvalidRootLocation {
                root_location,
                node_count,
            } => write!(
                f,
                "root location {root_location} is not an allocated record (node count: {node_count})"
            ),
        }
    }
}

impl std::error::Error for HeaderError {}

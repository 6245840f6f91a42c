//! Degree selection and record-length arithmetic.
//!
//! Every node occupies a fixed-size slot whose length depends only on the
//! tree degree `t`:
//!
//! ```text
//! record = NODE_METADATA_SIZE + (2t-1) * ENTRY_SIZE + 2t * CHILD_SIZE + PARENT_SIZE
//!        = 9 + 16(2t-1) + 8t + 4
//!        = 40t - 3
//! ```

use crate::storage::btree::tree::BTreeError;
use crate::storage::header::HEADER_SIZE;

/// Page size the optimal degree is fitted to.
pub const PAGE_SIZE: usize = 4096;

/// Smallest usable degree.
pub const MIN_DEGREE: u32 = 2;

/// Leaf flag (1) + `key_count` (4) + self location (4).
pub const NODE_METADATA_SIZE: usize = 9;

/// Key (8) + frequency (4) + status (4).
pub const ENTRY_SIZE: usize = 16;

/// One child offset.
pub const CHILD_SIZE: usize = 4;

/// Parent offset trailing every record.
pub const PARENT_SIZE: usize = 4;

/// Length in bytes of one node record for degree `t`.
///
/// Returns `None` when `t` is zero or the record would not be addressable
/// with 32-bit offsets.
#[must_use]
pub fn record_length(t: u32) -> Option<u32> {
    let t = u64::from(t);
    let keys = t.checked_mul(2)?.checked_sub(1)?;
    let children = t.checked_mul(2)?;
    let len = (NODE_METADATA_SIZE as u64)
        .checked_add(keys.checked_mul(ENTRY_SIZE as u64)?)?
        .checked_add(children.checked_mul(CHILD_SIZE as u64)?)?
        .checked_add(PARENT_SIZE as u64)?;

    // The first record must fit behind the header.
    if len.checked_add(HEADER_SIZE as u64)? > u64::from(u32::MAX) {
        return None;
    }
    u32::try_from(len).ok()
}

/// A validated tree degree (minimum branching factor).
///
/// # Invariants
/// - `t >= MIN_DEGREE`
/// - `record_length(t)` is representable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Degree {
    t: u32,
    record_length: u32,
}

impl Degree {
    /// Request value that selects the page-fitted degree.
    pub const AUTO: i64 = 0;

    /// Resolve a requested degree.
    ///
    /// - `requested >= 2`: used as is.
    /// - `requested == 0`: the largest degree whose record fits one page.
    /// - `1` or negative: `InvalidDegree`.
    pub fn resolve(requested: i64) -> Result<Self, BTreeError> {
        match requested {
            Self::AUTO => Ok(Self::optimal()),
            r if r < i64::from(MIN_DEGREE) => Err(BTreeError::InvalidDegree(r)),
            r => {
                let t = u32::try_from(r).map_err(|_| BTreeError::InvalidDegree(r))?;
                Self::new(t)
            }
        }
    }

    /// Create a degree from an exact value.
    pub fn new(t: u32) -> Result<Self, BTreeError> {
        if t < MIN_DEGREE {
            return Err(BTreeError::InvalidDegree(i64::from(t)));
        }
        let record_length = record_length(t).ok_or(BTreeError::InvalidDegree(i64::from(t)))?;
        Ok(Self { t, record_length })
    }

    /// The largest degree whose record fits in one `PAGE_SIZE` page.
    ///
    /// Solving `40t - 3 <= PAGE_SIZE` for `t`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // constant expression, equals 102
    pub const fn optimal() -> Self {
        let t = ((PAGE_SIZE + ENTRY_SIZE - NODE_METADATA_SIZE - PARENT_SIZE)
            / (2 * ENTRY_SIZE + 2 * CHILD_SIZE)) as u32;
        Self {
            t,
            record_length: 40 * t - 3,
        }
    }

    /// The raw degree value `t`.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.t
    }

    /// Length in bytes of one node record.
    #[must_use]
    pub const fn record_length(self) -> u32 {
        self.record_length
    }

    /// Maximum number of keys in a node: `2t - 1`.
    #[must_use]
    pub const fn max_keys(self) -> usize {
        2 * self.t as usize - 1
    }

    /// Number of child slots in a node: `2t`.
    #[must_use]
    pub const fn max_children(self) -> usize {
        2 * self.t as usize
    }

    /// Minimum number of keys in a non-root node: `t - 1`.
    #[must_use]
    pub const fn min_keys(self) -> usize {
        self.t as usize - 1
    }
}

impl std::fmt::Display for Degree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.t)
    }
}

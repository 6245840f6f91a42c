//! B-tree node types and the fixed-size record codec.
//!
//! Record layout (big-endian), written at the node's own location:
//! - `is_leaf`: 1 byte (1 = leaf, 0 = internal)
//! - `key_count`: 4 bytes
//! - `location`: 4 bytes
//! - `key_count` entries: key (8) + frequency (4) + status (4)
//! - `key_count + 1` child offsets: 4 bytes each
//! - `parent`: 4 bytes
//!
//! The slot is always `Degree::record_length()` bytes; the tail past the
//! parent offset is zero padding.

use crate::storage::btree::degree::{CHILD_SIZE, Degree, ENTRY_SIZE, NODE_METADATA_SIZE, PARENT_SIZE};

/// A file offset identifying a node record.
pub type Location = u32;

/// Parent value of the root, and of every unset child slot.
pub const NO_LOCATION: Location = 0;

/// Slot marker stored with every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum SlotStatus {
    /// Pre-allocation default of every slot.
    #[default]
    Empty = 0,
    /// Holds a real key.
    Occupied = 1,
    /// Reserved by the record format; never produced.
    Deleted = 2,
}

impl TryFrom<u32> for SlotStatus {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Empty),
            1 => Ok(Self::Occupied),
            2 => Ok(Self::Deleted),
            _ => Err(value),
        }
    }
}

/// One key slot inside a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry {
    /// Encoded k-mer.
    pub key: u64,
    /// Occurrence count.
    pub frequency: u32,
    /// Whether the slot holds a live key.
    pub status: SlotStatus,
}

impl Entry {
    /// An unused slot.
    pub const EMPTY: Self = Self {
        key: 0,
        frequency: 0,
        status: SlotStatus::Empty,
    };

    /// A freshly inserted key, seen once.
    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self {
            key,
            frequency: 1,
            status: SlotStatus::Occupied,
        }
    }

    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.status == SlotStatus::Occupied
    }

    /// Count one more occurrence of this key.
    pub const fn increment_frequency(&mut self) {
        self.frequency = self.frequency.saturating_add(1);
    }
}

/// A fixed-capacity B-tree node.
///
/// `entries` always holds `2t - 1` slots and `children` always holds `2t`
/// slots; only `entries[..key_count]` and `children[..=key_count]` are
/// meaningful. Slots past those bounds are kept reset to their empty values,
/// so the in-memory node always equals what decoding its record yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub is_leaf: bool,
    pub key_count: usize,
    pub entries: Vec<Entry>,
    pub children: Vec<Location>,
    pub parent: Location,
    pub location: Location,
}

impl Node {
    /// Create an empty leaf with every slot pre-reserved.
    #[must_use]
    pub fn new(degree: Degree) -> Self {
        Self {
            is_leaf: true,
            key_count: 0,
            entries: vec![Entry::EMPTY; degree.max_keys()],
            children: vec![NO_LOCATION; degree.max_children()],
            parent: NO_LOCATION,
            location: NO_LOCATION,
        }
    }

    /// Check if the node holds `2t - 1` keys.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.key_count == self.entries.len()
    }

    /// The meaningful entries.
    #[must_use]
    pub fn keys(&self) -> &[Entry] {
        &self.entries[..self.key_count]
    }

    /// The meaningful child offsets; empty for a leaf.
    #[must_use]
    pub fn child_locations(&self) -> &[Location] {
        if self.is_leaf {
            &[]
        } else {
            &self.children[..=self.key_count]
        }
    }

    /// Index of the entry holding exactly `key`.
    #[must_use]
    pub fn find(&self, key: u64) -> Option<usize> {
        self.keys().iter().position(|e| e.key == key)
    }

    /// Number of entries whose key is below `key`.
    ///
    /// For an internal node this is the index of the child to descend into.
    #[must_use]
    pub fn child_index(&self, key: u64) -> usize {
        let mut index = self.key_count;
        while index >= 1 && key < self.entries[index - 1].key {
            index -= 1;
        }
        index
    }

    /// Shrink to `len` keys, resetting the released slots.
    pub fn truncate(&mut self, len: usize) {
        self.entries[len..].fill(Entry::EMPTY);
        self.children[len + 1..].fill(NO_LOCATION);
        self.key_count = len;
    }

    /// Serialize into a record of exactly `degree.record_length()` bytes.
    #[must_use]
    pub fn encode(&self, degree: Degree) -> Vec<u8> {
        let mut buf = vec![0u8; degree.record_length() as usize];
        let mut offset = 0;

        buf[offset] = u8::from(self.is_leaf);
        offset += 1;

        #[allow(clippy::cast_possible_truncation)] // key_count <= 2t - 1 fits in u32
        put_u32(&mut buf, &mut offset, self.key_count as u32);
        put_u32(&mut buf, &mut offset, self.location);

        for entry in self.keys() {
            buf[offset..offset + 8].copy_from_slice(&entry.key.to_be_bytes());
            offset += 8;
            put_u32(&mut buf, &mut offset, entry.frequency);
            put_u32(&mut buf, &mut offset, entry.status as u32);
        }

        for &child in &self.children[..=self.key_count] {
            put_u32(&mut buf, &mut offset, child);
        }

        put_u32(&mut buf, &mut offset, self.parent);
        buf
    }

    /// Deserialize a record.
    ///
    /// Reads the fixed metadata, then exactly `key_count` entries and
    /// `key_count + 1` child offsets followed by the parent offset. Bytes
    /// after the parent offset are ignored.
    pub fn decode(bytes: &[u8], degree: Degree) -> Result<Self, NodeError> {
        if bytes.len() < NODE_METADATA_SIZE {
            return Err(NodeError::RecordTooShort {
                needed: NODE_METADATA_SIZE,
                actual: bytes.len(),
            });
        }

        let is_leaf = match bytes[0] {
            0 => false,
            1 => true,
            other => return Err(NodeError::InvalidLeafFlag(other)),
        };
        let mut offset = 1;
        let key_count = get_u32(bytes, &mut offset) as usize;
        let location = get_u32(bytes, &mut offset);

        if key_count > degree.max_keys() {
            return Err(NodeError::KeyCountOutOfRange {
                key_count,
                max: degree.max_keys(),
            });
        }

        let needed = NODE_METADATA_SIZE
            + key_count * ENTRY_SIZE
            + (key_count + 1) * CHILD_SIZE
            + PARENT_SIZE;
        if bytes.len() < needed {
            return Err(NodeError::RecordTooShort {
                needed,
                actual: bytes.len(),
            });
        }

        let mut node = Self::new(degree);
        node.is_leaf = is_leaf;
        node.key_count = key_count;
        node.location = location;

        for slot in &mut node.entries[..key_count] {
            let mut key = [0u8; 8];
            key.copy_from_slice(&bytes[offset..offset + 8]);
            offset += 8;
            let frequency = get_u32(bytes, &mut offset);
            let raw_status = get_u32(bytes, &mut offset);
            let status = SlotStatus::try_from(raw_status).map_err(NodeError::InvalidSlotStatus)?;

            *slot = Entry {
                key: u64::from_be_bytes(key),
                frequency,
                status,
            };
        }

        for slot in &mut node.children[..=key_count] {
            *slot = get_u32(bytes, &mut offset);
        }

        node.parent = get_u32(bytes, &mut offset);
        Ok(node)
    }
}

fn put_u32(buf: &mut [u8], offset: &mut usize, value: u32) {
    buf[*offset..*offset + 4].copy_from_slice(&value.to_be_bytes());
    *offset += 4;
}

fn get_u32(bytes: &[u8], offset: &mut usize) -> u32 {
    let value = u32::from_be_bytes([
        bytes[*offset],
        bytes[*offset + 1],
        bytes[*offset + 2],
        bytes[*offset + 3],
    ]);
    *offset += 4;
    value
}

/// Errors that can occur when decoding a node record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Leaf flag byte is neither 0 nor 1.
    InvalidLeafFlag(u8),
    /// More keys than the degree allows.
    KeyCountOutOfRange { key_count: usize, max: usize },
    /// Unknown slot status code.
    InvalidSlotStatus(u32),
    /// Record claims a different location than the one it was read from.
    LocationMismatch { expected: Location, found: Location },
    /// Not enough bytes for the fields `key_count` calls for.
    RecordTooShort { needed: usize, actual: usize },
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLeafFlag(v) => write!(f, "invalid leaf flag: {v}"),
            Self::KeyCountOutOfRange { key_count, max } => {
                write!(f, "key count {key_count} exceeds maximum {max}")
            }
            Self::InvalidSlotStatus(v) => write!(f, "invalid slot status: {v}"),
            Self::LocationMismatch { expected, found } => write!(
                f,
                "record read at {expected} claims location {found}"
            ),
            Self::RecordTooShort { needed, actual } => {
                write!(f, "record too short: need {needed} bytes, have {actual}")
            }
        }
    }
}

impl std::error::Error for NodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn degree(t: u32) -> Degree {
        Degree::new(t).expect("valid degree")
    }

    fn internal_node(t: u32, keys: &[u64]) -> Node {
        let mut node = Node::new(degree(t));
        node.is_leaf = false;
        node.location = 12;
        node.parent = 0;
        for (i, &key) in keys.iter().enumerate() {
            node.entries[i] = Entry {
                key,
                frequency: u32::try_from(i).expect("small index") + 1,
                status: SlotStatus::Occupied,
            };
        }
        node.key_count = keys.len();
        for i in 0..=keys.len() {
            node.children[i] = 100 + u32::try_from(i).expect("small index") * 77;
        }
        node
    }

    #[test]
    fn test_new_node_is_empty_leaf() {
        let node = Node::new(degree(3));
        assert!(node.is_leaf);
        assert_eq!(node.key_count, 0);
        assert_eq!(node.entries.len(), 5);
        assert_eq!(node.children.len(), 6);
        assert!(node.entries.iter().all(|e| e.status == SlotStatus::Empty));
        assert!(node.keys().is_empty());
        assert!(node.child_locations().is_empty());
    }

    #[test]
    fn test_encode_has_fixed_length() {
        let t = degree(3);
        let empty = Node::new(t);
        let full = internal_node(3, &[1, 2, 3, 4, 5]);

        assert_eq!(empty.encode(t).len(), 117);
        assert_eq!(full.encode(t).len(), 117);
    }

    #[test]
    fn test_encode_layout() {
        let t = degree(2);
        let mut node = Node::new(t);
        node.location = 12;
        node.parent = 89;
        node.entries[0] = Entry::new(0x0102);
        node.key_count = 1;

        let bytes = node.encode(t);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 1]);
        assert_eq!(&bytes[5..9], &[0, 0, 0, 12]);
        assert_eq!(&bytes[9..17], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&bytes[17..21], &[0, 0, 0, 1]); // frequency
        assert_eq!(&bytes[21..25], &[0, 0, 0, 1]); // occupied
        assert_eq!(&bytes[25..33], &[0u8; 8]); // two child slots
        assert_eq!(&bytes[33..37], &[0, 0, 0, 89]);
        assert!(bytes[37..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_roundtrip_every_key_count() {
        let t = degree(4);
        for count in 0..=t.max_keys() {
            let keys: Vec<u64> = (0..count as u64).map(|k| k * 1000 + 7).collect();
            let mut node = internal_node(4, &keys);
            node.parent = 4242;
            let restored = Node::decode(&node.encode(t), t).expect("should decode");
            assert_eq!(restored, node, "mismatch at key count {count}");
        }
    }

    #[test]
    fn test_roundtrip_leaf_with_large_keys() {
        let t = degree(2);
        let mut node = Node::new(t);
        node.location = 89;
        node.entries[0] = Entry {
            key: u64::MAX,
            frequency: u32::MAX,
            status: SlotStatus::Occupied,
        };
        node.key_count = 1;

        let restored = Node::decode(&node.encode(t), t).expect("should decode");
        assert_eq!(restored, node);
    }

    #[test]
    fn test_decode_ignores_padding() {
        let t = degree(3);
        let node = internal_node(3, &[10, 20]);
        let mut bytes = node.encode(t);
        let last = bytes.len() - 1;
        bytes[last] = 0xAB;

        let restored = Node::decode(&bytes, t).expect("should decode");
        assert_eq!(restored, node);
    }

    #[test]
    fn test_decode_rejects_bad_leaf_flag() {
        let t = degree(2);
        let mut bytes = Node::new(t).encode(t);
        bytes[0] = 7;
        assert_eq!(Node::decode(&bytes, t), Err(NodeError::InvalidLeafFlag(7)));
    }

    #[test]
    fn test_decode_rejects_key_count_overflow() {
        let t = degree(2);
        let mut bytes = Node::new(t).encode(t);
        bytes[1..5].copy_from_slice(&4u32.to_be_bytes());
        assert_eq!(
            Node::decode(&bytes, t),
            Err(NodeError::KeyCountOutOfRange {
                key_count: 4,
                max: 3
            })
        );
    }

    #[test]
    fn test_decode_rejects_bad_status() {
        let t = degree(2);
        let mut node = Node::new(t);
        node.entries[0] = Entry::new(5);
        node.key_count = 1;
        let mut bytes = node.encode(t);
        bytes[21..25].copy_from_slice(&9u32.to_be_bytes());
        assert_eq!(Node::decode(&bytes, t), Err(NodeError::InvalidSlotStatus(9)));
    }

    #[test]
    fn test_decode_rejects_short_record() {
        let t = degree(2);
        let node = internal_node(2, &[1, 2, 3]);
        let bytes = node.encode(t);
        let result = Node::decode(&bytes[..20], t);
        assert!(matches!(result, Err(NodeError::RecordTooShort { .. })));
    }

    #[test]
    fn test_find_and_child_index() {
        let node = internal_node(3, &[10, 20, 30]);

        assert_eq!(node.find(20), Some(1));
        assert_eq!(node.find(25), None);

        assert_eq!(node.child_index(5), 0);
        assert_eq!(node.child_index(15), 1);
        assert_eq!(node.child_index(25), 2);
        assert_eq!(node.child_index(35), 3);
        assert_eq!(node.child_locations().len(), 4);
    }

    #[test]
    fn test_truncate_resets_released_slots() {
        let mut node = internal_node(3, &[10, 20, 30, 40, 50]);
        assert!(node.is_full());

        node.truncate(2);
        assert_eq!(node.key_count, 2);
        assert!(!node.is_full());
        assert!(node.entries[2..].iter().all(|e| *e == Entry::EMPTY));
        assert!(node.children[3..].iter().all(|&c| c == NO_LOCATION));
        assert_eq!(node.children[2], 100 + 2 * 77);
    }

    #[test]
    fn test_entry_frequency() {
        let mut entry = Entry::new(42);
        assert!(entry.is_occupied());
        entry.increment_frequency();
        assert_eq!(entry.frequency, 2);

        entry.frequency = u32::MAX;
        entry.increment_frequency();
        assert_eq!(entry.frequency, u32::MAX);
        assert!(!Entry::EMPTY.is_occupied());
    }

    #[test]
    fn test_slot_status_conversion() {
        assert_eq!(SlotStatus::try_from(0), Ok(SlotStatus::Empty));
        assert_eq!(SlotStatus::try_from(1), Ok(SlotStatus::Occupied));
        assert_eq!(SlotStatus::try_from(2), Ok(SlotStatus::Deleted));
        assert_eq!(SlotStatus::try_from(3), Err(3));
    }
}

//! Graph entity identifiers
//!
//! Every vertex and edge id packs its label id into the upper 16 bits of a
//! signed 64-bit integer, leaving 48 bits for the per-label entry id. The
//! packing lets a label filter reduce to a shift instead of a join against
//! the label table.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

const ENTRY_BITS: u32 = 48;
const ENTRY_MASK: i64 = (1 << ENTRY_BITS) - 1;

/// Catalog id of a label within one graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub struct LabelId(pub i32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packed graph entity id: 16 bits of label id over 48 bits of entry id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub struct GraphId(i64);

impl GraphId {
    pub fn new(label: LabelId, entry: i64) -> Self {
        debug_assert!(entry <= ENTRY_MASK, "entry id overflows 48 bits");
        GraphId(((label.0 as i64) << ENTRY_BITS) | (entry & ENTRY_MASK))
    }

    /// The label id packed into the upper bits.
    pub fn label_id(self) -> LabelId {
        LabelId((self.0 >> ENTRY_BITS) as i32)
    }

    /// The per-label entry id in the lower 48 bits.
    pub fn entry_id(self) -> i64 {
        self.0 & ENTRY_MASK
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }

    pub fn from_i64(raw: i64) -> Self {
        GraphId(raw)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_label_and_entry() {
        let id = GraphId::new(LabelId(3), 42);
        assert_eq!(id.label_id(), LabelId(3));
        assert_eq!(id.entry_id(), 42);
    }

    #[test]
    fn round_trips_through_raw() {
        let id = GraphId::new(LabelId(7), 123_456);
        assert_eq!(GraphId::from_i64(id.as_i64()), id);
    }

    #[test]
    fn distinct_labels_never_collide() {
        let a = GraphId::new(LabelId(1), 5);
        let b = GraphId::new(LabelId(2), 5);
        assert_ne!(a, b);
    }
}

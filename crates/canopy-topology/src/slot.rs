//! Slot addressing.
//!
//! Each participant owns two upward slots (A and B), one per child, and one
//! downward slot written by its parent when the result is fanned back out.

use crate::Rank;

/// Identifies one slot in a participant's slot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlotId {
    /// Written by the odd-ranked child.
    A,
    /// Written by the even-ranked child.
    B,
    /// Written by the parent during fan-out.
    Parent,
}

impl SlotId {
    /// Upward slots in drain order.
    pub const CHILD_SLOTS: [SlotId; 2] = [SlotId::A, SlotId::B];

    /// The slot a child with relative rank `child` writes in its parent.
    ///
    /// Odd ranks are always left children and even ranks right children,
    /// so this matches the left/right position without depending on it.
    #[inline]
    pub const fn for_child(child: Rank) -> Self {
        if child % 2 == 0 {
            SlotId::B
        } else {
            SlotId::A
        }
    }

    /// Position in a slot array.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
            SlotId::Parent => 2,
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::Parent => write!(f, "Parent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_selects_slot() {
        assert_eq!(SlotId::for_child(1), SlotId::A);
        assert_eq!(SlotId::for_child(2), SlotId::B);
        assert_eq!(SlotId::for_child(3), SlotId::A);
        assert_eq!(SlotId::for_child(4), SlotId::B);
    }

    #[test]
    fn indices_are_distinct() {
        assert_eq!(SlotId::A.index(), 0);
        assert_eq!(SlotId::B.index(), 1);
        assert_eq!(SlotId::Parent.index(), 2);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", SlotId::A), "A");
        assert_eq!(format!("{}", SlotId::Parent), "Parent");
    }
}

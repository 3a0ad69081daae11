//! Canopy Tree Topology
//!
//! Maps a participant's physical id onto a virtual complete binary tree
//! rooted at an arbitrary participant.
//!
//! # Rank Rotation
//!
//! Every call picks a logical root. Instead of renumbering the cluster, each
//! participant rotates its physical id into a *relative rank*:
//!
//! ```text
//! rel_rank = (physical_id + root) mod N
//! ```
//!
//! The participant whose relative rank is 0 acts as the tree root.
//!
//! # Tree Edges
//!
//! Over relative ranks the tree is the usual heap layout:
//!
//! - `parent(r) = (r - 1) / 2` for `r > 0`
//! - `left(r)   = 2r + 1`
//! - `right(r)  = 2r + 2`
//!
//! A child exists iff its index is `< N`. Depth is `floor(log2(N))`.
//!
//! # Slot Parity
//!
//! A parent receives from its children through two slots. The slot a child
//! writes is chosen by the parity of the *child's own* relative rank (odd → A,
//! even → B), so the two children of a node can never collide.

mod error;
mod rank;
mod slot;

pub use error::{Result, TopologyError};
pub use rank::{
    left_child_of, parent_of, physical_id, relative_rank, right_child_of, Rank, RankTopology,
    Role,
};
pub use slot::SlotId;

/// Smallest cluster the tree protocol accepts.
pub const MIN_PARTICIPANTS: usize = 2;

/// Children per tree node.
pub const MAX_CHILDREN: usize = 2;

// A binary tree: one upward slot per child position.
const _: () = assert!(SlotId::CHILD_SLOTS.len() == MAX_CHILDREN);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_slots_cover_both_children() {
        assert_eq!(SlotId::CHILD_SLOTS, [SlotId::A, SlotId::B]);
        assert_eq!(SlotId::for_child(left_child_of(0)), SlotId::A);
        assert_eq!(SlotId::for_child(right_child_of(0)), SlotId::B);
    }

    #[test]
    fn minimum_cluster_is_accepted() {
        let root = RankTopology::new(0, 0, MIN_PARTICIPANTS).unwrap();
        assert_eq!(root.expected_child_count(), 1);
        assert!(RankTopology::new(0, 0, MIN_PARTICIPANTS - 1).is_err());
    }
}

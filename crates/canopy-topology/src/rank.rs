//! Rank rotation and tree position.
//!
//! All functions here are pure. [`RankTopology`] bundles them for one
//! participant and validates the inputs once.

use crate::error::{Result, TopologyError};
use crate::slot::SlotId;
use crate::MIN_PARTICIPANTS;

/// A participant rank, physical or relative.
pub type Rank = usize;

/// Rotate a physical id into a relative rank: `(physical + root) mod size`.
#[inline]
pub const fn relative_rank(physical: Rank, root: Rank, size: usize) -> Rank {
    (physical % size + root % size) % size
}

/// Inverse of [`relative_rank`]: the physical id holding relative rank `rel`.
#[inline]
pub const fn physical_id(rel: Rank, root: Rank, size: usize) -> Rank {
    (rel % size + size - root % size) % size
}

/// Parent of a non-root relative rank. Returns `None` for rank 0.
#[inline]
pub const fn parent_of(rel: Rank) -> Option<Rank> {
    if rel == 0 {
        None
    } else {
        Some((rel - 1) / 2)
    }
}

/// Left child index. May be `>= size`, in which case it does not exist.
#[inline]
pub const fn left_child_of(rel: Rank) -> Rank {
    2 * rel + 1
}

/// Right child index. May be `>= size`, in which case it does not exist.
#[inline]
pub const fn right_child_of(rel: Rank) -> Rank {
    2 * rel + 2
}

/// What a participant does during a gather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Role {
    /// Relative rank 0: drains children and assembles the output.
    Root,
    /// Has a parent and at least one child: drains, appends, forwards.
    Internal,
    /// No children: sends its own record straight to its parent.
    Leaf,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "Root"),
            Self::Internal => write!(f, "Internal"),
            Self::Leaf => write!(f, "Leaf"),
        }
    }
}

/// One participant's position in the virtual binary tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankTopology {
    physical_id: Rank,
    root: Rank,
    size: usize,
    rel_rank: Rank,
}

impl RankTopology {
    /// Place `physical_id` in the tree for a call rooted at `root`.
    ///
    /// # Errors
    ///
    /// - [`TopologyError::TooFewParticipants`] if `size < 2`
    /// - [`TopologyError::RootOutOfRange`] if `root >= size`
    /// - [`TopologyError::RankOutOfRange`] if `physical_id >= size`
    pub fn new(physical_id: Rank, root: Rank, size: usize) -> Result<Self> {
        if size < MIN_PARTICIPANTS {
            return Err(TopologyError::TooFewParticipants {
                size,
                min: MIN_PARTICIPANTS,
            });
        }
        if root >= size {
            return Err(TopologyError::RootOutOfRange { root, size });
        }
        if physical_id >= size {
            return Err(TopologyError::RankOutOfRange {
                id: physical_id,
                size,
            });
        }

        Ok(Self {
            physical_id,
            root,
            size,
            rel_rank: relative_rank(physical_id, root, size),
        })
    }

    /// Physical id this position was computed for.
    #[inline]
    pub const fn physical_id(&self) -> Rank {
        self.physical_id
    }

    /// Root parameter of the call.
    #[inline]
    pub const fn root(&self) -> Rank {
        self.root
    }

    /// Number of participants.
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Relative rank after rotation.
    #[inline]
    pub const fn rel_rank(&self) -> Rank {
        self.rel_rank
    }

    /// Physical id of the participant at relative rank 0.
    ///
    /// With the additive rotation this is `(size - root) mod size`, which is
    /// the `root` parameter itself only when `2 * root ≡ 0 (mod size)`.
    #[inline]
    pub const fn root_physical_id(&self) -> Rank {
        physical_id(0, self.root, self.size)
    }

    /// Relative rank of the parent, `None` at the root.
    #[inline]
    pub const fn parent(&self) -> Option<Rank> {
        parent_of(self.rel_rank)
    }

    /// Physical id of the parent, used to address remote invocations.
    pub fn parent_physical_id(&self) -> Option<Rank> {
        self.parent()
            .map(|parent| physical_id(parent, self.root, self.size))
    }

    /// Left child relative rank, `None` if it would be `>= size`.
    #[inline]
    pub fn left_child(&self) -> Option<Rank> {
        Some(left_child_of(self.rel_rank)).filter(|&c| c < self.size)
    }

    /// Right child relative rank, `None` if it would be `>= size`.
    #[inline]
    pub fn right_child(&self) -> Option<Rank> {
        Some(right_child_of(self.rel_rank)).filter(|&c| c < self.size)
    }

    /// Existing children in drain order (A, then B).
    pub fn children(&self) -> impl Iterator<Item = Rank> {
        self.left_child().into_iter().chain(self.right_child())
    }

    /// Existing children as `(relative rank, physical id)` pairs.
    pub fn children_physical(&self) -> impl Iterator<Item = (Rank, Rank)> {
        let (root, size) = (self.root, self.size);
        self.children()
            .map(move |child| (child, physical_id(child, root, size)))
    }

    /// Number of children: 0, 1 or 2.
    #[inline]
    pub const fn expected_child_count(&self) -> usize {
        (left_child_of(self.rel_rank) < self.size) as usize
            + (right_child_of(self.rel_rank) < self.size) as usize
    }

    /// No children.
    #[inline]
    pub const fn is_leaf(&self) -> bool {
        left_child_of(self.rel_rank) >= self.size && right_child_of(self.rel_rank) >= self.size
    }

    /// Relative rank 0.
    #[inline]
    pub const fn is_root(&self) -> bool {
        self.rel_rank == 0
    }

    /// Root, internal node or leaf.
    pub const fn role(&self) -> Role {
        if self.is_root() {
            Role::Root
        } else if self.is_leaf() {
            Role::Leaf
        } else {
            Role::Internal
        }
    }

    /// Slot this participant writes in its parent.
    #[inline]
    pub const fn upward_slot(&self) -> SlotId {
        SlotId::for_child(self.rel_rank)
    }

    /// Distance from the root in edges.
    pub const fn depth(&self) -> u32 {
        (self.rel_rank + 1).ilog2()
    }
}

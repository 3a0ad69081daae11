//! Pattern front-end.
//!
//! [`Gather`] selects the routing implementation from
//! [`GatherConfig::pattern`]. Only the binary tree exists today.

use canopy_codec::ElementCodec;
use canopy_runtime::{GlobalBarrier, ParticipantDirectory, RemoteInvoker};

use crate::config::{CommunicationPattern, GatherConfig};
use crate::error::Result;
use crate::node::GatherNode;
use crate::tree::{BinaryTreeGather, GatherContext, GatherReport};

/// A gather call bound to one participant.
pub enum Gather<'n, P, C> {
    /// Virtual complete binary tree.
    BinaryTree(BinaryTreeGather<'n, P, C>),
}

impl<'n, P, C> Gather<'n, P, C>
where
    P: ParticipantDirectory + RemoteInvoker + GlobalBarrier,
    C: ElementCodec,
    C::Element: Clone,
{
    /// Build the implementation named by `config.pattern`.
    pub fn new(node: &'n GatherNode<P>, config: GatherConfig, codec: C) -> Result<Self> {
        match config.pattern {
            CommunicationPattern::BinaryTree => {
                Ok(Self::BinaryTree(BinaryTreeGather::new(node, config, codec)?))
            }
        }
    }

    /// Pattern in use.
    pub fn pattern(&self) -> CommunicationPattern {
        match self {
            Self::BinaryTree(_) => CommunicationPattern::BinaryTree,
        }
    }

    /// Per-call state of this participant.
    pub fn context(&self) -> &GatherContext {
        match self {
            Self::BinaryTree(tree) => tree.context(),
        }
    }

    /// Contribute `input`; see [`BinaryTreeGather::gather`].
    pub async fn gather(&self, input: &[C::Element], output: &mut [C::Element]) -> Result<GatherReport> {
        match self {
            Self::BinaryTree(tree) => tree.gather(input, output).await,
        }
    }
}

//! Gather configuration.
//!
//! Every participant of a call must build an identical configuration; none
//! of these values are exchanged or cross-checked.

use std::time::Duration;

use canopy_topology::Rank;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::slots::{WaitPolicy, WaitStrategy};

/// Whether `gather` waits for every participant before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockingPolicy {
    /// Enter a global barrier after the merge.
    #[default]
    Blocking,
    /// Return as soon as the local part of the protocol is done.
    NonBlocking,
}

/// Communication pattern used to route contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommunicationPattern {
    /// Virtual complete binary tree over rotated ranks.
    #[default]
    BinaryTree,
}

/// What the root does with its own input segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RootSegment {
    /// Copy the root's input to its own offset before merging.
    #[default]
    Seed,
    /// Leave the root's offset untouched.
    Omit,
}

/// Which participants end up with the assembled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// Only the root's output buffer is written.
    #[default]
    RootOnly,
    /// The root fans the result back down the tree to every participant.
    AllParticipants,
}

/// Configuration for one gather call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherConfig {
    /// Root parameter fed into the rank rotation.
    pub root: Rank,

    /// Globally unique name of this call's slot stores.
    pub registration_name: String,

    /// Post-merge synchronization.
    pub blocking: BlockingPolicy,

    /// Routing pattern.
    pub pattern: CommunicationPattern,

    /// How drains wait.
    pub wait_strategy: WaitStrategy,

    /// Deadline per drain. `None` waits forever.
    pub drain_timeout: Option<Duration>,

    /// Treatment of the root's own segment.
    pub root_segment: RootSegment,

    /// Where the output becomes visible.
    pub visibility: Visibility,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self::new("canopy/gather")
    }
}

impl GatherConfig {
    /// Create a config registered under `registration_name` with defaults.
    #[must_use]
    pub fn new(registration_name: impl Into<String>) -> Self {
        Self {
            root: 0,
            registration_name: registration_name.into(),
            blocking: BlockingPolicy::default(),
            pattern: CommunicationPattern::default(),
            wait_strategy: WaitStrategy::default(),
            drain_timeout: None,
            root_segment: RootSegment::default(),
            visibility: Visibility::default(),
        }
    }

    /// Set the root parameter.
    #[must_use]
    pub fn with_root(mut self, root: Rank) -> Self {
        self.root = root;
        self
    }

    /// Set the blocking policy.
    #[must_use]
    pub fn with_blocking(mut self, blocking: BlockingPolicy) -> Self {
        self.blocking = blocking;
        self
    }

    /// Return without waiting for the other participants.
    #[must_use]
    pub fn non_blocking(self) -> Self {
        self.with_blocking(BlockingPolicy::NonBlocking)
    }

    /// Set the wait strategy.
    #[must_use]
    pub fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Fail drains that wait longer than `timeout`.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }

    /// Let drains wait forever.
    #[must_use]
    pub fn without_drain_timeout(mut self) -> Self {
        self.drain_timeout = None;
        self
    }

    /// Set the treatment of the root's segment.
    #[must_use]
    pub fn with_root_segment(mut self, root_segment: RootSegment) -> Self {
        self.root_segment = root_segment;
        self
    }

    /// Set where the output becomes visible.
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Wait policy applied to every drain.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            strategy: self.wait_strategy,
            timeout: self.drain_timeout,
        }
    }

    /// Name of the completion barrier for this call.
    pub fn barrier_name(&self) -> String {
        format!("{}/wait_for_completion", self.registration_name)
    }

    /// Build a config from `CANOPY_*` environment variables.
    ///
    /// | Variable                  | Values                     |
    /// |---------------------------|----------------------------|
    /// | `CANOPY_ROOT`             | integer                    |
    /// | `CANOPY_BLOCKING`         | `1`/`true`/`blocking`, `0`/`false`/`non_blocking` |
    /// | `CANOPY_WAIT`             | `spin`, `park`             |
    /// | `CANOPY_DRAIN_TIMEOUT_MS` | integer milliseconds       |
    /// | `CANOPY_ROOT_SEGMENT`     | `seed`, `omit`             |
    /// | `CANOPY_VISIBILITY`       | `root`, `all`              |
    pub fn from_env(registration_name: impl Into<String>) -> Result<Self> {
        Self::from_lookup(registration_name, |key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys keep defaults.
    pub fn from_lookup<F>(registration_name: impl Into<String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(registration_name);

        if let Some(root) = lookup("CANOPY_ROOT") {
            config.root = root
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("CANOPY_ROOT: not a rank: {root:?}")))?;
        }

        if let Some(blocking) = lookup("CANOPY_BLOCKING") {
            config.blocking = match blocking.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "blocking" => BlockingPolicy::Blocking,
                "0" | "false" | "non_blocking" | "nonblocking" => BlockingPolicy::NonBlocking,
                other => return Err(Error::Config(format!("CANOPY_BLOCKING: unknown policy {other:?}"))),
            };
        }

        if let Some(wait) = lookup("CANOPY_WAIT") {
            config.wait_strategy = match wait.trim().to_ascii_lowercase().as_str() {
                "spin" => WaitStrategy::Spin,
                "park" => WaitStrategy::Park,
                other => return Err(Error::Config(format!("CANOPY_WAIT: unknown strategy {other:?}"))),
            };
        }

        if let Some(timeout) = lookup("CANOPY_DRAIN_TIMEOUT_MS") {
            let millis: u64 = timeout
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("CANOPY_DRAIN_TIMEOUT_MS: not a number: {timeout:?}")))?;
            config.drain_timeout = Some(Duration::from_millis(millis));
        }

        if let Some(segment) = lookup("CANOPY_ROOT_SEGMENT") {
            config.root_segment = match segment.trim().to_ascii_lowercase().as_str() {
                "seed" => RootSegment::Seed,
                "omit" => RootSegment::Omit,
                other => return Err(Error::Config(format!("CANOPY_ROOT_SEGMENT: unknown mode {other:?}"))),
            };
        }

        if let Some(visibility) = lookup("CANOPY_VISIBILITY") {
            config.visibility = match visibility.trim().to_ascii_lowercase().as_str() {
                "root" => Visibility::RootOnly,
                "all" => Visibility::AllParticipants,
                other => return Err(Error::Config(format!("CANOPY_VISIBILITY: unknown mode {other:?}"))),
            };
        }

        Ok(config)
    }
}

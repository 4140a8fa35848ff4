use derive_more::{Add, AddAssign, Sub};
use std::fmt::{Display, Formatter};

/// `TimeToLive` (hop distance) newtype.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, Add, Sub, AddAssign,
)]
pub struct TimeToLive(pub u8);

/// `FlowKey` newtype.
///
/// The flow-identifying key carried by a probe.  A per-flow load balancer
/// keeps all probes with the same key on a single path, and so the same key
/// observed at consecutive hop distances identifies a link between the
/// replying interfaces.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, Add, AddAssign,
)]
pub struct FlowKey(pub u16);

/// `NodeId` newtype.
///
/// A handle into the lattice node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub usize);

/// `MaxBranch` newtype.
///
/// The maximum number of probes which may be simultaneously in flight for a
/// single hop distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct MaxBranch(pub u8);

impl Display for TimeToLive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for FlowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NodeId> for usize {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

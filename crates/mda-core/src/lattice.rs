use crate::error::{Error, Result};
use crate::types::{NodeId, TimeToLive};
use indexmap::IndexSet;
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// A single interface in the lattice.
///
/// One node exists per distinct interface observed at a given hop distance.
/// Immutable once created, except for the count of probes which resolved to
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    ttl: TimeToLive,
    addr: IpAddr,
    probes: usize,
}

impl Node {
    /// The handle of this node.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// The hop distance at which the interface replied.
    #[must_use]
    pub const fn ttl(&self) -> TimeToLive {
        self.ttl
    }

    /// The address of the interface.
    #[must_use]
    pub const fn addr(&self) -> IpAddr {
        self.addr
    }

    /// The number of probes which resolved to this interface.
    #[must_use]
    pub const fn probes(&self) -> usize {
        self.probes
    }
}

/// The append-only acyclic graph of discovered interfaces and links.
///
/// Nodes live in a flat arena addressed by [`NodeId`] and partitioned by hop
/// distance; links are stored as ordered pairs of node handles.  Every link
/// strictly increases hop distance, which makes the graph acyclic by
/// construction.
#[derive(Debug, Clone, Default)]
pub struct Lattice {
    /// Node arena, in discovery order.
    nodes: Vec<Node>,
    /// Interface to node handle lookup.
    index: HashMap<(TimeToLive, IpAddr), NodeId>,
    /// Links, in discovery order.
    links: IndexSet<(NodeId, NodeId)>,
    /// Hop distances which never produced a reply.
    gaps: BTreeSet<TimeToLive>,
}

impl Lattice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interface observed at a hop distance.
    ///
    /// Idempotent: if the interface was already seen at that hop the
    /// existing node handle is returned.
    pub fn add_node(&mut self, ttl: TimeToLive, addr: IpAddr) -> NodeId {
        if let Some(id) = self.index.get(&(ttl, addr)) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            ttl,
            addr,
            probes: 0,
        });
        self.index.insert((ttl, addr), id);
        tracing::debug!(%ttl, %addr, ?id, "new interface");
        id
    }

    /// Count one more probe as having resolved to the given node.
    pub fn record_probe(&mut self, id: NodeId) {
        self.nodes[id.0].probes += 1;
    }

    /// Record a link between two discovered interfaces.
    ///
    /// Returns `false`, and is a no-op, if the link already exists.  Fails
    /// fast if the link does not strictly increase hop distance, leaving the
    /// lattice unchanged.
    pub fn add_link(&mut self, src: NodeId, dst: NodeId) -> Result<bool> {
        let (src_node, dst_node) = (&self.nodes[src.0], &self.nodes[dst.0]);
        if dst_node.ttl <= src_node.ttl {
            return Err(Error::LatticeOrderingViolation {
                src: src_node.addr,
                src_ttl: src_node.ttl,
                dst: dst_node.addr,
                dst_ttl: dst_node.ttl,
            });
        }
        Ok(self.links.insert((src, dst)))
    }

    /// Mark a hop distance as unresponsive.
    pub fn record_gap(&mut self, ttl: TimeToLive) {
        self.gaps.insert(ttl);
    }

    /// Was the hop distance unresponsive?
    #[must_use]
    pub fn is_gap(&self, ttl: TimeToLive) -> bool {
        self.gaps.contains(&ttl)
    }

    /// The unresponsive hop distances, in order.
    pub fn gaps(&self) -> impl Iterator<Item = TimeToLive> + '_ {
        self.gaps.iter().copied()
    }

    /// The node for a given handle.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// All nodes at a hop distance, in discovery order.
    pub fn nodes_at(&self, ttl: TimeToLive) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |node| node.ttl == ttl)
    }

    /// The number of nodes in the lattice.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The number of links in the lattice.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// All links as node pairs, in discovery order.
    pub fn links(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.links
            .iter()
            .map(|&(src, dst)| (&self.nodes[src.0], &self.nodes[dst.0]))
    }

    /// A lazy traversal of all nodes, ordered by hop distance and then by
    /// discovery order.
    pub fn dump(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().sorted_by_key(|node| (node.ttl, node.id))
    }

    /// The range of hop distances covered by the lattice, if any.
    fn ttl_range(&self) -> Option<(TimeToLive, TimeToLive)> {
        let ttls = self
            .nodes
            .iter()
            .map(Node::ttl)
            .chain(self.gaps.iter().copied());
        match ttls.minmax() {
            itertools::MinMaxResult::NoElements => None,
            itertools::MinMaxResult::OneElement(ttl) => Some((ttl, ttl)),
            itertools::MinMaxResult::MinMax(min, max) => Some((min, max)),
        }
    }
}

impl Display for Lattice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some((first, last)) = self.ttl_range() else {
            return f.write_str("empty lattice");
        };
        for distance in first.0..=last.0 {
            let line = self
                .nodes_at(TimeToLive(distance))
                .map(|node| format!("{} ({})", node.addr, node.probes))
                .join(", ");
            if line.is_empty() {
                writeln!(f, "{distance:>3}: *")?;
            } else {
                writeln!(f, "{distance:>3}: {line}")?;
            }
        }
        for (src, dst) in self.links() {
            writeln!(f, "{} -> {}", src.addr, dst.addr)?;
        }
        Ok(())
    }
}

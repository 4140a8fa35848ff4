use crate::config::MdaConfig;
use crate::probe::Probe;
use crate::stopping::required_probes;
use crate::types::{FlowKey, TimeToLive};
use indexmap::{IndexMap, IndexSet};
use std::net::IpAddr;
use std::time::SystemTime;

/// The probing lifecycle of a single hop distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopPhase {
    /// Created but not yet probed.
    Pending,
    /// Actively probing.
    Probing,
    /// The stopping rule is satisfied; no further probes are issued.
    Stable,
    /// The retry budget was exhausted without a single reply.
    Gap,
}

/// Probing state for a single hop distance.
///
/// Owns the outstanding probes for the hop and decides, via the stopping
/// rule, how many more probes are needed.  The phase only ever moves
/// forward: `Pending -> Probing -> Stable | Gap`.
#[derive(Debug, Clone)]
pub struct HopProber {
    ttl: TimeToLive,
    phase: HopPhase,
    /// The flow key for the next probe at this hop.
    next_flow_key: FlowKey,
    /// Probes dispatched, including failed and replaced ones.
    sent: usize,
    /// Replies accepted.
    received: usize,
    /// Consecutive timeouts without an intervening reply.
    unanswered: u8,
    /// Dispatch failures at this hop.
    failed: u8,
    /// Probes awaiting a reply or timeout, by flow key.
    outstanding: IndexMap<FlowKey, Probe>,
    /// Distinct interfaces observed, in discovery order.
    interfaces: IndexSet<IpAddr>,
}

impl HopProber {
    pub fn new(ttl: TimeToLive, initial_flow_key: FlowKey) -> Self {
        Self {
            ttl,
            phase: HopPhase::Pending,
            next_flow_key: initial_flow_key,
            sent: 0,
            received: 0,
            unanswered: 0,
            failed: 0,
            outstanding: IndexMap::new(),
            interfaces: IndexSet::new(),
        }
    }

    pub const fn ttl(&self) -> TimeToLive {
        self.ttl
    }

    pub const fn phase(&self) -> HopPhase {
        self.phase
    }

    pub const fn sent(&self) -> usize {
        self.sent
    }

    pub const fn received(&self) -> usize {
        self.received
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self.phase, HopPhase::Stable | HopPhase::Gap)
    }

    /// The number of probes to dispatch now.
    ///
    /// The deficit against the stopping rule is `need - received -
    /// outstanding`, so that a timeout re-opens the deficit and is naturally
    /// replaced by a fresh probe.  The batch is further capped so that the
    /// probes in flight never exceed `max_branch` and the total dispatched
    /// never exceeds the per-hop budget.
    pub fn probes_wanted(&self, config: &MdaConfig) -> usize {
        if self.is_terminal() {
            return 0;
        }
        let need = required_probes(config.bound, self.interfaces.len());
        let covered = self.received + self.outstanding.len();
        let deficit = need.saturating_sub(covered);
        let branch_room =
            usize::from(config.max_branch.0).saturating_sub(self.outstanding.len());
        let budget_room = config.max_probes.saturating_sub(self.sent);
        deficit.min(branch_room).min(budget_room)
    }

    /// Create and register the next probe for this hop.
    pub fn next_probe(&mut self, sent: SystemTime) -> Probe {
        if self.phase == HopPhase::Pending {
            self.phase = HopPhase::Probing;
        }
        let probe = Probe::new(self.ttl, self.next_flow_key, sent);
        self.outstanding.insert(probe.flow_key, probe);
        self.next_flow_key += FlowKey(1);
        self.sent += 1;
        probe
    }

    /// Roll back a probe whose dispatch failed.
    ///
    /// The hop becomes a gap once the retry budget is exhausted without any
    /// reply.
    pub fn fail_probe(&mut self, flow_key: FlowKey, max_unanswered: u8) {
        self.outstanding.shift_remove(&flow_key);
        self.failed = self.failed.saturating_add(1);
        if self.phase == HopPhase::Probing && self.received == 0 && self.failed >= max_unanswered
        {
            self.phase = HopPhase::Gap;
            tracing::debug!(ttl = %self.ttl, "dispatch retry budget exhausted");
        }
    }

    /// Remove and return the outstanding probe for a flow key, if any.
    pub fn take_outstanding(&mut self, flow_key: FlowKey) -> Option<Probe> {
        self.outstanding.shift_remove(&flow_key)
    }

    /// Record an accepted reply.
    ///
    /// Returns true if the interface is newly observed at this hop.
    pub fn on_reply(&mut self, addr: IpAddr) -> bool {
        self.received += 1;
        self.unanswered = 0;
        self.interfaces.insert(addr)
    }

    /// Record a timeout for a probe at this hop.
    pub fn on_timeout(&mut self, max_unanswered: u8) {
        self.unanswered = self.unanswered.saturating_add(1);
        if self.phase == HopPhase::Probing
            && self.received == 0
            && self.unanswered >= max_unanswered
        {
            self.phase = HopPhase::Gap;
            tracing::debug!(ttl = %self.ttl, "unanswered retry budget exhausted");
        }
    }

    /// Re-evaluate the stopping rule at the end of a probing round.
    ///
    /// A round ends when no probes remain outstanding.  The hop becomes
    /// stable once the replies received satisfy the stopping rule for the
    /// current interface count: a new interface discovered during the round
    /// raises `required_probes` and so re-opens the deficit, which is what
    /// forces a further round.  A hop which exhausts its probe budget is
    /// forced stable if it ever replied and is a gap otherwise.
    pub fn check_stable(&mut self, config: &MdaConfig) {
        if self.phase != HopPhase::Probing || !self.outstanding.is_empty() {
            return;
        }
        if self.received == 0 {
            if self.sent >= config.max_probes {
                self.phase = HopPhase::Gap;
                tracing::debug!(ttl = %self.ttl, sent = self.sent, "probe budget exhausted without reply");
            }
            return;
        }
        let need = required_probes(config.bound, self.interfaces.len());
        if self.received >= need || self.sent >= config.max_probes {
            self.phase = HopPhase::Stable;
            tracing::debug!(ttl = %self.ttl, interfaces = self.interfaces.len(), sent = self.sent, "hop stable");
        }
    }

    /// Discard all outstanding probes.
    pub fn clear_outstanding(&mut self) {
        self.outstanding.clear();
    }
}

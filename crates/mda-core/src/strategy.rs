use self::state::MdaState;
use crate::config::MdaConfig;
use crate::correlate::Correlation;
use crate::error::{Error, Result};
use crate::lattice::Lattice;
use crate::net::Network;
use crate::probe::{EnrichedReply, Probe};
use crate::types::{FlowKey, TimeToLive};
use std::net::IpAddr;
use std::time::SystemTime;
use tracing::instrument;

/// A link newly recorded in the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLink {
    /// The interface at the near end.
    pub source: IpAddr,
    /// The interface at the far end.
    pub dest: IpAddr,
    /// The hop distance of the far end.
    pub ttl: TimeToLive,
}

/// An event published during multipath discovery.
#[derive(Debug)]
pub enum MdaEvent<'a> {
    /// A link between two interfaces was recorded for the first time.
    NewLink(NewLink),
    /// A reply was matched to a probe and processed.
    ReplyProcessed(EnrichedReply),
    /// A probe went unanswered.
    ProbeUnanswered {
        ttl: TimeToLive,
        flow_key: FlowKey,
    },
    /// The algorithm ended; carries the completed lattice.
    Ends(&'a Lattice),
}

/// Discover the multipath topology towards a target.
#[derive(Debug, Clone)]
pub struct MdaStrategy<F> {
    config: MdaConfig,
    publish: F,
}

impl<F: Fn(MdaEvent<'_>)> MdaStrategy<F> {
    #[instrument(skip_all, level = "trace")]
    pub fn new(config: &MdaConfig, publish: F) -> Self {
        tracing::debug!(?config);
        Self {
            config: *config,
            publish,
        }
    }

    /// Run the discovery to completion and return the final lattice.
    ///
    /// Hops are probed from the configured first hop distance; each hop
    /// which reaches a terminal phase activates the next, until the target
    /// replies, the maximum hop distance is exhausted or too many
    /// consecutive hops are unresponsive.  Once ended, no further probes are
    /// issued and the in-flight probes are allowed to drain before the
    /// `Ends` event is published.
    #[instrument(skip(self, network), level = "trace")]
    pub fn run<N: Network>(self, mut network: N) -> Result<Lattice> {
        let mut st = MdaState::new(self.config);
        while !st.finished() {
            self.send_requests(&mut network, &mut st)?;
            self.recv_event(&mut network, &mut st)?;
            st.advance();
        }
        let lattice = st.into_lattice();
        (self.publish)(MdaEvent::Ends(&lattice));
        Ok(lattice)
    }

    /// Send the next batch of probes for every hop which wants them.
    ///
    /// A hop wants probes when all the following are true:
    ///
    /// 1 - the algorithm has not ended
    /// 2 - the hop is not in a terminal phase
    /// 3 - the replies received and probes in flight do not yet satisfy the
    ///     stopping rule for the interfaces observed so far
    /// 4 - the in-flight and per-hop budget caps are not exceeded
    fn send_requests<N: Network>(&self, network: &mut N, st: &mut MdaState) -> Result<()> {
        if st.ended() {
            return Ok(());
        }
        for ttl in st.active_hops() {
            while st.probes_wanted(ttl) > 0 {
                let Some(probe) = st.next_probe(ttl, SystemTime::now()) else {
                    break;
                };
                Self::do_send(network, st, probe)?;
            }
        }
        Ok(())
    }

    /// Send the probe and handle errors.
    ///
    /// A dispatch failure is transient and recovered locally: the probe is
    /// rolled back and retried on a later cycle, up to the hop's retry
    /// budget.  Any other error is fatal.
    #[instrument(skip(network, st), level = "trace")]
    fn do_send<N: Network>(network: &mut N, st: &mut MdaState, probe: Probe) -> Result<()> {
        match network.send_probe(probe) {
            Ok(()) => Ok(()),
            Err(Error::ProbeDispatch(reason)) => {
                tracing::debug!(ttl = %probe.ttl, flow_key = %probe.flow_key, %reason, "probe dispatch failed");
                st.fail_probe(probe.ttl, probe.flow_key);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Read and process the next inbound event.
    ///
    /// Events are correlated to outstanding probes strictly in delivery
    /// order; duplicate and unmatched events are discarded.  A matched reply
    /// updates the lattice and may record links, each published as a
    /// `NewLink` before the `ReplyProcessed` event for the reply itself.
    ///
    /// An `Aborted` error requests early termination: probing stops and the
    /// in-flight probes drain.  A second `Aborted` while draining discards
    /// the remaining probes.
    fn recv_event<N: Network>(&self, network: &mut N, st: &mut MdaState) -> Result<()> {
        let next = match network.recv_event() {
            Ok(next) => next,
            Err(Error::Aborted) => {
                if st.aborted() {
                    st.drop_outstanding();
                } else {
                    st.abort();
                }
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let Some(resp) = next else {
            return Ok(());
        };
        match st.correlate(resp) {
            Correlation::Reply(reply) => {
                let links = st.apply_reply(&reply)?;
                for link in links {
                    (self.publish)(MdaEvent::NewLink(link));
                }
                (self.publish)(MdaEvent::ReplyProcessed(reply));
            }
            Correlation::Timeout(probe) => {
                st.apply_timeout(&probe);
                (self.publish)(MdaEvent::ProbeUnanswered {
                    ttl: probe.ttl,
                    flow_key: probe.flow_key,
                });
            }
            Correlation::Duplicate | Correlation::Unmatched => {}
        }
        Ok(())
    }
}

/// Mutable state needed for the multipath detection algorithm.
///
/// This is contained within a submodule to ensure that mutations are only performed via methods on
/// the `MdaState` struct.
mod state {
    use super::NewLink;
    use crate::config::MdaConfig;
    use crate::correlate::{Correlation, Correlator};
    use crate::error::Result;
    use crate::hop::{HopPhase, HopProber};
    use crate::lattice::Lattice;
    use crate::probe::{EnrichedReply, Probe, Response};
    use crate::types::{FlowKey, NodeId, TimeToLive};
    use std::collections::{BTreeMap, HashMap};
    use std::time::SystemTime;
    use tracing::instrument;

    /// Mutable state needed for the multipath detection algorithm.
    #[derive(Debug)]
    pub struct MdaState {
        /// Tracer configuration.
        config: MdaConfig,
        /// The topology discovered so far.
        lattice: Lattice,
        /// Per-hop probing state, retained until the algorithm ends.
        hops: BTreeMap<TimeToLive, HopProber>,
        /// Matches inbound events to outstanding probes.
        correlator: Correlator,
        /// The node each (hop, flow key) pair resolved to, for link
        /// inference across consecutive hops.
        flow_nodes: HashMap<(TimeToLive, FlowKey), NodeId>,
        /// Consecutive gap hops at the frontier.
        gap_run: u8,
        /// Did the target address appear as a reply source?
        target_found: bool,
        /// Was early termination requested?
        aborted: bool,
        /// No further probes will be issued.
        ended: bool,
    }

    impl MdaState {
        pub fn new(config: MdaConfig) -> Self {
            let hops = BTreeMap::from([(
                config.first_ttl,
                HopProber::new(config.first_ttl, config.initial_flow_key),
            )]);
            Self {
                config,
                lattice: Lattice::new(),
                hops,
                correlator: Correlator::new(),
                flow_nodes: HashMap::new(),
                gap_run: 0,
                target_found: false,
                aborted: false,
                ended: false,
            }
        }

        pub const fn ended(&self) -> bool {
            self.ended
        }

        pub const fn aborted(&self) -> bool {
            self.aborted
        }

        /// The hop distances still being probed.
        pub fn active_hops(&self) -> Vec<TimeToLive> {
            self.hops
                .values()
                .filter(|hop| !hop.is_terminal())
                .map(HopProber::ttl)
                .collect()
        }

        /// The number of probes in flight across all hops.
        pub fn outstanding(&self) -> usize {
            self.hops.values().map(HopProber::outstanding_len).sum()
        }

        /// All work done and nothing left in flight?
        pub fn finished(&self) -> bool {
            self.ended && self.outstanding() == 0
        }

        pub fn probes_wanted(&self, ttl: TimeToLive) -> usize {
            self.hops
                .get(&ttl)
                .map_or(0, |hop| hop.probes_wanted(&self.config))
        }

        pub fn next_probe(&mut self, ttl: TimeToLive, sent: SystemTime) -> Option<Probe> {
            self.hops.get_mut(&ttl).map(|hop| hop.next_probe(sent))
        }

        pub fn fail_probe(&mut self, ttl: TimeToLive, flow_key: FlowKey) {
            if let Some(hop) = self.hops.get_mut(&ttl) {
                hop.fail_probe(flow_key, self.config.max_unanswered);
                hop.check_stable(&self.config);
            }
        }

        /// Request early termination: stop probing but let in-flight probes
        /// drain.
        #[instrument(skip(self), level = "trace")]
        pub fn abort(&mut self) {
            tracing::debug!("abort requested");
            self.aborted = true;
            self.ended = true;
        }

        /// Discard all in-flight probes.
        pub fn drop_outstanding(&mut self) {
            for hop in self.hops.values_mut() {
                hop.clear_outstanding();
            }
        }

        pub fn correlate(&mut self, resp: Response) -> Correlation {
            self.correlator.correlate(resp, &mut self.hops)
        }

        /// Apply a matched reply.
        ///
        /// The replying interface is merged into the lattice, the flow is
        /// recorded and any link the flow reveals to the neighbouring hops
        /// is inserted, handling out-of-order resolution in either
        /// direction.  Finding the target address ends the algorithm.
        #[instrument(skip(self, reply), level = "trace")]
        pub fn apply_reply(&mut self, reply: &EnrichedReply) -> Result<Vec<NewLink>> {
            let ttl = reply.probe.ttl;
            let flow_key = reply.probe.flow_key;
            if let Some(hop) = self.hops.get_mut(&ttl) {
                hop.on_reply(reply.addr);
            }
            let id = self.lattice.add_node(ttl, reply.addr);
            self.lattice.record_probe(id);
            self.flow_nodes.insert((ttl, flow_key), id);
            let mut links = Vec::new();
            if ttl > self.config.first_ttl {
                if let Some(&prev) = self.flow_nodes.get(&(ttl - TimeToLive(1), flow_key)) {
                    if self.lattice.add_link(prev, id)? {
                        links.push(self.new_link(prev, id));
                    }
                }
            }
            if let Some(&next) = self.flow_nodes.get(&(ttl + TimeToLive(1), flow_key)) {
                if self.lattice.add_link(id, next)? {
                    links.push(self.new_link(id, next));
                }
            }
            if reply.addr == self.config.target_addr && !self.target_found {
                self.target_found = true;
                self.ended = true;
                tracing::debug!(addr = %reply.addr, %ttl, "target found");
            }
            if let Some(hop) = self.hops.get_mut(&ttl) {
                hop.check_stable(&self.config);
            }
            Ok(links)
        }

        /// Apply a matched timeout.
        pub fn apply_timeout(&mut self, probe: &Probe) {
            if let Some(hop) = self.hops.get_mut(&probe.ttl) {
                hop.on_timeout(self.config.max_unanswered);
                hop.check_stable(&self.config);
            }
        }

        /// Advance the frontier.
        ///
        /// When the deepest hop reaches a terminal phase, either activate
        /// the next hop distance or end the algorithm: the target was found,
        /// the maximum hop distance is exhausted or too many consecutive
        /// hops were unresponsive.
        #[instrument(skip(self), level = "trace")]
        pub fn advance(&mut self) {
            if self.ended {
                return;
            }
            let Some((&frontier, hop)) = self.hops.last_key_value() else {
                return;
            };
            if !hop.is_terminal() {
                return;
            }
            if hop.phase() == HopPhase::Gap {
                self.gap_run += 1;
                self.lattice.record_gap(frontier);
                tracing::debug!(ttl = %frontier, "hop is a gap");
            } else {
                self.gap_run = 0;
            }
            if self.gap_run >= self.config.max_undiscovered {
                tracing::debug!("too many consecutive unresponsive hops");
                self.ended = true;
            } else if frontier >= self.config.max_ttl {
                tracing::debug!("max ttl exhausted");
                self.ended = true;
            } else {
                let next = frontier + TimeToLive(1);
                self.hops
                    .insert(next, HopProber::new(next, self.config.initial_flow_key));
                tracing::debug!(ttl = %next, "hop activated");
            }
        }

        pub fn into_lattice(self) -> Lattice {
            self.lattice
        }

        fn new_link(&self, src: NodeId, dst: NodeId) -> NewLink {
            let (src, dst) = (self.lattice.node(src), self.lattice.node(dst));
            NewLink {
                source: src.addr(),
                dest: dst.addr(),
                ttl: dst.ttl(),
            }
        }
    }
}

use crate::hop::HopProber;
use crate::probe::{EnrichedReply, Probe, Response};
use crate::types::{FlowKey, TimeToLive};
use std::collections::{BTreeMap, HashSet};

/// The classification of an inbound network event.
#[derive(Debug)]
pub enum Correlation {
    /// The first reply matched to an outstanding probe.
    Reply(EnrichedReply),
    /// A timeout matched to an outstanding probe.
    Timeout(Probe),
    /// An event for a probe which was already matched, discarded.
    Duplicate,
    /// An event with no corresponding probe, discarded.
    Unmatched,
}

/// Matches inbound reply and timeout events to outstanding probes.
///
/// Unmatched events are not errors: the network layer may deliver late or
/// duplicate signals.  A probe is matched at most once; any further event
/// for the same probe is discarded.
#[derive(Debug, Default)]
pub struct Correlator {
    /// Probes already matched, for telling duplicates from strays.
    matched: HashSet<(TimeToLive, FlowKey)>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an event against the per-hop probing state.
    ///
    /// On a reply match the probe is taken from its hop and enriched with
    /// the measured round-trip delay.
    pub fn correlate(
        &mut self,
        resp: Response,
        hops: &mut BTreeMap<TimeToLive, HopProber>,
    ) -> Correlation {
        match resp {
            Response::Reply(data) => {
                let Some(probe) = Self::take(hops, data.ttl, data.flow_key) else {
                    return self.discard(data.ttl, data.flow_key);
                };
                self.matched.insert((data.ttl, data.flow_key));
                Correlation::Reply(EnrichedReply::new(probe, data.addr, data.recv))
            }
            Response::Timeout(data) => {
                let Some(probe) = Self::take(hops, data.ttl, data.flow_key) else {
                    return self.discard(data.ttl, data.flow_key);
                };
                self.matched.insert((data.ttl, data.flow_key));
                Correlation::Timeout(probe)
            }
        }
    }

    fn take(
        hops: &mut BTreeMap<TimeToLive, HopProber>,
        ttl: TimeToLive,
        flow_key: FlowKey,
    ) -> Option<Probe> {
        hops.get_mut(&ttl)
            .and_then(|hop| hop.take_outstanding(flow_key))
    }

    fn discard(&self, ttl: TimeToLive, flow_key: FlowKey) -> Correlation {
        if self.matched.contains(&(ttl, flow_key)) {
            tracing::debug!(%ttl, %flow_key, "duplicate event discarded");
            Correlation::Duplicate
        } else {
            tracing::debug!(%ttl, %flow_key, "unmatched event discarded");
            Correlation::Unmatched
        }
    }
}

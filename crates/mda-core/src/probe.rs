use crate::types::{FlowKey, TimeToLive};
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

/// Represents a multipath probe.
///
/// A probe is identified by the hop distance it targets and by its flow key,
/// so that probes at the same hop following different load-balanced paths
/// can be told apart.  The probe is owned by the per-hop prober until it is
/// matched to a reply or timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// The hop distance the probe targets.
    pub ttl: TimeToLive,
    /// The flow-identifying key of the probe.
    pub flow_key: FlowKey,
    /// Timestamp when the probe was sent.
    pub sent: SystemTime,
}

impl Probe {
    #[must_use]
    pub const fn new(ttl: TimeToLive, flow_key: FlowKey, sent: SystemTime) -> Self {
        Self {
            ttl,
            flow_key,
            sent,
        }
    }
}

/// A probe paired with its matching reply and the measured round-trip delay.
///
/// Created exactly once per matched reply and consumed by a single
/// `ReplyProcessed` event emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedReply {
    /// The originating probe.
    pub probe: Probe,
    /// The interface which replied.
    pub addr: IpAddr,
    /// Timestamp when the reply was received.
    pub received: SystemTime,
    /// The round-trip delay.
    pub delay: Duration,
}

impl EnrichedReply {
    pub(crate) fn new(probe: Probe, addr: IpAddr, received: SystemTime) -> Self {
        let delay = received.duration_since(probe.sent).unwrap_or_default();
        Self {
            probe,
            addr,
            received,
            delay,
        }
    }
}

/// An inbound event from the network collaborator.
///
/// For any given probe at most one of these is ever delivered.
#[derive(Debug, Clone)]
pub enum Response {
    /// A reply was received for an outstanding probe.
    Reply(ResponseData),
    /// An outstanding probe went unanswered.
    Timeout(TimeoutData),
}

/// The data in a probe reply event.
#[derive(Debug, Clone)]
pub struct ResponseData {
    /// Timestamp of the reply.
    pub recv: SystemTime,
    /// The address which replied.
    pub addr: IpAddr,
    /// The hop distance of the originating probe.
    pub ttl: TimeToLive,
    /// The flow key of the originating probe.
    pub flow_key: FlowKey,
}

impl ResponseData {
    #[must_use]
    pub const fn new(recv: SystemTime, addr: IpAddr, ttl: TimeToLive, flow_key: FlowKey) -> Self {
        Self {
            recv,
            addr,
            ttl,
            flow_key,
        }
    }
}

/// The data in a probe timeout event.
#[derive(Debug, Clone)]
pub struct TimeoutData {
    /// Timestamp of the timeout.
    pub when: SystemTime,
    /// The hop distance of the originating probe.
    pub ttl: TimeToLive,
    /// The flow key of the originating probe.
    pub flow_key: FlowKey,
}

impl TimeoutData {
    #[must_use]
    pub const fn new(when: SystemTime, ttl: TimeToLive, flow_key: FlowKey) -> Self {
        Self {
            when,
            ttl,
            flow_key,
        }
    }
}

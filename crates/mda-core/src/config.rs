use crate::types::{FlowKey, MaxBranch, TimeToLive};
use std::net::{IpAddr, Ipv4Addr};

/// Default values for configuration.
pub mod defaults {
    /// The default value for `bound`.
    pub const DEFAULT_MDA_BOUND: f64 = 0.05;

    /// The default value for `max-branch`.
    pub const DEFAULT_MDA_MAX_BRANCH: u8 = 5;

    /// The default value for `first-ttl`.
    pub const DEFAULT_MDA_FIRST_TTL: u8 = 1;

    /// The default value for `max-ttl`.
    pub const DEFAULT_MDA_MAX_TTL: u8 = 30;

    /// The default value for `max-probes`.
    pub const DEFAULT_MDA_MAX_PROBES: usize = 96;

    /// The default value for `max-unanswered`.
    pub const DEFAULT_MDA_MAX_UNANSWERED: u8 = 3;

    /// The default value for `max-undiscovered`.
    pub const DEFAULT_MDA_MAX_UNDISCOVERED: u8 = 3;

    /// The default value for `initial-flow-key`.
    pub const DEFAULT_MDA_INITIAL_FLOW_KEY: u16 = 33434;
}

/// Multipath detection configuration.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MdaConfig {
    /// The address of the target host.
    pub target_addr: IpAddr,
    /// The confidence bound for the stopping rule.
    ///
    /// The probability, in `(0, 1)`, that a hop is declared stable while an
    /// additional load-balanced branch remains undiscovered.
    pub bound: f64,
    /// The maximum number of probes in flight per hop.
    pub max_branch: MaxBranch,
    /// The first hop distance to probe.
    pub first_ttl: TimeToLive,
    /// The maximum hop distance to probe.
    pub max_ttl: TimeToLive,
    /// The per-hop probe budget.
    pub max_probes: usize,
    /// The number of consecutive unanswered probes before a hop is declared
    /// a gap.
    pub max_unanswered: u8,
    /// The number of consecutive gap hops before the trace is abandoned.
    pub max_undiscovered: u8,
    /// The flow key assigned to the first probe of each hop.
    pub initial_flow_key: FlowKey,
}

impl Default for MdaConfig {
    fn default() -> Self {
        Self {
            target_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bound: defaults::DEFAULT_MDA_BOUND,
            max_branch: MaxBranch(defaults::DEFAULT_MDA_MAX_BRANCH),
            first_ttl: TimeToLive(defaults::DEFAULT_MDA_FIRST_TTL),
            max_ttl: TimeToLive(defaults::DEFAULT_MDA_MAX_TTL),
            max_probes: defaults::DEFAULT_MDA_MAX_PROBES,
            max_unanswered: defaults::DEFAULT_MDA_MAX_UNANSWERED,
            max_undiscovered: defaults::DEFAULT_MDA_MAX_UNDISCOVERED,
            initial_flow_key: FlowKey(defaults::DEFAULT_MDA_INITIAL_FLOW_KEY),
        }
    }
}

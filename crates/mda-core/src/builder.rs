use crate::config::MdaConfig;
use crate::constants::MAX_TTL;
use crate::error::{Error, Result};
use crate::tracer::Mda;
use crate::types::{FlowKey, MaxBranch, TimeToLive};
use std::net::IpAddr;

/// Build a multipath tracer.
///
/// # Examples
///
/// ```
/// # fn main() -> anyhow::Result<()> {
/// use mda_core::Builder;
///
/// let addr = std::net::IpAddr::from([1, 2, 3, 4]);
/// let mda = Builder::new(addr)
///     .bound(0.01)
///     .max_branch(8)
///     .max_ttl(24)
///     .build()?;
/// # Ok(())
/// # }
/// ```
///
/// # See Also
///
/// - [`Mda`] - A multipath traceroute implementation.
#[derive(Debug)]
pub struct Builder {
    target_addr: IpAddr,
    bound: f64,
    max_branch: MaxBranch,
    first_ttl: TimeToLive,
    max_ttl: TimeToLive,
    max_probes: usize,
    max_unanswered: u8,
    max_undiscovered: u8,
    initial_flow_key: FlowKey,
}

impl Builder {
    /// Build a multipath tracer builder for a given target.
    #[must_use]
    pub fn new(target_addr: IpAddr) -> Self {
        let config = MdaConfig::default();
        Self {
            target_addr,
            bound: config.bound,
            max_branch: config.max_branch,
            first_ttl: config.first_ttl,
            max_ttl: config.max_ttl,
            max_probes: config.max_probes,
            max_unanswered: config.max_unanswered,
            max_undiscovered: config.max_undiscovered,
            initial_flow_key: config.initial_flow_key,
        }
    }

    /// Set the confidence bound for the stopping rule.
    #[must_use]
    pub const fn bound(mut self, bound: f64) -> Self {
        self.bound = bound;
        self
    }

    /// Set the maximum number of probes in flight per hop.
    #[must_use]
    pub const fn max_branch(mut self, max_branch: u8) -> Self {
        self.max_branch = MaxBranch(max_branch);
        self
    }

    /// Set the first hop distance to probe.
    #[must_use]
    pub const fn first_ttl(mut self, first_ttl: u8) -> Self {
        self.first_ttl = TimeToLive(first_ttl);
        self
    }

    /// Set the maximum hop distance to probe.
    #[must_use]
    pub const fn max_ttl(mut self, max_ttl: u8) -> Self {
        self.max_ttl = TimeToLive(max_ttl);
        self
    }

    /// Set the per-hop probe budget.
    #[must_use]
    pub const fn max_probes(mut self, max_probes: usize) -> Self {
        self.max_probes = max_probes;
        self
    }

    /// Set the number of consecutive unanswered probes before a hop is
    /// declared a gap.
    #[must_use]
    pub const fn max_unanswered(mut self, max_unanswered: u8) -> Self {
        self.max_unanswered = max_unanswered;
        self
    }

    /// Set the number of consecutive gap hops before the trace is abandoned.
    #[must_use]
    pub const fn max_undiscovered(mut self, max_undiscovered: u8) -> Self {
        self.max_undiscovered = max_undiscovered;
        self
    }

    /// Set the flow key assigned to the first probe of each hop.
    #[must_use]
    pub const fn initial_flow_key(mut self, initial_flow_key: u16) -> Self {
        self.initial_flow_key = FlowKey(initial_flow_key);
        self
    }

    /// Validate the configuration and build an [`Mda`] tracer.
    pub fn build(self) -> Result<Mda> {
        let config = MdaConfig {
            target_addr: self.target_addr,
            bound: self.bound,
            max_branch: self.max_branch,
            first_ttl: self.first_ttl,
            max_ttl: self.max_ttl,
            max_probes: self.max_probes,
            max_unanswered: self.max_unanswered,
            max_undiscovered: self.max_undiscovered,
            initial_flow_key: self.initial_flow_key,
        };
        validate(&config)?;
        Ok(Mda::new(config))
    }
}

fn validate(config: &MdaConfig) -> Result<()> {
    if !(config.bound > 0.0 && config.bound < 1.0) {
        return Err(Error::BadConfig(format!(
            "bound must be in the open interval (0, 1): {}",
            config.bound
        )));
    }
    if config.first_ttl.0 < 1 {
        return Err(Error::BadConfig(String::from("first_ttl must be at least 1")));
    }
    if config.max_ttl.0 > MAX_TTL {
        return Err(Error::BadConfig(format!(
            "max_ttl must be no greater than {MAX_TTL}: {}",
            config.max_ttl
        )));
    }
    if config.first_ttl > config.max_ttl {
        return Err(Error::BadConfig(format!(
            "first_ttl ({}) must not be greater than max_ttl ({})",
            config.first_ttl, config.max_ttl
        )));
    }
    if config.max_branch.0 == 0 {
        return Err(Error::BadConfig(String::from("max_branch must be non-zero")));
    }
    if config.max_probes == 0 {
        return Err(Error::BadConfig(String::from("max_probes must be non-zero")));
    }
    if config.max_unanswered == 0 {
        return Err(Error::BadConfig(String::from(
            "max_unanswered must be non-zero",
        )));
    }
    Ok(())
}

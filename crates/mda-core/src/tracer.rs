use crate::config::MdaConfig;
use crate::error::Result;
use crate::lattice::Lattice;
use crate::net::Network;
use crate::strategy::{MdaEvent, MdaStrategy};

/// A multipath traceroute implementation.
///
/// See the [`crate`] documentation for more information.
#[derive(Debug, Clone)]
pub struct Mda {
    config: MdaConfig,
}

impl Mda {
    /// Create an `Mda`.
    ///
    /// Use the [`crate::Builder`] type to create an [`Mda`].
    pub(crate) const fn new(config: MdaConfig) -> Self {
        Self { config }
    }

    /// The tracer configuration.
    #[must_use]
    pub const fn config(&self) -> &MdaConfig {
        &self.config
    }

    /// Run the discovery to completion and return the final lattice.
    ///
    /// Events published during the run are discarded; use
    /// [`Mda::run_with`] to observe them.
    pub fn run<N: Network>(&self, network: N) -> Result<Lattice> {
        self.run_with(network, |_| {})
    }

    /// Run the discovery with a custom event handler.
    ///
    /// The handler is invoked for every [`MdaEvent`] published during the
    /// run: each newly recorded link, each processed reply, each unanswered
    /// probe and, finally, the completed lattice.
    pub fn run_with<N: Network, F: Fn(MdaEvent<'_>)>(
        &self,
        network: N,
        handler: F,
    ) -> Result<Lattice> {
        MdaStrategy::new(&self.config, handler).run(network)
    }
}

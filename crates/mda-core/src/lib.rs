//! A multipath route discovery library.
//!
//! This crate implements the Multipath Detection Algorithm (MDA): it
//! discovers the network-layer topology between a source and a destination,
//! including load-balanced segments, by probing each hop distance with
//! varying flow keys and correlating the replies.  For every hop an
//! adaptive statistical stopping rule decides how many probes are enough to
//! claim, with a bounded error probability, that all parallel interfaces at
//! that hop have been found.  The discovered interfaces and links are
//! assembled incrementally into an acyclic [`Lattice`].
//!
//! Probe construction, sockets and timers are delegated to a [`Network`]
//! collaborator supplied by the caller; the algorithm itself never blocks
//! and processes reply and timeout events strictly in delivery order.
//!
//! # Example
//!
//! The following example runs a discovery against a network in which every
//! probe goes unanswered, so every probed hop ends up as a gap:
//!
//! ```
//! # fn main() -> anyhow::Result<()> {
//! use mda_core::{Builder, Network, Probe, Response, Result, TimeoutData};
//! use std::time::SystemTime;
//!
//! struct Silent {
//!     pending: Vec<Probe>,
//! }
//!
//! impl Network for Silent {
//!     fn send_probe(&mut self, probe: Probe) -> Result<()> {
//!         self.pending.push(probe);
//!         Ok(())
//!     }
//!
//!     fn recv_event(&mut self) -> Result<Option<Response>> {
//!         Ok(self.pending.pop().map(|probe| {
//!             Response::Timeout(TimeoutData::new(SystemTime::now(), probe.ttl, probe.flow_key))
//!         }))
//!     }
//! }
//!
//! let addr = std::net::IpAddr::from([192, 0, 2, 1]);
//! let lattice = Builder::new(addr)
//!     .build()?
//!     .run(Silent { pending: Vec::new() })?;
//! assert_eq!(0, lattice.node_count());
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Builder`] - Build an [`Mda`].
//! - [`Mda::run`] - Run the discovery on the current thread.
//! - [`Mda::run_with`] - Run the discovery with a custom event handler.
#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::use_self,
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]
#![deny(unsafe_code)]

mod builder;
mod config;
mod constants;
mod correlate;
mod error;
mod hop;
mod lattice;
mod net;
mod probe;
mod stopping;
mod strategy;
mod tracer;
mod types;

pub use builder::Builder;
pub use config::{defaults, MdaConfig};
pub use constants::MAX_TTL;
pub use error::{Error, Result};
pub use lattice::{Lattice, Node};
pub use net::Network;
pub use probe::{EnrichedReply, Probe, Response, ResponseData, TimeoutData};
pub use stopping::required_probes;
pub use strategy::{MdaEvent, MdaStrategy, NewLink};
pub use tracer::Mda;
pub use types::{FlowKey, MaxBranch, NodeId, TimeToLive};

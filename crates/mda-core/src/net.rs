use crate::error::Result;
use crate::probe::{Probe, Response};

/// An abstraction over a network runtime for multipath tracing.
///
/// Implementations own probe construction, the socket event loop and timer
/// management.  The contract is that every probe accepted by `send_probe` is
/// eventually answered by exactly one `Response::Reply` or
/// `Response::Timeout` event, delivered in the order the events occurred.
#[cfg_attr(test, mockall::automock)]
pub trait Network {
    /// Send a `Probe`.
    ///
    /// A transient inability to send is reported as [`crate::Error::ProbeDispatch`]
    /// and recovered by the caller; any other error is fatal.
    fn send_probe(&mut self, probe: Probe) -> Result<()>;

    /// Receive the next probe event.
    ///
    /// Returns `None` if no event is available within the implementation's
    /// read timeout.  Returns [`crate::Error::Aborted`] to request early
    /// termination of the trace.
    fn recv_event(&mut self) -> Result<Option<Response>>;
}

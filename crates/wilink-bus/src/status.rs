//! The three-way suspension protocol.
//!
//! Every step a state machine takes ends one of three ways: the work is
//! done, the bus deferred it, or something failed. Machines return
//! `Result<Step, E>`; `Pending` propagates upward untouched so the whole
//! call chain suspends in place, and errors travel as values to a single
//! top-level handler that performs teardown.

/// Outcome of a state-machine step that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// The step (and everything it called) finished synchronously.
    Complete,
    /// A bus transaction was deferred; the machine recorded enough state to
    /// resume when the completion arrives. Callers must return `Pending` to
    /// their own caller without touching shared state.
    Pending,
}

/// The transport failed a transaction.
///
/// There is deliberately no detail here: a failed bus transaction is
/// unconditionally fatal to the bring-up sequence, so the only thing the
/// engine does with this value is tear down and notify the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusError;

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "bus transaction failed")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BusError {}

/// Propagate `Pending` (or an error) out of the current step function.
///
/// The operand is a `Result<Step, E>`; on `Ok(Complete)` execution falls
/// through to the next statement. This is the only legal response to a
/// deferred step — machines never poll or block.
#[macro_export]
macro_rules! ready {
    ($e:expr) => {
        match $e? {
            $crate::Step::Pending => return Ok($crate::Step::Pending),
            $crate::Step::Complete => {}
        }
    };
}

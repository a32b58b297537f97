//! Engine-fatal error taxonomy.
//!
//! Anything in here aborts the entire bring-up: the engine tears down its
//! in-flight state, reports the error once through
//! [`BootHost::init_failed`](crate::BootHost::init_failed), and must be
//! reconfigured before another attempt. Deferred completion (`Pending`) is
//! not an error and never appears here; the OCP top-register primitive's
//! local ok/not-ok outcome is reported separately and only escalates when a
//! boot-critical stage depends on it.

use wilink_bus::BusError;

/// A condition that ends the bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    /// The transport failed a transaction.
    Bus(BusError),
    /// The chip-identity register returned a value outside the supported
    /// set.
    UnknownChipId(u32),
    /// A readiness scratch register read back all-ones — the chip is not
    /// responding.
    ScratchPadInvalid,
    /// A top-register access the boot sequence depends on was rejected or
    /// timed out.
    TopRegisterAccess,
    /// A firmware portion's length is not a multiple of 4 bytes.
    FirmwareAlignment(u32),
    /// The calibration blob's burst section ran past the end of the image.
    CalibrationFormat,
    /// `load_firmware` was called with no portion supplied.
    NoFirmware,
    /// The transfer scratch buffer is still held by an unfinished portion.
    ScratchBusy,
    /// The transaction slot arena was exhausted.
    SlotsExhausted,
    /// The firmware never raised the init-complete interrupt within the
    /// poll budget.
    InitTimeout,
    /// The interrupt-status register read back all-ones while waiting for
    /// init-complete.
    InitIndicationInvalid,
    /// An entry point was driven outside its legal lifecycle order.
    State,
}

impl From<BusError> for BootError {
    fn from(e: BusError) -> Self {
        BootError::Bus(e)
    }
}

impl core::fmt::Display for BootError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BootError::Bus(_) => write!(f, "bus transaction failed"),
            BootError::UnknownChipId(id) => write!(f, "unknown chip id {id:#010x}"),
            BootError::ScratchPadInvalid => write!(f, "readiness scratch register reads all-ones"),
            BootError::TopRegisterAccess => write!(f, "top-register access rejected or timed out"),
            BootError::FirmwareAlignment(len) => {
                write!(f, "firmware portion length {len} not word-aligned")
            }
            BootError::CalibrationFormat => {
                write!(f, "calibration blob truncated inside a burst record")
            }
            BootError::NoFirmware => write!(f, "no firmware portion supplied"),
            BootError::ScratchBusy => write!(f, "transfer scratch buffer busy"),
            BootError::SlotsExhausted => write!(f, "transaction slot arena exhausted"),
            BootError::InitTimeout => write!(f, "timeout waiting for firmware init-complete"),
            BootError::InitIndicationInvalid => {
                write!(f, "interrupt status reads all-ones during init poll")
            }
            BootError::State => write!(f, "engine driven out of lifecycle order"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BootError {}

//! Bring-up and firmware-activation engine for WiLink-class radio chips.
//!
//! The chip arrives held in reset behind a narrow SDIO/SPI-class transport.
//! Getting it to a running firmware takes a fixed choreography of register
//! reads, writes and bulk transfers: identify the silicon, program the
//! reference-clock/PLL tree, soft-reset, stream the calibration (NVS) image
//! into registers and the command mailbox, push the firmware image through a
//! sliding address window, release the CPU and wait for the init-complete
//! interrupt. Every one of those touches may finish inside the call or be
//! deferred by the transport, so the whole engine is written as a set of
//! cooperating resumable state machines over the
//! [`wilink_bus`] suspension protocol.
//!
//! # Layers
//!
//! ```text
//! Host driver (mailboxes, firmware supply, completion callbacks)
//!         ↓ BootHost
//! HwInit engine (this crate — boot / NVS / PLL / load / finalize machines)
//!         ↓ BusTransport
//! SDIO / SPI glue (queueing, framing, completion delivery)
//! ```
//!
//! # Usage sketch
//!
//! ```ignore
//! let mut hw = HwInit::new(bus, delay, host);
//! hw.configure(BootConfig { ref_clock: 2, ..BootConfig::default() });
//! hw.set_calibration(nvs_image);
//! hw.boot();                       // runs to Pending or Complete
//! // transport completions re-enter the engine:
//! hw.bus_done(completion);
//! // per firmware portion:
//! hw.set_firmware_portion(chunk, addr, is_last);
//! hw.load_firmware();
//! ```
//!
//! # Features
//!
//! - `std`: host-test support (`std::error::Error` impls)
//! - `defmt`: logging + `defmt::Format` derives

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::doc_markdown)] // register names and hex in doc comments

// Crate-internal logging: defmt when enabled, silence otherwise.
macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::info!($($arg)*);
    }};
}
macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::warn!($($arg)*);
    }};
}
macro_rules! error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::error!($($arg)*);
    }};
}

mod boot;
mod chip;
mod engine;
mod error;
mod finalize;
mod fwload;
mod nvs;
mod ocp;
mod pll;
mod polarity;
pub mod regs;

pub use chip::{BootAttr, BootConfig, ChipFamily, ChipId, ChipVariant, SiliconRev};
pub use engine::{BootHost, DownloadStatus, HwInit};
pub use error::BootError;
pub use finalize::{FwStaticInfo, FW_STATIC_INFO_SIZE};
pub use nvs::{default_image, parse_burst_header, BurstRecord, DEF_NVS, DEF_NVS_SIZE, NVS_MAC_OFFSET};

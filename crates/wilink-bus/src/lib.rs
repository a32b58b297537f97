//! Bus-facing mechanism for the WiLink bring-up engine.
//!
//! The radio sits behind a narrow memory-mapped transport (SDIO or SPI
//! class). Every hardware touch goes through one primitive — a transaction
//! that may finish inside the call or be deferred and reported later through
//! a completion token. This crate holds the pieces that make that model
//! workable without an allocator or an async runtime:
//!
//! - [`Step`] / [`TxnOutcome`] — the three-way suspension protocol shared by
//!   every state machine in the engine.
//! - [`TxnPool`] — a fixed arena of transaction slots addressed by
//!   [`TxnToken`] handles; a read result must be consumed exactly once
//!   before its slot can be reused.
//! - [`PartitionTable`] / [`PartitionManager`] — the 4-window mapping of the
//!   bus's small visible range onto the chip's address space.
//! - [`BusTransport`] — the contract an SDIO/SPI glue layer implements.
//!
//! Policy (which registers, which windows, in what order) lives in
//! `wilink-boot`; this crate is mechanism only.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod partition;
mod status;
mod transport;
mod txn;

pub use partition::{PartitionKind, PartitionManager, PartitionTable, PartitionWindow};
pub use status::{BusError, Step};
pub use transport::{
    BlockData, BusCompletion, BusTransport, CompletionPayload, TxnOutcome, BUS_FRAME_PAD,
    MAX_BLOCK_READ,
};
pub use txn::{TxnPool, TxnToken, TXN_SLOT_COUNT};

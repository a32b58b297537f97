//! The bus transport contract.
//!
//! One trait is the engine's sole path to hardware. Every operation may
//! complete inside the call or return [`TxnOutcome::Pending`], in which case
//! the glue layer later hands the engine a [`BusCompletion`] carrying the
//! same token. The transport must preserve issue order: a transaction
//! submitted after another may not reach the device first. The engine leans
//! on that for fire-and-forget register writes and partition switches.

use crate::partition::PartitionTable;
use crate::status::BusError;
use crate::txn::TxnToken;

/// Leading bytes of a block-write buffer reserved for bus framing.
///
/// SPI-class transports write their command word into this space, which is
/// why it sits *inside* the caller's buffer: the transport may clobber it
/// during the call. Callers that lend a buffer they do not own (the
/// calibration TLV tail) save and restore those bytes around the transfer.
pub const BUS_FRAME_PAD: usize = 4;

/// Upper bound on a block-read payload carried through a completion.
pub const MAX_BLOCK_READ: usize = 64;

/// Payload of a completed block read.
pub type BlockData = heapless::Vec<u8, MAX_BLOCK_READ>;

/// Result of issuing one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxnOutcome<T> {
    /// The transaction executed synchronously; no completion will follow.
    Complete(T),
    /// Deferred. A [`BusCompletion`] with this transaction's token follows.
    /// For writes, the transport has already captured the payload bytes —
    /// it must not retain the borrow past the call.
    Pending,
    /// The transaction failed. Unconditionally fatal to the bring-up.
    Failed(BusError),
}

/// Data carried by a deferred transaction's completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionPayload {
    /// A write (or partition apply) finished; nothing to deliver.
    Ack,
    /// A deferred register read finished with this value.
    Reg(u32),
    /// A deferred block read finished with these bytes.
    Block(BlockData),
}

/// Completion of a previously `Pending` transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusCompletion {
    /// Token the transaction was issued with.
    pub token: TxnToken,
    /// Payload, or the failure that ends the bring-up.
    pub result: Result<CompletionPayload, BusError>,
}

/// The transport beneath the engine.
///
/// Implementations queue or execute; they never block the caller. Addresses
/// are device addresses and must be reachable through the partition table
/// most recently applied via [`BusTransport::apply_partition`].
pub trait BusTransport {
    /// Read one 32-bit register.
    fn read_reg(&mut self, addr: u32, token: TxnToken) -> TxnOutcome<u32>;

    /// Write one 32-bit register.
    fn write_reg(&mut self, addr: u32, value: u32, token: TxnToken) -> TxnOutcome<()>;

    /// Write `buf[pad..]` to `addr`. The leading `pad` bytes are framing
    /// scratch the transport may overwrite during the call.
    fn write_block(&mut self, addr: u32, buf: &mut [u8], pad: usize, token: TxnToken)
        -> TxnOutcome<()>;

    /// Read `len` bytes from `addr`. `len` is at most [`MAX_BLOCK_READ`].
    fn read_block(&mut self, addr: u32, len: usize, token: TxnToken) -> TxnOutcome<BlockData>;

    /// Program the device's address-window mapping. This is a write-style
    /// transaction; thanks to issue ordering, transactions issued after it
    /// see the new mapping.
    fn apply_partition(&mut self, table: &PartitionTable, token: TxnToken) -> TxnOutcome<()>;
}

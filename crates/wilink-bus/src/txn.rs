//! Transaction slot arena.
//!
//! The engine issues up to [`TXN_SLOT_COUNT`] transactions between two
//! suspension points. Each slot carries the 32-bit payload of one register
//! transaction and is addressed by the [`TxnToken`] returned at allocation.
//! A slot holding an unconsumed read result cannot be reallocated; the
//! result must be `take`n first, which invalidates the token. This makes
//! result aliasing (two logically distinct steps reading the same slot) a
//! structural impossibility rather than a discipline.

/// Number of slots in the arena.
///
/// Sized to the longest run of transactions any machine issues without
/// suspending (the boot machine's partition-switch stages).
pub const TXN_SLOT_COUNT: usize = 15;

/// Handle to one slot, returned by [`TxnPool::alloc`].
///
/// The token travels to the transport and comes back in the completion, so
/// a deferred result lands in the slot it was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxnToken(u8);

impl TxnToken {
    /// Raw slot index, for transports that key their queues by it.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Issued; the transport owns it until completion.
    InFlight,
    /// A read result is parked here and has not been consumed.
    Ready(u32),
}

/// Fixed arena of reusable transaction slots.
#[derive(Debug)]
pub struct TxnPool {
    slots: [SlotState; TXN_SLOT_COUNT],
}

impl TxnPool {
    /// A pool with every slot free.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [SlotState::Free; TXN_SLOT_COUNT],
        }
    }

    /// Claim the first free slot. `None` means the arena is exhausted,
    /// which the engine treats as fatal.
    pub fn alloc(&mut self) -> Option<TxnToken> {
        let idx = self
            .slots
            .iter()
            .position(|s| *s == SlotState::Free)?;
        self.slots[idx] = SlotState::InFlight;
        #[allow(clippy::cast_possible_truncation)] // TXN_SLOT_COUNT < 256
        let token = TxnToken(idx as u8);
        Some(token)
    }

    /// Park a deferred read result in its slot.
    pub fn complete(&mut self, token: TxnToken, value: u32) {
        if let Some(slot) = self.slots.get_mut(token.index()) {
            if *slot == SlotState::InFlight {
                *slot = SlotState::Ready(value);
            }
        }
    }

    /// Consume a read result, freeing the slot and invalidating the token.
    ///
    /// Returns `None` if the slot holds no unconsumed result — a stale or
    /// double-consumed token.
    pub fn take(&mut self, token: TxnToken) -> Option<u32> {
        let slot = self.slots.get_mut(token.index())?;
        match *slot {
            SlotState::Ready(value) => {
                *slot = SlotState::Free;
                Some(value)
            }
            _ => None,
        }
    }

    /// Release a slot whose transaction produced no value to consume
    /// (write acknowledgements, abandoned transactions on teardown).
    pub fn release(&mut self, token: TxnToken) {
        if let Some(slot) = self.slots.get_mut(token.index()) {
            *slot = SlotState::Free;
        }
    }

    /// Free every slot. Used when the engine aborts to its idle state.
    pub fn reset(&mut self) {
        self.slots = [SlotState::Free; TXN_SLOT_COUNT];
    }

    /// Number of slots currently not free.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| **s != SlotState::Free)
            .count()
    }
}

impl Default for TxnPool {
    fn default() -> Self {
        Self::new()
    }
}

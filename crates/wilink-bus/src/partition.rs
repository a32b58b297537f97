//! Bus address-window partitioning.
//!
//! The transport exposes a small window onto the chip's much larger address
//! space. The mapping is a table of up to four `(address, size)` windows
//! programmed into the device; reprogramming it is itself a write-style
//! transaction. The engine keeps exactly one of three named templates
//! active at a time and never issues a transaction outside the active
//! mapping.

/// Number of windows in a partition table.
pub const PARTITION_WINDOWS: usize = 4;

/// One `(address, size)` window of device address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PartitionWindow {
    /// Device address the window starts at.
    pub addr: u32,
    /// Window length in bytes. A zero-length window maps nothing.
    pub size: u32,
}

/// Which template a table was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PartitionKind {
    /// Firmware staging area + register block, anchored at the current
    /// download address.
    Download,
    /// Runtime memory + register block + two small fixed windows.
    Working,
    /// Clock-domain (DRP) memory + register block.
    Clock,
}

/// A full 4-window mapping, tagged with the template it instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PartitionTable {
    kind: PartitionKind,
    windows: [PartitionWindow; PARTITION_WINDOWS],
}

impl PartitionTable {
    /// Build a table from a template tag and its windows.
    #[must_use]
    pub const fn new(kind: PartitionKind, windows: [PartitionWindow; PARTITION_WINDOWS]) -> Self {
        Self { kind, windows }
    }

    /// The template this table instantiates.
    #[must_use]
    pub fn kind(&self) -> PartitionKind {
        self.kind
    }

    /// The raw windows, in programming order.
    #[must_use]
    pub fn windows(&self) -> &[PartitionWindow; PARTITION_WINDOWS] {
        &self.windows
    }

    /// Whether `[addr, addr + len)` lies entirely inside one mapped window.
    #[must_use]
    pub fn maps(&self, addr: u32, len: u32) -> bool {
        self.windows.iter().any(|w| {
            w.size != 0
                && addr >= w.addr
                && addr.saturating_add(len) <= w.addr.saturating_add(w.size)
        })
    }
}

/// Tracks the table currently programmed into the device.
///
/// The manager records, it does not transact: pushing the table to the
/// device is the transport's `apply_partition`, issued by the engine at
/// machine-stage boundaries where no transaction targeting the old mapping
/// can still be in flight.
#[derive(Debug, Default)]
pub struct PartitionManager {
    active: Option<PartitionTable>,
}

impl PartitionManager {
    /// A manager with no mapping recorded yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Record `table` as the active mapping.
    pub fn record(&mut self, table: PartitionTable) {
        self.active = Some(table);
    }

    /// Template of the active mapping, if any has been programmed.
    #[must_use]
    pub fn active_kind(&self) -> Option<PartitionKind> {
        self.active.map(|t| t.kind)
    }

    /// Whether `[addr, addr + len)` is reachable through the active mapping.
    ///
    /// With no mapping recorded this answers `false`; the engine asserts on
    /// it in debug builds before every issue.
    #[must_use]
    pub fn maps(&self, addr: u32, len: u32) -> bool {
        self.active.is_some_and(|t| t.maps(addr, len))
    }

    /// Forget the recorded mapping (engine teardown).
    pub fn reset(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{PartitionKind, PartitionManager, PartitionTable, PartitionWindow};

    fn two_window_table() -> PartitionTable {
        PartitionTable::new(
            PartitionKind::Working,
            [
                PartitionWindow { addr: 0x4_0000, size: 0x1_4FC0 },
                PartitionWindow { addr: 0x30_0000, size: 0xA000 },
                PartitionWindow { addr: 0, size: 0 },
                PartitionWindow { addr: 0x4_0404, size: 0 },
            ],
        )
    }

    #[test]
    fn test_maps_inside_window() {
        let t = two_window_table();
        assert!(t.maps(0x4_0000, 4));
        assert!(t.maps(0x30_5674, 4));
        assert!(t.maps(0x5_4FBC, 4)); // last word of window 1
    }

    #[test]
    fn test_maps_rejects_outside_and_straddling() {
        let t = two_window_table();
        assert!(!t.maps(0x5_4FC0, 4)); // one past window 1
        assert!(!t.maps(0x5_4FBE, 4)); // straddles the window end
        assert!(!t.maps(0x10_0000, 4));
    }

    #[test]
    fn test_zero_size_window_maps_nothing() {
        let t = two_window_table();
        assert!(!t.maps(0x4_0404, 4));
    }

    #[test]
    fn test_manager_tracks_active_kind() {
        let mut m = PartitionManager::new();
        assert_eq!(m.active_kind(), None);
        assert!(!m.maps(0x4_0000, 4));
        m.record(two_window_table());
        assert_eq!(m.active_kind(), Some(PartitionKind::Working));
        assert!(m.maps(0x4_0000, 4));
        m.reset();
        assert_eq!(m.active_kind(), None);
    }
}

//! Chip identification, variant capabilities, and boot configuration.
//!
//! The silicon variant used to be a build-time decision; here it is a value
//! captured once when the chip-identity register is read, and every
//! formerly conditional branch (top-address width, drive-strength vs.
//! polarity configuration, PLL code remaps, revision tags) consults it at
//! run time.

use crate::regs;

/// Supported chip identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipId {
    /// WiLink 1273 PG 1.0. Accepted, but long deprecated — expect trouble.
    Wl1273Pg10,
    /// WiLink 1273 PG 2.0.
    Wl1273Pg20,
    /// WiLink 1283 PG 1.0.
    Wl1283Pg10,
    /// WiLink 1283 PG 2.0.
    Wl1283Pg20,
}

/// Chip family — selects the register-level boot dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipFamily {
    /// WiLink 1273 line.
    Wl1273,
    /// WiLink 1283 line.
    Wl1283,
}

/// Silicon revision within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SiliconRev {
    /// PG 1.0.
    Pg10,
    /// PG 2.0.
    Pg20,
}

impl ChipId {
    /// Decode the chip-identity register. `None` is fatal to the caller.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            regs::CHIP_ID_1273_PG10 => Some(ChipId::Wl1273Pg10),
            regs::CHIP_ID_1273_PG20 => Some(ChipId::Wl1273Pg20),
            regs::CHIP_ID_1283_PG10 => Some(ChipId::Wl1283Pg10),
            regs::CHIP_ID_1283_PG20 => Some(ChipId::Wl1283Pg20),
            _ => None,
        }
    }

    /// The family this identity belongs to.
    #[must_use]
    pub fn family(self) -> ChipFamily {
        match self {
            ChipId::Wl1273Pg10 | ChipId::Wl1273Pg20 => ChipFamily::Wl1273,
            ChipId::Wl1283Pg10 | ChipId::Wl1283Pg20 => ChipFamily::Wl1283,
        }
    }

    /// The silicon revision.
    #[must_use]
    pub fn silicon(self) -> SiliconRev {
        match self {
            ChipId::Wl1273Pg10 | ChipId::Wl1283Pg10 => SiliconRev::Pg10,
            ChipId::Wl1273Pg20 | ChipId::Wl1283Pg20 => SiliconRev::Pg20,
        }
    }
}

/// Runtime capability descriptor for the detected chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipVariant {
    /// The decoded identity.
    pub id: ChipId,
}

impl ChipVariant {
    /// Wrap a decoded identity.
    #[must_use]
    pub fn new(id: ChipId) -> Self {
        Self { id }
    }

    /// Family shortcut.
    #[must_use]
    pub fn family(self) -> ChipFamily {
        self.id.family()
    }

    /// Silicon-revision shortcut.
    #[must_use]
    pub fn silicon(self) -> SiliconRev {
        self.id.silicon()
    }

    /// Valid-bits mask for halved OCP top addresses.
    #[must_use]
    pub fn top_addr_mask(self) -> u32 {
        match self.family() {
            ChipFamily::Wl1273 => regs::TOP_REG_ADDR_MASK_1273,
            ChipFamily::Wl1283 => regs::TOP_REG_ADDR_MASK_1283,
        }
    }
}

/// Boot-time attributes captured once at `boot()` and handed to the host's
/// finalize routine together with the firmware's static info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootAttr {
    /// MAC-domain clock rate selector.
    pub mac_clock: u32,
    /// ARM-domain clock rate selector.
    pub arm_clock: u32,
    /// Whether the firmware runs with debug facilities enabled.
    pub firmware_debug: bool,
}

/// Engine configuration, supplied once through
/// [`HwInit::configure`](crate::HwInit::configure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootConfig {
    /// Packed reference-clock setting: bits [2:0] frequency code
    /// (`regs::CLOCK_CONFIG_*`), bit 3 clock-request type, bit 4 polarity.
    pub ref_clock: u32,
    /// TCXO frequency code (`regs::CLOCK_CONFIG_*`).
    pub tcxo_clock: u32,
    /// Use the newer PLL configuration machine (1283 only; 1273 always
    /// takes the legacy two-register sequence).
    pub new_pll_algorithm: bool,
    /// Platform byte; bits [2:1] feed the pad drive-strength field.
    pub platform_configuration: u8,
    /// General-settings byte; bits [7:6] force the DRP scratch flag.
    pub general_settings: u8,
    /// MAC-domain clock selector, forwarded in [`BootAttr`].
    pub mac_clock: u32,
    /// ARM-domain clock selector, forwarded in [`BootAttr`].
    pub arm_clock: u32,
    /// Poll for firmware readiness via host-scheduled one-shot timers
    /// instead of inline micro-stalls.
    pub use_stall_timer: bool,
    /// Skip the top-register init stages after the readiness check.
    /// Compatibility bypass for bring-up rigs whose top space is absent.
    pub top_init_bypass: bool,
    /// IRQ line polarity programmed by
    /// [`HwInit::init_irq_polarity`](crate::HwInit::init_irq_polarity).
    pub irq_active_low: bool,
    /// Randomized suffix patched into the built-in calibration image's MAC
    /// (offsets 3–5) when the host supplies no NVS. Entropy comes from the
    /// caller so the engine stays deterministic.
    pub mac_suffix: Option<[u8; 3]>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            ref_clock: regs::CLOCK_CONFIG_38_4_M,
            tcxo_clock: regs::CLOCK_CONFIG_19_2_M,
            new_pll_algorithm: false,
            platform_configuration: 0,
            general_settings: 0,
            mac_clock: 0,
            arm_clock: 0,
            use_stall_timer: false,
            top_init_bypass: false,
            irq_active_low: true,
            mac_suffix: None,
        }
    }
}

impl BootConfig {
    /// Reference-clock frequency code.
    #[must_use]
    pub fn ref_freq_code(&self) -> u32 {
        self.ref_clock & regs::FREF_CLK_FREQ_MASK
    }

    /// Whether the clock-request top register needs PRCM routing.
    #[must_use]
    pub fn clk_req_needs_prcm(&self) -> bool {
        (self.ref_clock & regs::FREF_CLK_TYPE_MASK) != 0
    }

    /// Whether the test-mode polarity-select register needs programming
    /// (1273 only; polarity bit clear).
    #[must_use]
    pub fn clk_req_outn_needed(&self) -> bool {
        (self.ref_clock & regs::FREF_CLK_POLARITY_MASK) == 0
    }

    /// The attributes snapshot handed to the host at finalize.
    #[must_use]
    pub fn boot_attr(&self) -> BootAttr {
        BootAttr {
            mac_clock: self.mac_clock,
            arm_clock: self.arm_clock,
            firmware_debug: false,
        }
    }
}

//! Register map, chip identifiers and protocol constants.
//!
//! Addresses are device addresses, reachable only through whichever
//! partition template is active (see the `PARTITION_*` block). The "top"
//! register space is not bus-addressable at all — its 16-bit addresses go
//! through the OCP indirection in [`crate::HwInit`].

use wilink_bus::{PartitionKind, PartitionTable, PartitionWindow};

// ---------------------------------------------------------------------------
// Address-space layout
// ---------------------------------------------------------------------------

/// Base of the directly addressable register block.
pub const REGISTERS_BASE: u32 = 0x0030_0000;
/// Base of the clock-domain (DRP) register block.
pub const DRPW_BASE: u32 = 0x0031_0000;

/// Total bus-visible address range all windows must share.
pub const PARTITION_TOTAL_ADDR_RANGE: u32 = 0x0001_FFC0;

/// Download template: memory window size (the firmware staging area).
pub const PARTITION_DOWN_MEM_SIZE: u32 = 0x0001_77C0;
/// Download template: register window size.
pub const PARTITION_DOWN_REG_SIZE: u32 = 0x8800;

/// Working template window 1: runtime memory.
pub const PARTITION_WORK_MEM_ADDR1: u32 = 0x0004_0000;
/// Working template window 1 size.
pub const PARTITION_WORK_MEM_SIZE1: u32 = 0x0001_4FC0;
/// Working template window 2 size (register block).
pub const PARTITION_WORK_MEM_SIZE2: u32 = 0xA000;
/// Working template window 3: a single mapped word.
pub const PARTITION_WORK_MEM_ADDR3: u32 = 0x0030_04F8;
/// Working template window 3 size.
pub const PARTITION_WORK_MEM_SIZE3: u32 = 0x4;
/// Working template window 4 (address only; the table carries no size for
/// the last window).
pub const PARTITION_WORK_MEM_ADDR4: u32 = 0x0004_0404;

/// Clock template: memory window.
pub const PARTITION_DRPW_MEM_ADDR: u32 = 0x0004_0000;
/// Clock template: memory window size.
pub const PARTITION_DRPW_MEM_SIZE: u32 = 0x0001_4FC0;
/// Clock template: DRP register window size.
pub const PARTITION_DRPW_REG_SIZE: u32 = 0x6000;

/// Download partition anchored at `fw_addr` — firmware staging + registers.
#[must_use]
pub fn download_partition(fw_addr: u32) -> PartitionTable {
    PartitionTable::new(
        PartitionKind::Download,
        [
            PartitionWindow { addr: fw_addr, size: PARTITION_DOWN_MEM_SIZE },
            PartitionWindow { addr: REGISTERS_BASE, size: PARTITION_DOWN_REG_SIZE },
            PartitionWindow { addr: 0, size: 0 },
            PartitionWindow { addr: 0, size: 0 },
        ],
    )
}

/// Working partition — runtime memory + registers + two fixed windows.
#[must_use]
pub fn working_partition() -> PartitionTable {
    PartitionTable::new(
        PartitionKind::Working,
        [
            PartitionWindow { addr: PARTITION_WORK_MEM_ADDR1, size: PARTITION_WORK_MEM_SIZE1 },
            PartitionWindow { addr: REGISTERS_BASE, size: PARTITION_WORK_MEM_SIZE2 },
            PartitionWindow { addr: PARTITION_WORK_MEM_ADDR3, size: PARTITION_WORK_MEM_SIZE3 },
            PartitionWindow { addr: PARTITION_WORK_MEM_ADDR4, size: 0 },
        ],
    )
}

/// Clock partition — DRP memory + DRP registers.
#[must_use]
pub fn clock_partition() -> PartitionTable {
    PartitionTable::new(
        PartitionKind::Clock,
        [
            PartitionWindow { addr: PARTITION_DRPW_MEM_ADDR, size: PARTITION_DRPW_MEM_SIZE },
            PartitionWindow { addr: DRPW_BASE, size: PARTITION_DRPW_REG_SIZE },
            PartitionWindow { addr: 0, size: 0 },
            PartitionWindow { addr: 0, size: 0 },
        ],
    )
}

// ---------------------------------------------------------------------------
// Chip identification
// ---------------------------------------------------------------------------

/// Chip-identity register.
pub const CHIP_ID: u32 = REGISTERS_BASE + 0x5674;
/// WiLink 1273, PG 1.0 silicon.
pub const CHIP_ID_1273_PG10: u32 = 0x0403_0101;
/// WiLink 1273, PG 2.0 silicon.
pub const CHIP_ID_1273_PG20: u32 = 0x0403_0111;
/// WiLink 1283, PG 1.0 silicon.
pub const CHIP_ID_1283_PG10: u32 = 0x0503_0101;
/// WiLink 1283, PG 2.0 silicon.
pub const CHIP_ID_1283_PG20: u32 = 0x0503_0111;

// ---------------------------------------------------------------------------
// Scratch pads, interrupts, CPU control
// ---------------------------------------------------------------------------

/// Readiness scratch register, checked after the NVS burst.
pub const SCR_PAD2: u32 = REGISTERS_BASE + 0x5610;
/// Scratch register doubling as the eeprom-less indication.
pub const SCR_PAD4: u32 = REGISTERS_BASE + 0x5618;
/// Eeprom-less indication register: written with its own address when the
/// host supplied a calibration image, [`USE_EEPROM`] otherwise.
pub const ACX_EEPROMLESS_IND_REG: u32 = SCR_PAD4;
/// Marker value for "calibration comes from the on-board EEPROM".
pub const USE_EEPROM: u32 = 0;

/// Host interrupt mask register.
pub const ACX_REG_INTERRUPT_MASK: u32 = REGISTERS_BASE + 0x04DC;
/// Interrupt status, non-clearing on read.
pub const ACX_REG_INTERRUPT_NO_CLEAR: u32 = REGISTERS_BASE + 0x04B4;
/// Interrupt acknowledge register.
pub const ACX_REG_INTERRUPT_ACK: u32 = REGISTERS_BASE + 0x04F8;
/// All interrupt sources.
pub const ACX_INTR_ALL: u32 = 0xFFFF_FFFF;
/// Firmware init-complete interrupt bit.
pub const ACX_INTR_INIT_COMPLETE: u32 = 1 << 14;

/// Embedded-CPU control register.
pub const ACX_REG_ECPU_CONTROL: u32 = REGISTERS_BASE + 0x5664;
/// Halt-release bit in [`ACX_REG_ECPU_CONTROL`].
pub const ECPU_CONTROL_HALT: u32 = 0x0000_0101;
/// Rx/Tx enable register, zeroed by the soft-reset sequence.
pub const REG_ENABLE_TX_RX: u32 = REGISTERS_BASE + 0x5450;

// ---------------------------------------------------------------------------
// Clock / ELP wake-up
// ---------------------------------------------------------------------------

/// Legacy reference-clock select (pll_selinpfref field).
pub const PLL_PARAMETERS: u32 = REGISTERS_BASE + 0x6040;
/// Wake-up counter pause threshold register.
pub const WU_COUNTER_PAUSE: u32 = REGISTERS_BASE + 0x6008;
/// Highest pause threshold.
pub const WU_COUNTER_PAUSE_VAL: u32 = 0x3FF;
/// ELP wake-up command register.
pub const WELP_ARM_COMMAND: u32 = REGISTERS_BASE + 0x6100;
/// ELP wake-up command value.
pub const WELP_ARM_COMMAND_VAL: u32 = 0x4;
/// Delay after the ELP wake-up write, in microseconds.
pub const ELP_WAKEUP_STALL_US: u32 = 500;

/// Clock-domain scratch register; the firmware adds the RTRIM value before
/// releasing the DRP from reset.
pub const DRPW_SCRATCH_START: u32 = DRPW_BASE + 0x002C;
/// General-settings bits that force [`DRPW_MASK_SET`] into the scratch word.
pub const DRPW_MASK_CHECK: u8 = 0xC0;
/// Flag merged into the clock scratch word.
pub const DRPW_MASK_SET: u32 = 0x0200_0000;

// ---------------------------------------------------------------------------
// Reference-clock configuration field
// ---------------------------------------------------------------------------

/// Frequency-code bits of the packed reference-clock setting.
pub const FREF_CLK_FREQ_MASK: u32 = 0x7;
/// Type bit: set when the clock-request top register needs PRCM routing.
pub const FREF_CLK_TYPE_MASK: u32 = 1 << 3;
/// Polarity bit of the packed reference-clock setting.
pub const FREF_CLK_POLARITY_MASK: u32 = 1 << 4;

/// Preserved bits when rewriting the clock-request top register.
pub const FREF_CLK_TYPE_BITS: u32 = 0xFFFF_FE7F;
/// PRCM clock-request routing value.
pub const CLK_REQ_PRCM: u32 = 0x100;
/// Preserved bits when rewriting the test-mode polarity-select register.
pub const FREF_CLK_POLARITY_BITS: u32 = 0xFFFF_F8FF;
/// Test-mode CLK_REQ_OUTN selection value.
pub const CLK_REQ_OUTN_SEL: u32 = 0x700;

/// Reference clock 19.2 MHz.
pub const CLOCK_CONFIG_19_2_M: u32 = 0;
/// Reference clock 26 MHz.
pub const CLOCK_CONFIG_26_M: u32 = 1;
/// Reference clock 38.4 MHz.
pub const CLOCK_CONFIG_38_4_M: u32 = 2;
/// Reference clock 52 MHz.
pub const CLOCK_CONFIG_52_M: u32 = 3;
/// Reference clock 38.4 MHz, crystal-only mode.
pub const CLOCK_CONFIG_38_4_M_XTAL: u32 = 4;
/// TCXO 16.368 MHz (same code as 38.4-XTAL, read from the TCXO field).
pub const CLOCK_CONFIG_16_368_M: u32 = 4;
/// Reference clock 26 MHz, crystal-only mode.
pub const CLOCK_CONFIG_26_M_XTAL: u32 = 5;
/// TCXO 32.736 MHz (same code as 26-XTAL, read from the TCXO field).
pub const CLOCK_CONFIG_32_736_M: u32 = 5;
/// TCXO 16.8 MHz.
pub const CLOCK_CONFIG_16_8_M: u32 = 6;
/// TCXO 33.6 MHz.
pub const CLOCK_CONFIG_33_6_M: u32 = 7;

// ---------------------------------------------------------------------------
// OCP indirect (top-register) access
// ---------------------------------------------------------------------------
//
// To write a top-space register: put (address / 2) & mask | 0x30000 into
// OCP_POR_CTR, the value into OCP_POR_WDATA, then 0x1 into OCP_CMD.
// To read: program OCP_POR_CTR the same way, write 0x2 into OCP_CMD, then
// poll OCP_DATA_RD bit 18 for data-valid; bits 17:16 must decode to
// "accept" (01) and the value sits in the low 16 bits.

/// OCP address/control register.
pub const OCP_POR_CTR: u32 = REGISTERS_BASE + 0x09B4;
/// OCP write-data register.
pub const OCP_POR_WDATA: u32 = REGISTERS_BASE + 0x09B0;
/// OCP command register.
pub const OCP_CMD: u32 = REGISTERS_BASE + 0x09B8;
/// OCP read-data / status register.
pub const OCP_DATA_RD: u32 = REGISTERS_BASE + 0x09BC;

/// OCP command: write.
pub const OCP_CMD_WRITE: u32 = 0x1;
/// OCP command: read.
pub const OCP_CMD_READ: u32 = 0x2;
/// Tag bits merged into the halved top address.
pub const OCP_ADDR_TAG: u32 = 0x0003_0000;
/// Data-valid bit of [`OCP_DATA_RD`].
pub const OCP_DATA_VALID: u32 = 1 << 18;
/// Accept bit of the 2-bit response field.
pub const OCP_STATUS_ACCEPT: u32 = 1 << 16;
/// Reject bit of the 2-bit response field.
pub const OCP_STATUS_REJECT: u32 = 1 << 17;

/// Valid-bits mask for halved top addresses, WiLink 1273.
pub const TOP_REG_ADDR_MASK_1273: u32 = 0x07FF;
/// Valid-bits mask for halved top addresses, WiLink 1283.
pub const TOP_REG_ADDR_MASK_1283: u32 = 0x1FFF;
/// Data-valid poll budget.
pub const TOP_REG_RETRIES: u32 = 32;

// ---------------------------------------------------------------------------
// Top-space registers (16-bit address space behind the OCP)
// ---------------------------------------------------------------------------

/// SDIO function-0 CCCR shadow; bit 1 selects IRQ polarity (1 = active
/// low).
pub const FN0_CCCR_REG_32: u32 = 0x64;
/// Clock-request routing register.
pub const CLK_REQ: u32 = 0x4B4;
/// Test-mode clock-request output polarity select (1273 only).
pub const TESTMODE_CLK_REQ_OUTN_SEL: u32 = 0xC10;
/// Fuse word carrying the process-grade version (1273 only).
pub const FUSE_DATA_2_1: u32 = 0x1FC;
/// Process-grade bits of [`FUSE_DATA_2_1`].
pub const PG_VERSION_MASK: u32 = 0x3C;
/// Shift of the process-grade field.
pub const PG_VERSION_OFFSET: u32 = 2;
/// SDIO/wSPI pad drive-strength register (1283 only); bits [1:0] select
/// 8/4/6/2 mA.
pub const SDIO_IO_DS: u32 = 0xD14;
/// Platform-configuration bits feeding the drive-strength field.
pub const DRIVE_STRENGTH_MASK: u8 = 0x6;

/// System clock configuration register.
pub const SYS_CLK_CFG_REG: u32 = 0x2200;
/// FREF mux enable for the WLAN clock supply (also the source-select read
/// bit).
pub const PRCM_CM_EN_MUX_WLAN_FREF: u32 = 1 << 4;
/// MCS-PLL input select: FREF.
pub const MCS_PLL_CLK_SEL_FREF: u32 = 1 << 3;
/// FREF clock-request enable used by the PG 1.0 switch-over.
pub const WL_CLK_REQ_TYPE_FREF: u32 = 1 << 0;
/// PG 2.0 switch-over value for [`SYS_CLK_CFG_REG`].
pub const SYS_CLK_CFG_FREF_SWITCH_PG20: u32 = 0x0D;

/// TCXO detection status register.
pub const TCXO_CLK_DETECT_REG: u32 = 0x2228;
/// TCXO detection failed bit.
pub const TCXO_DET_FAILED: u32 = 1 << 4;
/// FREF detection status register.
pub const FREF_CLK_DETECT_REG: u32 = 0x2224;
/// FREF detection failed bit.
pub const FREF_CLK_DETECT_FAIL: u32 = 1 << 4;

/// Spare register guarding top-space access sequencing.
pub const WL_SPARE_REG: u32 = 0x2320;
/// Bit 2, set before MCS-PLL reconfiguration on PG 2.0.
pub const WL_SPARE_VAL: u32 = 0x04;
/// Bits 3, 5, 6 — PG 2.0 prologue of the TCXO-to-FREF switch.
pub const WL_SPARE_TCXO_SWITCH: u32 = 0x68;

/// PLL lock-counter thresholds register (PG 1.0 only).
pub const PLL_LOCK_COUNTERS_REG: u32 = 0xD40;
/// Coexistence-PLL lock-counter threshold.
pub const PLL_LOCK_COUNTERS_COEX: u32 = 0x0F;
/// MCS-PLL lock-counter threshold.
pub const PLL_LOCK_COUNTERS_MCS: u32 = 0xF0;

/// MCS-PLL configuration register.
pub const MCS_PLL_CONFIG_REG: u32 = 0xD92;
/// MCS-PLL M divider register.
pub const MCS_PLL_M_REG: u32 = 0xD94;
/// MCS-PLL N divider register.
pub const MCS_PLL_N_REG: u32 = 0xD96;
/// Hand-tuned M value for 16.8/33.6 MHz TCXOs.
pub const MCS_PLL_M_REG_VAL: u32 = 0x01EA;
/// Hand-tuned N value for 16.8/33.6 MHz TCXOs.
pub const MCS_PLL_N_REG_VAL: u32 = 0x12;
/// Hand-tuned config value for 16.8/33.6 MHz TCXOs.
pub const MCS_PLL_CONFIG_REG_VAL: u32 = 0x04CF;
/// Input-frequency code field, bits [6:4] of [`MCS_PLL_CONFIG_REG`].
pub const MCS_SEL_IN_FREQ_MASK: u32 = 0x0070;
/// Shift of the input-frequency code field.
pub const MCS_SEL_IN_FREQ_SHIFT: u32 = 4;
/// Revision tag ORed into the config word on PG 1.0.
pub const MCS_PLL_TAG_PG10: u32 = 0x02;
/// Revision tag ORed into the config word on PG 2.0.
pub const MCS_PLL_TAG_PG20: u32 = 0x03;

/// Stall before the clock-source detection read, in microseconds.
pub const PLL_DETECT_STALL_US: u32 = 60_000;
/// FREF settling time after the switch-over, in microseconds.
pub const PLL_SETTLE_STALL_US: u32 = 15_000;

// ---------------------------------------------------------------------------
// Calibration (NVS) and firmware transfer
// ---------------------------------------------------------------------------

/// Fixed mailbox address the calibration TLV tail is written to.
pub const CMD_MBOX_ADDRESS: u32 = 0x0004_07B4;
/// Stall before signalling EEPROM-sourced calibration, in microseconds
/// (lets the on-chip burst read finish).
pub const EEPROM_BURST_STALL_US: u32 = 40_000;
/// Alignment of the calibration TLV tail.
pub const NVS_DATA_ALIGNMENT: u32 = 4;

/// Maximal block moved in a single bus transfer — the firmware image chunk
/// size.
pub const MAX_TRANSFER_BLOCK: usize = 0x1000;

/// Init-complete poll budget when polling inline with a short stall.
pub const FIN_POLL_LOOP: u32 = 20_000;
/// Init-complete poll budget when each retry is a host-scheduled timer.
pub const FIN_POLL_LOOP_TIMER: u32 = 10;
/// Inline stall between init-complete polls, in microseconds.
pub const FIN_POLL_STALL_US: u32 = 50;
/// Stall-timer period between init-complete polls, in milliseconds.
pub const STALL_TIMEOUT_MS: u32 = 7;

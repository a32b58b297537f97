//! The boot sequence machine.
//!
//! Fourteen ordered stages take the chip from power-on to "ready for
//! firmware": identify the silicon, program the reference clock (legacy
//! two-register sequence or the newer PLL machine), issue the ELP wake-up,
//! seed the clock-domain scratch word, soft-reset, stream the calibration
//! image, then walk the variant-specific top-register init. Each stage
//! performs its register work and falls through to the next; any deferred
//! transaction suspends the whole chain and completion re-enters it here.

use embedded_hal::delay::DelayNs;
use wilink_bus::{ready, BusTransport, Step};

use crate::chip::{ChipFamily, ChipId, ChipVariant};
use crate::engine::{BootHost, DownloadStatus, HwInit, ResumeTo};
use crate::error::BootError;
use crate::nvs::{NvsSource, NvsState, DEF_NVS_SIZE};
use crate::ocp::TopInitiator;
use crate::regs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum BootStage {
    #[default]
    Idle,
    /// Working partition + chip-id read issued.
    ChipId,
    /// Validate the identity, branch to the clock strategy.
    Identify,
    /// Wake-up counter (legacy), ELP wake command, clock partition, clock
    /// scratch read.
    WakeUp,
    /// Compute and write the clock scratch word, back to working
    /// partition, mask interrupts, soft reset.
    ClockScratch,
    /// Select the calibration source and run the burst loader.
    Calibration,
    /// Signal the calibration source to the chip, read the readiness pad.
    CalibrationSignal,
    /// Validate readiness; enter the restart sub-sequence.
    Readiness,
    /// Clock-request top-register read (type-flag dependent).
    ClkReqRead,
    /// Clock-request top-register write-back.
    ClkReqWrite,
    /// 1283: pad drive strength. 1273: polarity-select read.
    BusDrive,
    /// 1273: polarity-select write-back.
    PolaritySelect,
    /// 1273: fuse-data read.
    FuseRead,
    /// 1273: hand the process grade to the host.
    FuseStore,
    /// Terminal: mark complete, fire the ready callback.
    Done,
}

/// Boot machine state. The stage value is all there is — everything the
/// stages exchange travels through the slot arena or the engine context.
#[derive(Debug, Default)]
pub(crate) struct BootState {
    pub stage: BootStage,
}

impl BootState {
    pub fn start() -> Self {
        Self {
            stage: BootStage::ChipId,
        }
    }
}

impl<'a, B, D, H> HwInit<'a, B, D, H>
where
    B: BusTransport,
    D: DelayNs,
    H: BootHost,
{
    fn chip_family(&self) -> Result<ChipFamily, BootError> {
        self.variant.map(ChipVariant::family).ok_or(BootError::State)
    }

    /// The newer PLL machine is engaged only on 1283 silicon with the
    /// algorithm enabled; everything else takes the legacy inline sequence.
    pub(crate) fn new_pll_active(&self) -> bool {
        self.config.new_pll_algorithm
            && self
                .variant
                .is_some_and(|v| v.family() == ChipFamily::Wl1283)
    }

    /// Soft-reset sub-machine: disable Rx and Tx paths.
    fn soft_reset(&mut self) -> Result<Step, BootError> {
        self.issue_write(regs::REG_ENABLE_TX_RX, 0, ResumeTo::Boot)
    }

    pub(crate) fn boot_step(&mut self) -> Result<Step, BootError> {
        loop {
            match self.boot.stage {
                BootStage::Idle => return Ok(Step::Complete),

                BootStage::ChipId => {
                    self.boot.stage = BootStage::Identify;
                    // Bus windows to their running arrangement first; the
                    // identity register lives in the register block.
                    self.set_partition(regs::working_partition())?;
                    ready!(self.issue_read(regs::CHIP_ID, ResumeTo::Boot));
                }

                BootStage::Identify => {
                    let raw = self.take_read()?;
                    let Some(id) = ChipId::from_raw(raw) else {
                        error!("unknown chip id {=u32:x}", raw);
                        return Err(BootError::UnknownChipId(raw));
                    };
                    if id == ChipId::Wl1273Pg10 {
                        warn!("1273 PG 1.0 detected - no longer supported");
                    } else {
                        info!("chip identified: {}", id);
                    }
                    self.variant = Some(ChipVariant::new(id));
                    self.boot.stage = BootStage::WakeUp;

                    if self.new_pll_active() {
                        self.pll = crate::pll::PllState::start();
                        ready!(self.pll_step());
                    } else {
                        // Legacy clock sequence: select the reference input,
                        // then read the register back to merge the pause
                        // threshold in the next stage.
                        let clk = match self.config.ref_freq_code() {
                            1 | 3 | 5 => 0x5, // 26 / 52 / 26-XTAL
                            _ => 0x3,         // 19.2 / 38.4 / 38.4-XTAL
                        };
                        self.post_write(regs::PLL_PARAMETERS, clk)?;
                        ready!(self.issue_read(regs::PLL_PARAMETERS, ResumeTo::Boot));
                    }
                }

                BootStage::WakeUp => {
                    if !self.new_pll_active() {
                        let mut v = self.take_read()?;
                        v &= !0x3FF;
                        v |= regs::WU_COUNTER_PAUSE_VAL;
                        self.post_write(regs::WU_COUNTER_PAUSE, v)?;
                    }
                    // Continue the ELP wake-up sequence.
                    self.post_write(regs::WELP_ARM_COMMAND, regs::WELP_ARM_COMMAND_VAL)?;
                    self.delay.delay_us(regs::ELP_WAKEUP_STALL_US);

                    self.set_partition(regs::clock_partition())?;
                    self.boot.stage = BootStage::ClockScratch;
                    ready!(self.issue_read(regs::DRPW_SCRATCH_START, ResumeTo::Boot));
                }

                BootStage::ClockScratch => {
                    // The firmware adds the RTRIM value before releasing the
                    // clock domain from reset; we contribute the reference
                    // frequency bits.
                    let mut clk = self.take_read()?;
                    let src = match self.chip_family()? {
                        ChipFamily::Wl1283 => {
                            if self.pll.fref_selected {
                                self.config.ref_clock
                            } else {
                                self.config.tcxo_clock
                            }
                        }
                        ChipFamily::Wl1273 => self.config.ref_clock,
                    };
                    clk |= ((src & 0x3) << 1) << 4;
                    if self.config.general_settings & regs::DRPW_MASK_CHECK != 0 {
                        clk |= regs::DRPW_MASK_SET;
                    }
                    self.post_write(regs::DRPW_SCRATCH_START, clk)?;

                    self.set_partition(regs::working_partition())?;
                    self.post_write(regs::ACX_REG_INTERRUPT_MASK, regs::ACX_INTR_ALL)?;

                    self.boot.stage = BootStage::Calibration;
                    ready!(self.soft_reset());
                }

                BootStage::Calibration => {
                    let (source, total) = match self.nvs_buf.as_deref() {
                        Some(buf) => {
                            info!("calibration image supplied, {} bytes", buf.len());
                            (NvsSource::Caller, buf.len())
                        }
                        None => {
                            warn!("no calibration image - using built-in default");
                            (NvsSource::Default, DEF_NVS_SIZE)
                        }
                    };
                    self.nvs = NvsState::start(source, total);
                    self.boot.stage = BootStage::CalibrationSignal;
                    ready!(self.nvs_step());
                }

                BootStage::CalibrationSignal => {
                    if self.nvs.used_caller_image() {
                        // Host-supplied image: tell the firmware there is no
                        // EEPROM to burst from.
                        self.post_write(
                            regs::ACX_EEPROMLESS_IND_REG,
                            regs::ACX_EEPROMLESS_IND_REG,
                        )?;
                    } else {
                        // Give the on-chip burst read time to finish before
                        // pointing the firmware at the EEPROM.
                        self.delay.delay_us(regs::EEPROM_BURST_STALL_US);
                        self.post_write(regs::ACX_EEPROMLESS_IND_REG, regs::USE_EEPROM)?;
                    }
                    self.boot.stage = BootStage::Readiness;
                    ready!(self.issue_read(regs::SCR_PAD2, ResumeTo::Boot));
                }

                BootStage::Readiness => {
                    let v = self.take_read()?;
                    if v == 0xFFFF_FFFF {
                        error!("readiness scratch register reads all-ones");
                        return Err(BootError::ScratchPadInvalid);
                    }
                    self.boot.stage = if self.config.top_init_bypass {
                        BootStage::Done
                    } else {
                        BootStage::ClkReqRead
                    };
                }

                BootStage::ClkReqRead => {
                    self.boot.stage = BootStage::ClkReqWrite;
                    if self.config.clk_req_needs_prcm() {
                        ready!(self.top_read(regs::CLK_REQ, TopInitiator::Boot));
                    }
                }

                BootStage::ClkReqWrite => {
                    self.boot.stage = BootStage::BusDrive;
                    if self.config.clk_req_needs_prcm() {
                        let mut v = self.top_result()?;
                        v &= regs::FREF_CLK_TYPE_BITS;
                        v |= regs::CLK_REQ_PRCM;
                        ready!(self.top_write(regs::CLK_REQ, v, TopInitiator::Boot));
                    }
                }

                BootStage::BusDrive => {
                    self.boot.stage = BootStage::PolaritySelect;
                    match self.chip_family()? {
                        ChipFamily::Wl1283 => {
                            // Pad drive strength from the platform byte,
                            // bits [2:1] into register bits [1:0].
                            let ds = u32::from(
                                (self.config.platform_configuration & regs::DRIVE_STRENGTH_MASK)
                                    >> 1,
                            );
                            ready!(self.top_write(regs::SDIO_IO_DS, ds, TopInitiator::Boot));
                        }
                        ChipFamily::Wl1273 => {
                            if self.config.clk_req_outn_needed() {
                                ready!(self.top_read(
                                    regs::TESTMODE_CLK_REQ_OUTN_SEL,
                                    TopInitiator::Boot
                                ));
                            }
                        }
                    }
                }

                BootStage::PolaritySelect => {
                    self.boot.stage = BootStage::FuseRead;
                    if self.chip_family()? == ChipFamily::Wl1273
                        && self.config.clk_req_outn_needed()
                    {
                        let mut v = self.top_result()?;
                        v &= regs::FREF_CLK_POLARITY_BITS;
                        v |= regs::CLK_REQ_OUTN_SEL;
                        ready!(self.top_write(
                            regs::TESTMODE_CLK_REQ_OUTN_SEL,
                            v,
                            TopInitiator::Boot
                        ));
                    }
                }

                BootStage::FuseRead => {
                    self.boot.stage = BootStage::FuseStore;
                    if self.chip_family()? == ChipFamily::Wl1273 {
                        ready!(self.top_read(regs::FUSE_DATA_2_1, TopInitiator::Boot));
                    }
                }

                BootStage::FuseStore => {
                    self.boot.stage = BootStage::Done;
                    if self.chip_family()? == ChipFamily::Wl1273 {
                        let v = self.top_result()?;
                        #[allow(clippy::cast_possible_truncation)] // 4-bit field
                        let pg = ((v & regs::PG_VERSION_MASK) >> regs::PG_VERSION_OFFSET) as u8;
                        self.host.pg_version(pg);
                    }
                }

                BootStage::Done => {
                    self.boot.stage = BootStage::Idle;
                    self.download_status = DownloadStatus::Complete;
                    info!("hardware init complete");
                    self.host.hw_init_done();
                    return Ok(Step::Complete);
                }
            }
        }
    }
}

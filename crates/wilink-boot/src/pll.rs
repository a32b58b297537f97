//! The newer PLL/clock configuration machine (1283 silicon).
//!
//! Detects whether the chip runs from FREF or TCXO, performs the
//! TCXO-to-FREF switch-over for the two frequencies that require it, and
//! programs the MCS PLL's input-frequency code. The mapping from nominal
//! oscillator frequency to PLL code is non-linear and revision-dependent,
//! so it lives in data (the `*_pll_code` tables) and the machine itself
//! stays uniform.
//!
//! Every top-register touch goes through the OCP machine; if any of them
//! defers, the terminal stage re-enters the boot machine so the sequence
//! continues exactly where it called in.

use embedded_hal::delay::DelayNs;
use wilink_bus::{ready, BusTransport, Step};

use crate::chip::SiliconRev;
use crate::engine::{BootHost, HwInit};
use crate::error::BootError;
use crate::ocp::TopInitiator;
use crate::regs;

/// MCS PLL input-frequency code: 19.2 MHz.
pub(crate) const MCS_PLL_FREQ_19_2: u32 = 0;
/// MCS PLL input-frequency code: 26 MHz.
pub(crate) const MCS_PLL_FREQ_26: u32 = 1;
/// MCS PLL input-frequency code: 38.4 MHz.
pub(crate) const MCS_PLL_FREQ_38_4: u32 = 2;

/// PLL input code for an FREF-sourced reference clock.
///
/// 38.4 and 52 MHz divide down on this silicon, so their codes collapse to
/// 19.2 and 26; the crystal variants keep their native code.
pub(crate) fn fref_pll_code(freq: u32) -> u32 {
    match freq {
        regs::CLOCK_CONFIG_26_M | regs::CLOCK_CONFIG_26_M_XTAL | regs::CLOCK_CONFIG_52_M => {
            MCS_PLL_FREQ_26
        }
        regs::CLOCK_CONFIG_38_4_M_XTAL => MCS_PLL_FREQ_38_4,
        _ => MCS_PLL_FREQ_19_2, // 19.2, divided 38.4, and the default
    }
}

/// PLL input code for a TCXO-sourced reference clock.
///
/// Same divide-down collapse as the FREF table; 16.8 and 33.6 MHz never
/// reach this table — they take the hand-tuned M/N override instead.
pub(crate) fn tcxo_pll_code(freq: u32) -> u32 {
    match freq {
        regs::CLOCK_CONFIG_26_M | regs::CLOCK_CONFIG_52_M => MCS_PLL_FREQ_26,
        _ => MCS_PLL_FREQ_19_2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PllStage {
    #[default]
    Idle,
    /// Initial settle, clock-source detection read.
    Detect,
    /// Branch on the FREF/TCXO select bit.
    ClockSource,
    /// TCXO path: judge the detection status and the configured frequency;
    /// start the switch-over if it is one of the two that need it.
    TcxoSwitch {
        /// A detection-status read gates this stage.
        detect_read: bool,
    },
    /// PG 2.0 switch-over, second write.
    TcxoSwitchCfg,
    /// Post-switch settle, FREF detection read.
    Settle,
    /// Judge FREF detection; route MCS PLL input and WLAN supply to FREF.
    FrefDetect,
    /// PG 1.0 lock-counter thresholds.
    LockCounters,
    /// Read the MCS PLL config register to preserve unrelated bits.
    McsRead,
    /// PG 2.0: guard the reconfiguration through the spare register.
    ConfigWrite,
    /// PG 2.0: branch to the manual override or the table path.
    SpareDone,
    /// Manual override: N divider.
    ManualN,
    /// Manual override: config register.
    ManualCfg,
    /// Write the merged config word.
    FinalWrite,
    /// Terminal: re-enter the boot machine if anything deferred.
    Done,
}

/// PLL machine state.
#[derive(Debug, Default)]
pub(crate) struct PllState {
    pub stage: PllStage,
    /// The chip runs (or now runs) from FREF; consulted later by the boot
    /// machine when seeding the clock scratch word.
    pub fref_selected: bool,
    /// Last value of the system clock-config register.
    pub clock_config: u32,
    /// MCS PLL config read-back, carried to the final write.
    pub mcs_config: u32,
    /// Any step deferred; `Done` must re-enter the boot machine.
    pub pended: bool,
}

impl PllState {
    pub fn start() -> Self {
        Self {
            stage: PllStage::Detect,
            ..Self::default()
        }
    }
}

impl<'a, B, D, H> HwInit<'a, B, D, H>
where
    B: BusTransport,
    D: DelayNs,
    H: BootHost,
{
    fn silicon(&self) -> Result<SiliconRev, BootError> {
        self.variant.map(|v| v.silicon()).ok_or(BootError::State)
    }

    /// Track deferral across the whole machine for the terminal re-entry.
    fn pll_gate(&mut self, step: Result<Step, BootError>) -> Result<Step, BootError> {
        match step? {
            Step::Pending => {
                self.pll.pended = true;
                Ok(Step::Pending)
            }
            Step::Complete => Ok(Step::Complete),
        }
    }

    pub(crate) fn pll_step(&mut self) -> Result<Step, BootError> {
        loop {
            match self.pll.stage {
                PllStage::Idle => return Ok(Step::Complete),

                PllStage::Detect => {
                    self.delay.delay_us(regs::PLL_DETECT_STALL_US);
                    // Crystal-only configurations go straight to the
                    // switch-over judgement.
                    if self.config.ref_clock == regs::CLOCK_CONFIG_38_4_M_XTAL
                        || self.config.ref_clock == regs::CLOCK_CONFIG_26_M_XTAL
                    {
                        self.pll.stage = PllStage::TcxoSwitch { detect_read: false };
                        continue;
                    }
                    self.pll.stage = PllStage::ClockSource;
                    let r = self.top_read(regs::SYS_CLK_CFG_REG, TopInitiator::Pll);
                    ready!(self.pll_gate(r));
                }

                PllStage::ClockSource => {
                    self.pll.clock_config = self.top_result()?;
                    if self.pll.clock_config & regs::PRCM_CM_EN_MUX_WLAN_FREF != 0 {
                        info!("clock source: FREF");
                        self.pll.fref_selected = true;
                        self.pll.stage = PllStage::Settle;
                        continue;
                    }
                    info!("clock source: TCXO");
                    self.pll.stage = PllStage::TcxoSwitch { detect_read: true };
                    let r = self.top_read(regs::TCXO_CLK_DETECT_REG, TopInitiator::Pll);
                    ready!(self.pll_gate(r));
                }

                PllStage::TcxoSwitch { detect_read } => {
                    if detect_read {
                        let status = self.top_result()?;
                        if status & regs::TCXO_DET_FAILED != 0 {
                            error!("TCXO detection failed");
                        }
                    }
                    // Only 16.368 and 32.736 MHz TCXOs require the explicit
                    // switch to FREF.
                    if self.config.tcxo_clock != regs::CLOCK_CONFIG_16_368_M
                        && self.config.tcxo_clock != regs::CLOCK_CONFIG_32_736_M
                    {
                        self.pll.stage = PllStage::LockCounters;
                        continue;
                    }
                    self.pll.fref_selected = true;
                    match self.silicon()? {
                        SiliconRev::Pg10 => {
                            self.pll.clock_config |= regs::WL_CLK_REQ_TYPE_FREF;
                            let cfg = self.pll.clock_config;
                            self.pll.stage = PllStage::Settle;
                            let r = self.top_write(regs::SYS_CLK_CFG_REG, cfg, TopInitiator::Pll);
                            ready!(self.pll_gate(r));
                        }
                        SiliconRev::Pg20 => {
                            self.pll.stage = PllStage::TcxoSwitchCfg;
                            let r = self.top_write(
                                regs::WL_SPARE_REG,
                                regs::WL_SPARE_TCXO_SWITCH,
                                TopInitiator::Pll,
                            );
                            ready!(self.pll_gate(r));
                        }
                    }
                }

                PllStage::TcxoSwitchCfg => {
                    self.top_result()?;
                    self.pll.stage = PllStage::Settle;
                    let r = self.top_write(
                        regs::SYS_CLK_CFG_REG,
                        regs::SYS_CLK_CFG_FREF_SWITCH_PG20,
                        TopInitiator::Pll,
                    );
                    ready!(self.pll_gate(r));
                }

                PllStage::Settle => {
                    self.delay.delay_us(regs::PLL_SETTLE_STALL_US);
                    self.pll.stage = PllStage::FrefDetect;
                    let r = self.top_read(regs::FREF_CLK_DETECT_REG, TopInitiator::Pll);
                    ready!(self.pll_gate(r));
                }

                PllStage::FrefDetect => {
                    let status = self.top_result()?;
                    if status & regs::FREF_CLK_DETECT_FAIL != 0 {
                        error!("FREF detection failed");
                    }
                    if self.silicon()? == SiliconRev::Pg10 {
                        // Route both the MCS PLL input and the WLAN clock
                        // supply to FREF.
                        self.pll.clock_config |=
                            regs::MCS_PLL_CLK_SEL_FREF | regs::PRCM_CM_EN_MUX_WLAN_FREF;
                        let cfg = self.pll.clock_config;
                        self.pll.stage = PllStage::LockCounters;
                        let r = self.top_write(regs::SYS_CLK_CFG_REG, cfg, TopInitiator::Pll);
                        ready!(self.pll_gate(r));
                    } else {
                        self.pll.stage = PllStage::LockCounters;
                    }
                }

                PllStage::LockCounters => {
                    if self.silicon()? == SiliconRev::Pg10 {
                        // Time from PLL enable to lock indication.
                        self.pll.stage = PllStage::McsRead;
                        let r = self.top_write(
                            regs::PLL_LOCK_COUNTERS_REG,
                            regs::PLL_LOCK_COUNTERS_COEX | regs::PLL_LOCK_COUNTERS_MCS,
                            TopInitiator::Pll,
                        );
                        ready!(self.pll_gate(r));
                    } else {
                        self.pll.stage = PllStage::McsRead;
                    }
                }

                PllStage::McsRead => {
                    // Read-modify-write: only bits [6:4] belong to us.
                    self.pll.stage = PllStage::ConfigWrite;
                    let r = self.top_read(regs::MCS_PLL_CONFIG_REG, TopInitiator::Pll);
                    ready!(self.pll_gate(r));
                }

                PllStage::ConfigWrite => {
                    self.pll.mcs_config = self.top_result()?;
                    if self.silicon()? == SiliconRev::Pg20 {
                        // Bit 2 of the spare register guards against illegal
                        // access during the reconfiguration.
                        self.pll.stage = PllStage::SpareDone;
                        let r = self.top_write(
                            regs::WL_SPARE_REG,
                            regs::WL_SPARE_VAL,
                            TopInitiator::Pll,
                        );
                        ready!(self.pll_gate(r));
                    } else {
                        self.pll.stage = PllStage::FinalWrite;
                    }
                }

                PllStage::SpareDone => {
                    self.top_result()?;
                    let manual = !self.pll.fref_selected
                        && (self.config.tcxo_clock == regs::CLOCK_CONFIG_16_8_M
                            || self.config.tcxo_clock == regs::CLOCK_CONFIG_33_6_M);
                    if manual {
                        // Hand-tuned dividers for the two oddball TCXOs.
                        self.pll.stage = PllStage::ManualN;
                        let r = self.top_write(
                            regs::MCS_PLL_M_REG,
                            regs::MCS_PLL_M_REG_VAL,
                            TopInitiator::Pll,
                        );
                        ready!(self.pll_gate(r));
                    } else {
                        self.pll.stage = PllStage::FinalWrite;
                    }
                }

                PllStage::ManualN => {
                    self.top_result()?;
                    self.pll.stage = PllStage::ManualCfg;
                    let r = self.top_write(
                        regs::MCS_PLL_N_REG,
                        regs::MCS_PLL_N_REG_VAL,
                        TopInitiator::Pll,
                    );
                    ready!(self.pll_gate(r));
                }

                PllStage::ManualCfg => {
                    self.top_result()?;
                    self.pll.stage = PllStage::Done;
                    let r = self.top_write(
                        regs::MCS_PLL_CONFIG_REG,
                        regs::MCS_PLL_CONFIG_REG_VAL,
                        TopInitiator::Pll,
                    );
                    ready!(self.pll_gate(r));
                }

                PllStage::FinalWrite => {
                    let code = if self.pll.fref_selected {
                        fref_pll_code(self.config.ref_clock)
                    } else {
                        tcxo_pll_code(self.config.tcxo_clock)
                    };
                    let mut v = self.pll.mcs_config;
                    v &= !regs::MCS_SEL_IN_FREQ_MASK;
                    v |= (code << regs::MCS_SEL_IN_FREQ_SHIFT) & regs::MCS_SEL_IN_FREQ_MASK;
                    v |= match self.silicon()? {
                        SiliconRev::Pg10 => regs::MCS_PLL_TAG_PG10,
                        SiliconRev::Pg20 => regs::MCS_PLL_TAG_PG20,
                    };
                    self.pll.stage = PllStage::Done;
                    let r = self.top_write(regs::MCS_PLL_CONFIG_REG, v, TopInitiator::Pll);
                    ready!(self.pll_gate(r));
                }

                PllStage::Done => {
                    self.top.outcome = None;
                    self.pll.stage = PllStage::Idle;
                    if core::mem::take(&mut self.pll.pended) {
                        // Something deferred along the way: the boot machine
                        // is suspended at the stage that called in — resume
                        // it.
                        return self.boot_step();
                    }
                    return Ok(Step::Complete);
                }
            }
        }
    }
}

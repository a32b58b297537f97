//! Standalone IRQ-polarity configuration.
//!
//! Reads the function-0 CCCR shadow through the OCP path, sets the
//! polarity bit, and writes it back. This runs outside the boot sequence
//! proper, so a top-register failure here is reported to the host as a
//! not-ok result instead of tearing the engine down.

use embedded_hal::delay::DelayNs;
use wilink_bus::{ready, BusTransport, Step};

use crate::engine::{BootHost, HwInit};
use crate::error::BootError;
use crate::ocp::TopInitiator;
use crate::regs;

/// IRQ polarity bit in the CCCR shadow (1 = active low).
const CCCR_IRQ_POLARITY: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PolarityStage {
    #[default]
    Idle,
    Read,
    Modify,
    Confirm,
}

/// IRQ-polarity machine state.
#[derive(Debug, Default)]
pub(crate) struct PolarityState {
    pub stage: PolarityStage,
}

impl PolarityState {
    pub fn start() -> Self {
        Self {
            stage: PolarityStage::Read,
        }
    }
}

impl<'a, B, D, H> HwInit<'a, B, D, H>
where
    B: BusTransport,
    D: DelayNs,
    H: BootHost,
{
    pub(crate) fn polarity_step(&mut self) -> Result<Step, BootError> {
        loop {
            match self.pol.stage {
                PolarityStage::Idle => return Ok(Step::Complete),

                PolarityStage::Read => {
                    // Standalone invocations may precede boot; the OCP block
                    // needs the register window mapped.
                    if self.partition.active_kind().is_none() {
                        self.set_partition(regs::working_partition())?;
                    }
                    self.pol.stage = PolarityStage::Modify;
                    ready!(self.top_read(regs::FN0_CCCR_REG_32, TopInitiator::Polarity));
                }

                PolarityStage::Modify => {
                    let current = match self.top_result_local()? {
                        Ok(v) => v,
                        Err(_) => {
                            error!("IRQ polarity: CCCR read failed");
                            self.pol.stage = PolarityStage::Idle;
                            self.host.irq_polarity_done(false);
                            return Ok(Step::Complete);
                        }
                    };
                    let value = if self.config.irq_active_low {
                        current | CCCR_IRQ_POLARITY
                    } else {
                        current
                    };
                    self.pol.stage = PolarityStage::Confirm;
                    ready!(self.top_write(regs::FN0_CCCR_REG_32, value, TopInitiator::Polarity));
                }

                PolarityStage::Confirm => {
                    let ok = self.top_result_local()?.is_ok();
                    self.pol.stage = PolarityStage::Idle;
                    self.host.irq_polarity_done(ok);
                    return Ok(Step::Complete);
                }
            }
        }
    }
}

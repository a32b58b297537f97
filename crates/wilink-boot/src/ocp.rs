//! OCP indirect access to the "top" register space.
//!
//! Top registers are not bus-addressable. To write one: put the halved
//! target address (masked to the variant's valid bits, tagged) into
//! `OCP_POR_CTR`, the value into `OCP_POR_WDATA`, then the write command
//! into `OCP_CMD`. To read: program `OCP_POR_CTR` the same way, issue the
//! read command, then poll `OCP_DATA_RD` until bit 18 signals data valid
//! and bits 17:16 decode to "accept".
//!
//! Failure policy is local: a rejected response or an exhausted poll budget
//! produces a not-ok result for the *initiator* to judge. The boot and PLL
//! machines escalate it to a fatal error; the IRQ-polarity path reports it
//! to the host and carries on. This primitive never invokes engine-wide
//! failure finalization on its own.

use embedded_hal::delay::DelayNs;
use wilink_bus::{BusTransport, Step};

use crate::engine::{BootHost, HwInit, ResumeTo};
use crate::error::BootError;
use crate::regs;

/// Local failure of one top-register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TopAccessError {
    /// The response field decoded to something other than "accept".
    Rejected,
    /// The data-valid bit never set within the poll budget.
    TimedOut,
}

/// Which machine re-enters when a deferred OCP step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum TopInitiator {
    #[default]
    None,
    Boot,
    Pll,
    Polarity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum TopStage {
    #[default]
    Idle,
    /// Issue the `OCP_DATA_RD` poll read.
    Fetch,
    /// Decode the poll read.
    Check,
    /// A write's command transaction completed.
    Confirm,
    /// Deliver the outcome, re-entering the initiator if we suspended.
    Done,
}

/// Top-register access machine state.
#[derive(Debug, Default)]
pub(crate) struct TopState {
    pub stage: TopStage,
    pub initiator: TopInitiator,
    pub retries: u32,
    /// Any step of this access was deferred; the initiator must be
    /// re-entered from `Done`.
    pub pended: bool,
    pub outcome: Option<Result<u32, TopAccessError>>,
}

impl<'a, B, D, H> HwInit<'a, B, D, H>
where
    B: BusTransport,
    D: DelayNs,
    H: BootHost,
{
    fn top_addr_field(&self, addr: u32) -> u32 {
        let mask = self
            .variant
            .map_or(regs::TOP_REG_ADDR_MASK_1273, |v| v.top_addr_mask());
        ((addr / 2) & mask) | regs::OCP_ADDR_TAG
    }

    /// Start a top-register read. The result is consumed with
    /// [`Self::top_result`] (or [`Self::top_result_local`]) at the
    /// initiator's next stage.
    pub(crate) fn top_read(
        &mut self,
        addr: u32,
        initiator: TopInitiator,
    ) -> Result<Step, BootError> {
        let field = self.top_addr_field(addr);
        self.top = TopState {
            stage: TopStage::Fetch,
            initiator,
            retries: 0,
            pended: false,
            outcome: None,
        };
        self.post_write(regs::OCP_POR_CTR, field)?;
        self.post_write(regs::OCP_CMD, regs::OCP_CMD_READ)?;
        self.top_step()
    }

    /// Start a top-register write. Completion is signalled through
    /// [`Self::top_result`] like a read; the value delivered is zero.
    pub(crate) fn top_write(
        &mut self,
        addr: u32,
        value: u32,
        initiator: TopInitiator,
    ) -> Result<Step, BootError> {
        let field = self.top_addr_field(addr);
        self.top = TopState {
            stage: TopStage::Confirm,
            initiator,
            retries: 0,
            pended: false,
            outcome: None,
        };
        self.post_write(regs::OCP_POR_CTR, field)?;
        self.post_write(regs::OCP_POR_WDATA, value & 0xFFFF)?;
        match self.issue_write(regs::OCP_CMD, regs::OCP_CMD_WRITE, ResumeTo::Top)? {
            Step::Pending => {
                self.top.pended = true;
                Ok(Step::Pending)
            }
            Step::Complete => self.top_step(),
        }
    }

    /// Advance the access machine. Entered inline from
    /// [`Self::top_read`]/[`Self::top_write`] and from completion dispatch.
    pub(crate) fn top_step(&mut self) -> Result<Step, BootError> {
        loop {
            match self.top.stage {
                TopStage::Idle => return Ok(Step::Complete),

                TopStage::Fetch => {
                    self.top.stage = TopStage::Check;
                    match self.issue_read(regs::OCP_DATA_RD, ResumeTo::Top)? {
                        Step::Pending => {
                            self.top.pended = true;
                            return Ok(Step::Pending);
                        }
                        Step::Complete => {}
                    }
                }

                TopStage::Check => {
                    let v = self.take_read()?;
                    if v & regs::OCP_DATA_VALID != 0 {
                        let accepted = v & regs::OCP_STATUS_ACCEPT != 0
                            && v & regs::OCP_STATUS_REJECT == 0;
                        if accepted {
                            self.top.outcome = Some(Ok(v & 0xFFFF));
                        } else {
                            error!("top-register response rejected");
                            self.top.outcome = Some(Err(TopAccessError::Rejected));
                        }
                        self.top.stage = TopStage::Done;
                    } else if self.top.retries < regs::TOP_REG_RETRIES {
                        // Not valid yet: re-issue only the data read.
                        self.top.retries += 1;
                        self.top.stage = TopStage::Fetch;
                    } else {
                        error!("timeout polling top-register data valid");
                        self.top.outcome = Some(Err(TopAccessError::TimedOut));
                        self.top.stage = TopStage::Done;
                    }
                }

                TopStage::Confirm => {
                    self.top.outcome = Some(Ok(0));
                    self.top.stage = TopStage::Done;
                }

                TopStage::Done => {
                    self.top.stage = TopStage::Idle;
                    let pended = core::mem::take(&mut self.top.pended);
                    return if pended {
                        self.resume_top_initiator()
                    } else {
                        Ok(Step::Complete)
                    };
                }
            }
        }
    }

    fn resume_top_initiator(&mut self) -> Result<Step, BootError> {
        match self.top.initiator {
            TopInitiator::Boot => self.boot_step(),
            TopInitiator::Pll => self.pll_step(),
            TopInitiator::Polarity => self.polarity_step(),
            TopInitiator::None => Ok(Step::Complete),
        }
    }

    /// Consume the access outcome, escalating a local failure to the
    /// engine-fatal class. Used by the boot and PLL machines, whose
    /// sequences cannot proceed past a dead top register.
    pub(crate) fn top_result(&mut self) -> Result<u32, BootError> {
        match self.top.outcome.take() {
            Some(Ok(v)) => Ok(v),
            Some(Err(_)) => Err(BootError::TopRegisterAccess),
            None => Err(BootError::State),
        }
    }

    /// Consume the access outcome without escalation.
    pub(crate) fn top_result_local(
        &mut self,
    ) -> Result<Result<u32, TopAccessError>, BootError> {
        self.top.outcome.take().ok_or(BootError::State)
    }
}

#[cfg(test)]
mod tests {
    use crate::regs;

    // The address-field encoding is pure arithmetic; check it against the
    // documented protocol ("divide by 2, mask, add 0x30000").
    #[test]
    fn test_top_addr_field_encoding() {
        let addr = 0xC00_u32;
        let field = ((addr / 2) & regs::TOP_REG_ADDR_MASK_1273) | regs::OCP_ADDR_TAG;
        assert_eq!(field, 0x30600);
    }

    #[test]
    fn test_top_addr_mask_width_difference() {
        // 0xD14 halves to 0x68A: preserved by both masks, but a wider
        // address survives only the 1283 mask.
        let addr = 0x1F00_u32 / 2;
        assert_eq!(addr & regs::TOP_REG_ADDR_MASK_1273, 0x780);
        assert_eq!(addr & regs::TOP_REG_ADDR_MASK_1283, 0xF80);
    }
}

//! Finalize/run machine: release the CPU, wait for the firmware, wire up
//! the mailboxes.
//!
//! After the last firmware chunk lands, the embedded CPU is released from
//! halt and the engine polls the non-clearing interrupt status for the
//! init-complete bit — a bounded number of attempts, each separated either
//! by a short inline stall or by a host-scheduled one-shot timer (the
//! scheduling policy is the host's, the budget is ours). Then the command
//! and event mailboxes are configured through the host, the working
//! partition is restored, and the firmware's static info block is fetched
//! and handed to the host's finalize routine.

use embedded_hal::delay::DelayNs;
use wilink_bus::{ready, BusTransport, Step, TxnOutcome};

use crate::engine::{BootHost, DownloadStatus, HwInit, ResumeTo};
use crate::error::BootError;
use crate::regs;

/// Size of the static firmware-info block read from the mailbox area.
pub const FW_STATIC_INFO_SIZE: usize = 32;

/// Static information the firmware publishes next to the command mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FwStaticInfo {
    /// NUL-padded ASCII firmware version string.
    pub fw_version: [u8; 20],
    /// Hardware/radio version word.
    pub hw_version: u32,
    /// Station MAC address burned into the calibration.
    pub mac: [u8; 6],
}

impl FwStaticInfo {
    /// Decode the raw block. `None` if it is shorter than the fixed
    /// layout.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < FW_STATIC_INFO_SIZE {
            return None;
        }
        let mut fw_version = [0u8; 20];
        fw_version.copy_from_slice(&raw[0..20]);
        let hw_version = u32::from_le_bytes([raw[20], raw[21], raw[22], raw[23]]);
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&raw[24..30]);
        Some(Self {
            fw_version,
            hw_version,
            mac,
        })
    }

    /// The version string with NUL padding trimmed.
    #[must_use]
    pub fn version_str(&self) -> &str {
        let end = self
            .fw_version
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.fw_version.len());
        core::str::from_utf8(&self.fw_version[..end]).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FinStage {
    #[default]
    Idle,
    /// Read the CPU control register.
    CpuRead,
    /// Write it back with the halt-release bit.
    CpuRelease,
    /// Poll gate: budget check, stall, status read.
    PollEntry,
    /// Judge the status read.
    PollCheck,
    /// Timeout check, then command-mailbox configuration.
    CmdMailbox,
    /// Event-mailbox configuration.
    EventMailbox,
    /// Working partition, init interrupt mask, static-info read.
    FwStatic,
    /// Parse and hand off; mark the download complete.
    Done,
}

/// Finalize machine state.
#[derive(Debug, Default)]
pub(crate) struct FinState {
    pub stage: FinStage,
    /// Poll attempts spent waiting for init-complete.
    pub poll_iter: u32,
}

impl FinState {
    pub fn start() -> Self {
        Self {
            stage: FinStage::CpuRead,
            poll_iter: 0,
        }
    }
}

impl<'a, B, D, H> HwInit<'a, B, D, H>
where
    B: BusTransport,
    D: DelayNs,
    H: BootHost,
{
    fn poll_budget(&self) -> u32 {
        if self.config.use_stall_timer {
            regs::FIN_POLL_LOOP_TIMER
        } else {
            regs::FIN_POLL_LOOP
        }
    }

    fn host_gate(&mut self, outcome: TxnOutcome<()>) -> Result<Step, BootError> {
        match outcome {
            TxnOutcome::Complete(()) => Ok(Step::Complete),
            TxnOutcome::Pending => Ok(Step::Pending),
            TxnOutcome::Failed(e) => Err(e.into()),
        }
    }

    pub(crate) fn finalize_step(&mut self) -> Result<Step, BootError> {
        loop {
            match self.fin.stage {
                FinStage::Idle => return Ok(Step::Complete),

                FinStage::CpuRead => {
                    self.fin.stage = FinStage::CpuRelease;
                    ready!(self.issue_read(regs::ACX_REG_ECPU_CONTROL, ResumeTo::Finalize));
                }

                FinStage::CpuRelease => {
                    let v = self.take_read()?;
                    self.post_write(regs::ACX_REG_ECPU_CONTROL, v | regs::ECPU_CONTROL_HALT)?;
                    info!("firmware running, waiting for init complete");
                    self.fin.poll_iter = 0;
                    self.fin.stage = FinStage::PollEntry;
                }

                FinStage::PollEntry => {
                    if self.fin.poll_iter < self.poll_budget() {
                        self.fin.stage = FinStage::PollCheck;
                        if !self.config.use_stall_timer {
                            self.delay.delay_us(regs::FIN_POLL_STALL_US);
                        }
                        ready!(self.issue_read(
                            regs::ACX_REG_INTERRUPT_NO_CLEAR,
                            ResumeTo::Finalize
                        ));
                    } else {
                        self.fin.stage = FinStage::CmdMailbox;
                    }
                }

                FinStage::PollCheck => {
                    let v = self.take_read()?;
                    if v == 0xFFFF_FFFF {
                        error!("interrupt status reads all-ones");
                        return Err(BootError::InitIndicationInvalid);
                    }
                    if v & regs::ACX_INTR_INIT_COMPLETE != 0 {
                        // Acknowledge through the clearing register.
                        self.fin.stage = FinStage::CmdMailbox;
                        self.post_write(
                            regs::ACX_REG_INTERRUPT_ACK,
                            regs::ACX_INTR_INIT_COMPLETE,
                        )?;
                    } else {
                        self.fin.poll_iter += 1;
                        self.fin.stage = FinStage::PollEntry;
                        if self.config.use_stall_timer {
                            self.host.schedule_stall_timer(regs::STALL_TIMEOUT_MS);
                            return Ok(Step::Pending);
                        }
                    }
                }

                FinStage::CmdMailbox => {
                    if self.fin.poll_iter >= self.poll_budget() {
                        error!("timeout waiting for firmware init complete");
                        return Err(BootError::InitTimeout);
                    }
                    self.fin.stage = FinStage::EventMailbox;
                    let outcome = self.host.configure_cmd_mailbox();
                    ready!(self.host_gate(outcome));
                }

                FinStage::EventMailbox => {
                    self.fin.stage = FinStage::FwStatic;
                    let outcome = self.host.configure_event_mailbox();
                    ready!(self.host_gate(outcome));
                }

                FinStage::FwStatic => {
                    self.fin.stage = FinStage::Done;
                    self.set_partition(regs::working_partition())?;
                    // Unmask the events the firmware raises during its
                    // configuration phase.
                    self.host.set_init_interrupt_mask();
                    let addr = self.host.cmd_mailbox_address();
                    ready!(self.issue_read_block(addr, FW_STATIC_INFO_SIZE, ResumeTo::Finalize));
                }

                FinStage::Done => {
                    let info =
                        FwStaticInfo::parse(&self.last_block).ok_or(BootError::State)?;
                    self.host.finalize_download(&self.attr, &info);
                    self.fin.stage = FinStage::Idle;
                    self.download_status = DownloadStatus::Complete;
                    info!("firmware download finalized");
                    return Ok(Step::Complete);
                }
            }
        }
    }
}

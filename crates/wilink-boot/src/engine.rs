//! The engine object: context, completion routing, lifecycle.
//!
//! One [`HwInit`] exists per chip instance and is driven from a single
//! logical thread. Machines suspend only at bus-transaction boundaries;
//! while a transaction is pending the engine holds no lock and busy-waits
//! nowhere — control returns to the caller and resumption happens through
//! [`HwInit::bus_done`]. Exactly one machine is in flight at any instant,
//! so one `(token, resume-target)` pair is all the routing state needed.

use embedded_hal::delay::DelayNs;
use wilink_bus::{
    BlockData, BusCompletion, BusTransport, CompletionPayload, PartitionManager, PartitionTable,
    Step, TxnOutcome, TxnPool, TxnToken, BUS_FRAME_PAD,
};

use crate::boot::BootState;
use crate::chip::{BootAttr, BootConfig, ChipVariant};
use crate::error::BootError;
use crate::finalize::{FinState, FwStaticInfo};
use crate::fwload::LoadState;
use crate::nvs::{self, NvsState};
use crate::ocp::TopState;
use crate::polarity::PolarityState;
use crate::regs;

/// Engine-level progress of the current bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DownloadStatus {
    /// Nothing started yet (or the engine was reconfigured).
    #[default]
    Idle,
    /// A sequence is in flight; completions will advance it.
    Pending,
    /// The last started sequence ran to completion.
    Complete,
    /// A fatal error aborted the bring-up; reconfigure before retrying.
    Failed,
}

/// Host-driver collaboration surface.
///
/// Everything the engine cannot or must not do itself — mailbox protocol
/// setup, interrupt-mask policy, completion notifications — crosses this
/// trait. Callbacks marked with a three-way outcome follow the same
/// suspension protocol as the bus: on `Pending` the host later calls
/// [`HwInit::mailbox_configured`].
pub trait BootHost {
    /// Boot ran to its terminal stage; the chip is ready for firmware.
    fn hw_init_done(&mut self);

    /// A non-final firmware portion finished; the engine expects more.
    fn more_firmware_expected(&mut self);

    /// A fatal error tore the engine down. The instance must be fully
    /// re-initialized before another attempt.
    fn init_failed(&mut self, error: BootError);

    /// Outcome of [`HwInit::init_irq_polarity`]. `false` reports a
    /// top-register failure that did *not* abort the engine.
    fn irq_polarity_done(&mut self, ok: bool);

    /// Process-grade version read from the fuse data (1273 only).
    fn pg_version(&mut self, version: u8);

    /// Program the command-mailbox hardware addresses.
    fn configure_cmd_mailbox(&mut self) -> TxnOutcome<()>;

    /// Program the event-mailbox hardware addresses.
    fn configure_event_mailbox(&mut self) -> TxnOutcome<()>;

    /// Unmask the event interrupts needed during firmware configuration.
    fn set_init_interrupt_mask(&mut self);

    /// Device address of the command mailbox, used to fetch the firmware's
    /// static info block.
    fn cmd_mailbox_address(&self) -> u32 {
        regs::CMD_MBOX_ADDRESS
    }

    /// Firmware is up: hand the boot attributes and the static info block
    /// to the command path.
    fn finalize_download(&mut self, attr: &BootAttr, info: &FwStaticInfo);

    /// Schedule a one-shot timer that will call
    /// [`HwInit::stall_timer_fired`] after `delay_ms`. Only used when
    /// [`BootConfig::use_stall_timer`] is set.
    fn schedule_stall_timer(&mut self, delay_ms: u32) {
        let _ = delay_ms;
    }
}

/// Which machine a deferred transaction re-enters on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResumeTo {
    Boot,
    Nvs,
    Top,
    Load,
    Finalize,
}

/// The single in-flight gating transaction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Awaited {
    pub token: TxnToken,
    pub resume: ResumeTo,
}

/// One caller-supplied firmware portion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FwPortion<'a> {
    pub buf: &'a [u8],
    pub address: u32,
    pub last: bool,
}

/// Transfer scratch: one maximum chunk plus framing pad.
///
/// Held only while a portion's transfer is in flight; acquiring it twice
/// means a previous transfer never released it, which is the
/// scratch-allocation failure class.
pub(crate) struct Scratch {
    pub buf: [u8; BUS_FRAME_PAD + regs::MAX_TRANSFER_BLOCK],
    active: bool,
}

impl Scratch {
    const fn new() -> Self {
        Self {
            buf: [0; BUS_FRAME_PAD + regs::MAX_TRANSFER_BLOCK],
            active: false,
        }
    }

    pub fn acquire(&mut self) -> Result<(), BootError> {
        if self.active {
            return Err(BootError::ScratchBusy);
        }
        self.active = true;
        Ok(())
    }

    pub fn release(&mut self) {
        self.active = false;
    }
}

/// The bring-up engine for one chip instance.
///
/// Generic over:
/// - `B` — the [`BusTransport`] glue (SDIO/SPI queueing layer).
/// - `D` — a blocking [`DelayNs`] for the short fixed stalls the sequences
///   need.
/// - `H` — the owning driver's [`BootHost`] surface.
///
/// The `'a` lifetime ties the engine to the caller-owned calibration and
/// firmware buffers.
pub struct HwInit<'a, B, D, H> {
    pub(crate) bus: B,
    pub(crate) delay: D,
    pub(crate) host: H,

    pub(crate) config: BootConfig,
    pub(crate) attr: BootAttr,
    configured: bool,
    pub(crate) variant: Option<ChipVariant>,

    pub(crate) pool: TxnPool,
    pub(crate) partition: PartitionManager,
    pub(crate) awaited: Option<Awaited>,
    pub(crate) last_block: BlockData,
    pub(crate) download_status: DownloadStatus,

    pub(crate) nvs_buf: Option<&'a mut [u8]>,
    pub(crate) default_nvs: [u8; nvs::DEF_NVS_SIZE],
    pub(crate) fw: Option<FwPortion<'a>>,
    pub(crate) scratch: Scratch,

    pub(crate) boot: BootState,
    pub(crate) pll: crate::pll::PllState,
    pub(crate) nvs: NvsState,
    pub(crate) top: TopState,
    pub(crate) pol: PolarityState,
    pub(crate) load: LoadState,
    pub(crate) fin: FinState,
}

impl<'a, B, D, H> HwInit<'a, B, D, H>
where
    B: BusTransport,
    D: DelayNs,
    H: BootHost,
{
    /// Create an idle, unconfigured engine.
    pub fn new(bus: B, delay: D, host: H) -> Self {
        Self {
            bus,
            delay,
            host,
            config: BootConfig::default(),
            attr: BootAttr::default(),
            configured: false,
            variant: None,
            pool: TxnPool::new(),
            partition: PartitionManager::new(),
            awaited: None,
            last_block: BlockData::new(),
            download_status: DownloadStatus::Idle,
            nvs_buf: None,
            default_nvs: nvs::DEF_NVS,
            fw: None,
            scratch: Scratch::new(),
            boot: BootState::default(),
            pll: crate::pll::PllState::default(),
            nvs: NvsState::default(),
            top: TopState::default(),
            pol: PolarityState::default(),
            load: LoadState::default(),
            fin: FinState::default(),
        }
    }

    /// Apply the boot configuration and return the engine to its idle,
    /// bootable state. Must run before [`Self::boot`]; running it again
    /// re-initializes a failed instance.
    pub fn configure(&mut self, config: BootConfig) {
        self.config = config;
        self.default_nvs = nvs::default_image(config.mac_suffix);
        self.variant = None;
        self.pool.reset();
        self.partition.reset();
        self.awaited = None;
        self.scratch.release();
        self.reset_machines();
        self.download_status = DownloadStatus::Idle;
        self.configured = true;
        info!("engine configured");
    }

    /// Supply the calibration (NVS) image. The buffer is read-only to the
    /// engine apart from a save/restore of the 4 framing bytes preceding
    /// the TLV payload. Without an image the built-in default is used.
    pub fn set_calibration(&mut self, image: &'a mut [u8]) {
        self.nvs_buf = Some(image);
    }

    /// Supply one firmware portion. May be called repeatedly for streamed
    /// delivery; the engine keeps a single portion in flight.
    pub fn set_firmware_portion(&mut self, buf: &'a [u8], address: u32, last: bool) {
        self.fw = Some(FwPortion { buf, address, last });
    }

    /// Start the boot sequence (chip id, clocks, reset, calibration,
    /// top-register init). Returns the download status after the first
    /// synchronous stretch — normally [`DownloadStatus::Pending`].
    pub fn boot(&mut self) -> DownloadStatus {
        if !self.configured {
            self.fail(BootError::State);
            return self.download_status;
        }
        self.download_status = DownloadStatus::Pending;
        self.attr = self.config.boot_attr();
        self.boot = BootState::start();
        if let Err(e) = self.boot_step() {
            self.fail(e);
        }
        self.download_status
    }

    /// Transfer the current firmware portion. On the final portion this
    /// runs the finalize machine through to the host's
    /// [`BootHost::finalize_download`].
    pub fn load_firmware(&mut self) -> DownloadStatus {
        if self.fw.is_none() {
            self.fail(BootError::NoFirmware);
            return self.download_status;
        }
        self.load = LoadState::start();
        match self.load_step() {
            Err(e) => self.fail(e),
            Ok(Step::Pending) => self.download_status = DownloadStatus::Pending,
            Ok(Step::Complete) => {}
        }
        self.download_status
    }

    /// Program the IRQ line polarity through the top-register space.
    ///
    /// A rejected or timed-out access is reported through
    /// [`BootHost::irq_polarity_done`] without aborting the engine.
    pub fn init_irq_polarity(&mut self) {
        self.pol = PolarityState::start();
        if let Err(e) = self.polarity_step() {
            self.fail(e);
        }
    }

    /// Deliver a deferred transaction's completion. This is the only way a
    /// suspended machine resumes.
    pub fn bus_done(&mut self, completion: BusCompletion) {
        let BusCompletion { token, result } = completion;
        let payload = match result {
            Ok(p) => p,
            Err(e) => {
                self.pool.release(token);
                self.fail(BootError::Bus(e));
                return;
            }
        };
        let resume = match self.awaited {
            Some(a) if a.token == token => a.resume,
            // Acknowledgement of a fire-and-forget write: just free the slot.
            _ => {
                self.pool.release(token);
                return;
            }
        };
        match payload {
            // Parked in the slot until the machine consumes it.
            CompletionPayload::Reg(v) => self.pool.complete(token, v),
            CompletionPayload::Block(d) => {
                self.awaited = None;
                self.pool.release(token);
                self.last_block = d;
            }
            CompletionPayload::Ack => {
                self.awaited = None;
                self.pool.release(token);
            }
        }
        self.drive(resume);
    }

    /// The host finished a deferred mailbox configuration.
    pub fn mailbox_configured(&mut self) {
        self.drive(ResumeTo::Finalize);
    }

    /// The host's one-shot stall timer fired.
    pub fn stall_timer_fired(&mut self) {
        self.drive(ResumeTo::Finalize);
    }

    /// Current engine progress.
    #[must_use]
    pub fn status(&self) -> DownloadStatus {
        self.download_status
    }

    /// The variant detected at chip identification, once boot has passed
    /// that stage.
    #[must_use]
    pub fn variant(&self) -> Option<ChipVariant> {
        self.variant
    }

    /// Tear the engine apart, returning its resources.
    pub fn free(self) -> (B, D, H) {
        (self.bus, self.delay, self.host)
    }

    // -----------------------------------------------------------------------
    // Completion routing & failure finalization
    // -----------------------------------------------------------------------

    fn drive(&mut self, resume: ResumeTo) {
        let result = match resume {
            ResumeTo::Boot => self.boot_step(),
            ResumeTo::Nvs => self.nvs_step(),
            ResumeTo::Top => self.top_step(),
            ResumeTo::Load => self.load_step(),
            ResumeTo::Finalize => self.finalize_step(),
        };
        if let Err(e) = result {
            self.fail(e);
        }
    }

    /// The single failure-finalization path: release held resources, abort
    /// to the idle re-initializable state, notify the owner once.
    pub(crate) fn fail(&mut self, err: BootError) {
        error!("bring-up failed: {}", err);
        self.scratch.release();
        self.awaited = None;
        self.pool.reset();
        self.reset_machines();
        self.download_status = DownloadStatus::Failed;
        self.configured = false;
        self.host.init_failed(err);
    }

    fn reset_machines(&mut self) {
        self.boot = BootState::default();
        self.pll = crate::pll::PllState::default();
        self.nvs = NvsState::default();
        self.top = TopState::default();
        self.pol = PolarityState::default();
        self.load = LoadState::default();
        self.fin = FinState::default();
    }

    // -----------------------------------------------------------------------
    // Issue helpers — the suspension protocol over the slot arena
    // -----------------------------------------------------------------------

    /// Issue a gating register read. The value lands in the allocated slot
    /// (now or at completion) and is consumed by [`Self::take_read`] at the
    /// next stage.
    pub(crate) fn issue_read(&mut self, addr: u32, resume: ResumeTo) -> Result<Step, BootError> {
        debug_assert!(self.partition.maps(addr, 4), "read outside active partition");
        let token = self.pool.alloc().ok_or(BootError::SlotsExhausted)?;
        match self.bus.read_reg(addr, token) {
            TxnOutcome::Complete(v) => {
                self.pool.complete(token, v);
                self.awaited = Some(Awaited { token, resume });
                Ok(Step::Complete)
            }
            TxnOutcome::Pending => {
                self.awaited = Some(Awaited { token, resume });
                Ok(Step::Pending)
            }
            TxnOutcome::Failed(e) => {
                self.pool.release(token);
                Err(e.into())
            }
        }
    }

    /// Consume the value of the read the current machine was waiting on.
    pub(crate) fn take_read(&mut self) -> Result<u32, BootError> {
        let a = self.awaited.take().ok_or(BootError::State)?;
        self.pool.take(a.token).ok_or(BootError::State)
    }

    /// Issue a register write that gates the next stage.
    pub(crate) fn issue_write(
        &mut self,
        addr: u32,
        value: u32,
        resume: ResumeTo,
    ) -> Result<Step, BootError> {
        debug_assert!(self.partition.maps(addr, 4), "write outside active partition");
        let token = self.pool.alloc().ok_or(BootError::SlotsExhausted)?;
        match self.bus.write_reg(addr, value, token) {
            TxnOutcome::Complete(()) => {
                self.pool.release(token);
                Ok(Step::Complete)
            }
            TxnOutcome::Pending => {
                self.awaited = Some(Awaited { token, resume });
                Ok(Step::Pending)
            }
            TxnOutcome::Failed(e) => {
                self.pool.release(token);
                Err(e.into())
            }
        }
    }

    /// Issue a register write nothing waits on. The transport's ordering
    /// guarantee sequences it before any later transaction.
    pub(crate) fn post_write(&mut self, addr: u32, value: u32) -> Result<(), BootError> {
        debug_assert!(self.partition.maps(addr, 4), "write outside active partition");
        let token = self.pool.alloc().ok_or(BootError::SlotsExhausted)?;
        match self.bus.write_reg(addr, value, token) {
            TxnOutcome::Complete(()) => {
                self.pool.release(token);
                Ok(())
            }
            TxnOutcome::Pending => Ok(()),
            TxnOutcome::Failed(e) => {
                self.pool.release(token);
                Err(e.into())
            }
        }
    }

    /// Issue a gating block read; the payload lands in `last_block`.
    pub(crate) fn issue_read_block(
        &mut self,
        addr: u32,
        len: usize,
        resume: ResumeTo,
    ) -> Result<Step, BootError> {
        debug_assert!(self.partition.maps(addr, len as u32));
        let token = self.pool.alloc().ok_or(BootError::SlotsExhausted)?;
        match self.bus.read_block(addr, len, token) {
            TxnOutcome::Complete(d) => {
                self.last_block = d;
                self.pool.release(token);
                Ok(Step::Complete)
            }
            TxnOutcome::Pending => {
                self.awaited = Some(Awaited { token, resume });
                Ok(Step::Pending)
            }
            TxnOutcome::Failed(e) => {
                self.pool.release(token);
                Err(e.into())
            }
        }
    }

    /// Book-keep the outcome of a block write issued inline (the buffer
    /// borrow forbids a plain `&mut self` helper for the issue itself).
    pub(crate) fn note_block_write(
        &mut self,
        outcome: TxnOutcome<()>,
        token: TxnToken,
        resume: ResumeTo,
    ) -> Result<Step, BootError> {
        match outcome {
            TxnOutcome::Complete(()) => {
                self.pool.release(token);
                Ok(Step::Complete)
            }
            TxnOutcome::Pending => {
                self.awaited = Some(Awaited { token, resume });
                Ok(Step::Pending)
            }
            TxnOutcome::Failed(e) => {
                self.pool.release(token);
                Err(e.into())
            }
        }
    }

    /// Program a partition template. Dependent transactions may be issued
    /// immediately afterwards — the transport's ordering guarantee makes
    /// them see the new mapping.
    pub(crate) fn set_partition(&mut self, table: PartitionTable) -> Result<(), BootError> {
        let token = self.pool.alloc().ok_or(BootError::SlotsExhausted)?;
        let outcome = self.bus.apply_partition(&table, token);
        self.partition.record(table);
        match outcome {
            TxnOutcome::Complete(()) => {
                self.pool.release(token);
                Ok(())
            }
            TxnOutcome::Pending => Ok(()),
            TxnOutcome::Failed(e) => {
                self.pool.release(token);
                Err(e.into())
            }
        }
    }
}

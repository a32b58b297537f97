//! Shared test fixtures: a scripted mock bus with a small device model,
//! and a recording host.
//!
//! The mock runs in two modes. Synchronous mode answers every transaction
//! inside the call; deferred mode answers nothing and queues a completion
//! for the test to pump through `HwInit::bus_done`, which is how the
//! determinism-under-completion-timing assertions are driven.

#![allow(dead_code)] // each integration test uses a subset of the fixtures

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use wilink_boot::regs;
use wilink_boot::{BootAttr, BootError, BootHost, FwStaticInfo, HwInit};
use wilink_bus::{
    BlockData, BusCompletion, BusError, BusTransport, CompletionPayload, PartitionKind,
    PartitionTable, TxnOutcome, TxnToken,
};

/// Everything the engine did to the bus, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    ReadReg(u32),
    WriteReg(u32, u32),
    WriteBlock { addr: u32, len: usize },
    ReadBlock { addr: u32, len: usize },
    Partition(PartitionKind),
}

/// Register-level model of the chip, just deep enough for the boot paths.
pub struct DeviceModel {
    pub chip_id: u32,
    pub scr_pad2: u32,
    pub drpw_scratch: u32,
    pub pll_parameters: u32,
    pub ecpu_control: u32,
    /// Interrupt-status reads before the init-complete bit appears.
    pub init_after_polls: u32,
    /// The interrupt-status register reads back all-ones (dead chip).
    pub interrupt_status_all_ones: bool,
    status_reads: u32,
    /// Top-register space, keyed by the halved address.
    pub top_space: HashMap<u32, u32>,
    ocp_ctr: u32,
    ocp_wdata: u32,
    ocp_read_key: u32,
    ocp_reads_since_cmd: u32,
    /// `OCP_DATA_RD` polls before the valid bit sets.
    pub ocp_valid_after: u32,
    /// The valid bit never sets (drives the retry-exhaustion paths).
    pub ocp_never_valid: bool,
    /// Respond "reject" instead of "accept" on OCP reads.
    pub ocp_reject: bool,
    /// Static firmware-info block behind the command mailbox.
    pub fw_static: [u8; 32],
}

impl Default for DeviceModel {
    fn default() -> Self {
        let mut fw_static = [0u8; 32];
        fw_static[0..8].copy_from_slice(b"Rev 6.1\0");
        fw_static[20..24].copy_from_slice(&0x0501_0000u32.to_le_bytes());
        fw_static[24..30].copy_from_slice(&[0x00, 0x17, 0x41, 0x01, 0x02, 0x03]);
        Self {
            chip_id: regs::CHIP_ID_1273_PG20,
            scr_pad2: 0x0000_0001,
            drpw_scratch: 0,
            pll_parameters: 0,
            ecpu_control: 0,
            init_after_polls: 0,
            interrupt_status_all_ones: false,
            status_reads: 0,
            top_space: HashMap::new(),
            ocp_ctr: 0,
            ocp_wdata: 0,
            ocp_read_key: 0,
            ocp_reads_since_cmd: 0,
            ocp_valid_after: 0,
            ocp_never_valid: false,
            ocp_reject: false,
            fw_static,
        }
    }
}

impl DeviceModel {
    /// Seed a top-space register by its byte address.
    pub fn set_top(&mut self, addr: u32, value: u32) {
        self.top_space.insert(addr / 2, value);
    }

    /// Read back a top-space register by its byte address.
    pub fn top(&self, addr: u32) -> Option<u32> {
        self.top_space.get(&(addr / 2)).copied()
    }

    fn read(&mut self, addr: u32) -> u32 {
        match addr {
            regs::CHIP_ID => self.chip_id,
            regs::SCR_PAD2 => self.scr_pad2,
            regs::DRPW_SCRATCH_START => self.drpw_scratch,
            regs::PLL_PARAMETERS => self.pll_parameters,
            regs::ACX_REG_ECPU_CONTROL => self.ecpu_control,
            regs::ACX_REG_INTERRUPT_NO_CLEAR => {
                if self.interrupt_status_all_ones {
                    return 0xFFFF_FFFF;
                }
                let v = if self.status_reads >= self.init_after_polls {
                    regs::ACX_INTR_INIT_COMPLETE
                } else {
                    0
                };
                self.status_reads += 1;
                v
            }
            regs::OCP_DATA_RD => {
                if self.ocp_never_valid {
                    return 0;
                }
                self.ocp_reads_since_cmd += 1;
                if self.ocp_reads_since_cmd <= self.ocp_valid_after {
                    return 0;
                }
                let data = self.top_space.get(&self.ocp_read_key).copied().unwrap_or(0);
                let status = if self.ocp_reject {
                    regs::OCP_STATUS_REJECT
                } else {
                    regs::OCP_STATUS_ACCEPT
                };
                (data & 0xFFFF) | regs::OCP_DATA_VALID | status
            }
            _ => 0,
        }
    }

    fn write(&mut self, addr: u32, value: u32) {
        match addr {
            regs::ACX_REG_ECPU_CONTROL => self.ecpu_control = value,
            regs::DRPW_SCRATCH_START => self.drpw_scratch = value,
            regs::PLL_PARAMETERS => self.pll_parameters = value,
            regs::OCP_POR_CTR => self.ocp_ctr = value,
            regs::OCP_POR_WDATA => self.ocp_wdata = value,
            regs::OCP_CMD => {
                let key = self.ocp_ctr & 0xFFFF;
                match value {
                    regs::OCP_CMD_WRITE => {
                        self.top_space.insert(key, self.ocp_wdata);
                    }
                    regs::OCP_CMD_READ => {
                        self.ocp_read_key = key;
                        self.ocp_reads_since_cmd = 0;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

/// Mock transport state.
pub struct BusInner {
    pub device: DeviceModel,
    pub log: Vec<Op>,
    /// Defer every transaction instead of answering inline.
    pub defer_all: bool,
    pub pending: VecDeque<BusCompletion>,
    /// Fail the N-th transaction (0-based) with a bus error.
    pub fail_at: Option<usize>,
    issued: usize,
    /// Captured block-write payloads (without the framing pad).
    pub block_writes: Vec<(u32, Vec<u8>)>,
}

impl BusInner {
    fn should_fail(&mut self) -> bool {
        let n = self.issued;
        self.issued += 1;
        self.fail_at == Some(n)
    }
}

/// Cloneable handle the engine owns while the test keeps inspecting.
#[derive(Clone)]
pub struct SharedBus(pub Rc<RefCell<BusInner>>);

impl SharedBus {
    pub fn new(device: DeviceModel) -> Self {
        Self(Rc::new(RefCell::new(BusInner {
            device,
            log: Vec::new(),
            defer_all: false,
            pending: VecDeque::new(),
            fail_at: None,
            issued: 0,
            block_writes: Vec::new(),
        })))
    }

    pub fn deferred(device: DeviceModel) -> Self {
        let bus = Self::new(device);
        bus.0.borrow_mut().defer_all = true;
        bus
    }

    pub fn log(&self) -> Vec<Op> {
        self.0.borrow().log.clone()
    }

    pub fn reg_writes(&self) -> Vec<(u32, u32)> {
        self.0
            .borrow()
            .log
            .iter()
            .filter_map(|op| match op {
                Op::WriteReg(a, v) => Some((*a, *v)),
                _ => None,
            })
            .collect()
    }

    pub fn block_writes(&self) -> Vec<(u32, Vec<u8>)> {
        self.0.borrow().block_writes.clone()
    }
}

impl BusTransport for SharedBus {
    fn read_reg(&mut self, addr: u32, token: TxnToken) -> TxnOutcome<u32> {
        let mut b = self.0.borrow_mut();
        b.log.push(Op::ReadReg(addr));
        if b.should_fail() {
            return TxnOutcome::Failed(BusError);
        }
        let v = b.device.read(addr);
        if b.defer_all {
            b.pending.push_back(BusCompletion {
                token,
                result: Ok(CompletionPayload::Reg(v)),
            });
            TxnOutcome::Pending
        } else {
            TxnOutcome::Complete(v)
        }
    }

    fn write_reg(&mut self, addr: u32, value: u32, token: TxnToken) -> TxnOutcome<()> {
        let mut b = self.0.borrow_mut();
        b.log.push(Op::WriteReg(addr, value));
        if b.should_fail() {
            return TxnOutcome::Failed(BusError);
        }
        b.device.write(addr, value);
        if b.defer_all {
            b.pending.push_back(BusCompletion {
                token,
                result: Ok(CompletionPayload::Ack),
            });
            TxnOutcome::Pending
        } else {
            TxnOutcome::Complete(())
        }
    }

    fn write_block(
        &mut self,
        addr: u32,
        buf: &mut [u8],
        pad: usize,
        token: TxnToken,
    ) -> TxnOutcome<()> {
        let mut b = self.0.borrow_mut();
        b.log.push(Op::WriteBlock {
            addr,
            len: buf.len() - pad,
        });
        if b.should_fail() {
            return TxnOutcome::Failed(BusError);
        }
        let payload = buf[pad..].to_vec();
        // Scribble framing over the pad area, exactly what the engine's
        // save/restore exists to survive.
        for byte in &mut buf[..pad] {
            *byte = 0xA5;
        }
        b.block_writes.push((addr, payload));
        if b.defer_all {
            b.pending.push_back(BusCompletion {
                token,
                result: Ok(CompletionPayload::Ack),
            });
            TxnOutcome::Pending
        } else {
            TxnOutcome::Complete(())
        }
    }

    fn read_block(&mut self, addr: u32, len: usize, token: TxnToken) -> TxnOutcome<BlockData> {
        let mut b = self.0.borrow_mut();
        b.log.push(Op::ReadBlock { addr, len });
        if b.should_fail() {
            return TxnOutcome::Failed(BusError);
        }
        let n = len.min(b.device.fw_static.len());
        let data = BlockData::from_slice(&b.device.fw_static[..n]).unwrap();
        if b.defer_all {
            b.pending.push_back(BusCompletion {
                token,
                result: Ok(CompletionPayload::Block(data)),
            });
            TxnOutcome::Pending
        } else {
            TxnOutcome::Complete(data)
        }
    }

    fn apply_partition(&mut self, table: &PartitionTable, token: TxnToken) -> TxnOutcome<()> {
        let mut b = self.0.borrow_mut();
        b.log.push(Op::Partition(table.kind()));
        if b.should_fail() {
            return TxnOutcome::Failed(BusError);
        }
        if b.defer_all {
            b.pending.push_back(BusCompletion {
                token,
                result: Ok(CompletionPayload::Ack),
            });
            TxnOutcome::Pending
        } else {
            TxnOutcome::Complete(())
        }
    }
}

/// Recording host.
#[derive(Default)]
pub struct HostInner {
    pub ready_count: usize,
    pub more_expected_count: usize,
    pub failures: Vec<BootError>,
    pub polarity_results: Vec<bool>,
    pub pg_version: Option<u8>,
    pub finalized: Vec<(BootAttr, FwStaticInfo)>,
    /// Answer mailbox configuration with `Pending`; the test pumps
    /// `mailbox_configured` afterwards.
    pub defer_mailboxes: bool,
    pub mailbox_pending: usize,
    pub stall_requests: usize,
    /// Total stall timers ever scheduled (not consumed by the pump).
    pub stall_requests_total: usize,
}

#[derive(Clone, Default)]
pub struct SharedHost(pub Rc<RefCell<HostInner>>);

impl SharedHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BootHost for SharedHost {
    fn hw_init_done(&mut self) {
        self.0.borrow_mut().ready_count += 1;
    }

    fn more_firmware_expected(&mut self) {
        self.0.borrow_mut().more_expected_count += 1;
    }

    fn init_failed(&mut self, error: BootError) {
        self.0.borrow_mut().failures.push(error);
    }

    fn irq_polarity_done(&mut self, ok: bool) {
        self.0.borrow_mut().polarity_results.push(ok);
    }

    fn pg_version(&mut self, version: u8) {
        self.0.borrow_mut().pg_version = Some(version);
    }

    fn configure_cmd_mailbox(&mut self) -> TxnOutcome<()> {
        let mut h = self.0.borrow_mut();
        if h.defer_mailboxes {
            h.mailbox_pending += 1;
            TxnOutcome::Pending
        } else {
            TxnOutcome::Complete(())
        }
    }

    fn configure_event_mailbox(&mut self) -> TxnOutcome<()> {
        let mut h = self.0.borrow_mut();
        if h.defer_mailboxes {
            h.mailbox_pending += 1;
            TxnOutcome::Pending
        } else {
            TxnOutcome::Complete(())
        }
    }

    fn set_init_interrupt_mask(&mut self) {}

    fn finalize_download(&mut self, attr: &BootAttr, info: &FwStaticInfo) {
        self.0.borrow_mut().finalized.push((*attr, info.clone()));
    }

    fn schedule_stall_timer(&mut self, _delay_ms: u32) {
        let mut h = self.0.borrow_mut();
        h.stall_requests += 1;
        h.stall_requests_total += 1;
    }
}

/// Delay that burns no time — the sequences' stalls are irrelevant on the
/// mock.
pub struct NopDelay;

impl embedded_hal::delay::DelayNs for NopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Engine type used by every integration test.
pub type TestEngine<'a> = HwInit<'a, SharedBus, NopDelay, SharedHost>;

/// Drain deferred completions, host stall timers, and deferred mailbox
/// configurations until the engine goes quiet.
pub fn pump(hw: &mut TestEngine<'_>, bus: &SharedBus, host: &SharedHost) {
    loop {
        let completion = bus.0.borrow_mut().pending.pop_front();
        if let Some(c) = completion {
            hw.bus_done(c);
            continue;
        }
        let stalls = {
            let mut h = host.0.borrow_mut();
            let n = h.stall_requests;
            h.stall_requests = 0;
            n
        };
        if stalls > 0 {
            hw.stall_timer_fired();
            continue;
        }
        let mailbox = {
            let mut h = host.0.borrow_mut();
            if h.mailbox_pending > 0 {
                h.mailbox_pending -= 1;
                true
            } else {
                false
            }
        };
        if mailbox {
            hw.mailbox_configured();
            continue;
        }
        break;
    }
}

//! Integration: the boot sequence against the mock bus + device model.
//!
//! Covers the chip-identification gate, legacy and new-PLL clock paths,
//! the default-calibration fallback, the OCP local-failure policy, and the
//! determinism property: a run where every transaction defers must leave
//! the same bus trace and host events as a fully synchronous run.

mod common;

use common::{pump, DeviceModel, NopDelay, Op, SharedBus, SharedHost, TestEngine};
use wilink_boot::{regs, BootConfig, BootError, ChipFamily, DownloadStatus, HwInit};

fn engine<'a>(bus: &SharedBus, host: &SharedHost, config: BootConfig) -> TestEngine<'a> {
    let mut hw = HwInit::new(bus.clone(), NopDelay, host.clone());
    hw.configure(config);
    hw
}

fn wl1273_config() -> BootConfig {
    BootConfig {
        ref_clock: regs::CLOCK_CONFIG_38_4_M,
        ..BootConfig::default()
    }
}

#[test]
fn test_boot_sync_runs_to_ready() {
    let mut device = DeviceModel::default();
    device.set_top(regs::FUSE_DATA_2_1, 0x14); // PG field -> 5
    let bus = SharedBus::new(device);
    let host = SharedHost::new();
    let mut hw = engine(&bus, &host, wl1273_config());

    let status = hw.boot();

    assert_eq!(status, DownloadStatus::Complete);
    assert_eq!(host.0.borrow().ready_count, 1);
    assert!(host.0.borrow().failures.is_empty());
    assert_eq!(host.0.borrow().pg_version, Some(5));
    assert_eq!(hw.variant().map(|v| v.family()), Some(ChipFamily::Wl1273));

    let log = bus.log();
    // Milestones, in order: working partition, chip id, legacy clock
    // select, ELP wake, clock partition, scratch write, soft reset,
    // readiness check.
    let idx = |op: &Op| log.iter().position(|o| o == op).unwrap();
    let chip_id = idx(&Op::ReadReg(regs::CHIP_ID));
    let pll_sel = idx(&Op::WriteReg(regs::PLL_PARAMETERS, 0x3));
    let wake = idx(&Op::WriteReg(regs::WELP_ARM_COMMAND, regs::WELP_ARM_COMMAND_VAL));
    let reset = idx(&Op::WriteReg(regs::REG_ENABLE_TX_RX, 0));
    let ready_check = idx(&Op::ReadReg(regs::SCR_PAD2));
    assert!(chip_id < pll_sel && pll_sel < wake && wake < reset && reset < ready_check);
    assert_eq!(log[0], Op::Partition(wilink_bus::PartitionKind::Working));

    // Legacy pause threshold merged over the read-back value.
    assert!(bus
        .reg_writes()
        .contains(&(regs::WU_COUNTER_PAUSE, regs::WU_COUNTER_PAUSE_VAL)));
}

#[test]
fn test_boot_writes_default_calibration() {
    let bus = SharedBus::new(DeviceModel::default());
    let host = SharedHost::new();
    let mut hw = engine(&bus, &host, wl1273_config());
    hw.boot();

    // Two one-word bursts from the built-in image...
    let writes = bus.reg_writes();
    assert!(writes.contains(&(regs::REGISTERS_BASE + 0x546C, 0x2812_0358)));
    assert!(writes.contains(&(regs::REGISTERS_BASE + 0x5470, 0x0000_0800)));
    // ...then the 4-byte TLV tail to the command mailbox.
    let blocks = bus.block_writes();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].0, regs::CMD_MBOX_ADDRESS);
    assert_eq!(blocks[0].1.len(), 4);
    // No calibration supplied: the chip is told to use its EEPROM.
    assert!(writes.contains(&(regs::ACX_EEPROMLESS_IND_REG, regs::USE_EEPROM)));
}

#[test]
fn test_boot_default_calibration_mac_randomized() {
    let bus = SharedBus::new(DeviceModel::default());
    let host = SharedHost::new();
    let mut hw = engine(
        &bus,
        &host,
        BootConfig {
            mac_suffix: Some([0xAA, 0xBB, 0xCC]),
            ..wl1273_config()
        },
    );
    hw.boot();

    // The suffix sits at image offsets 3..6, i.e. the first burst word.
    assert!(bus
        .reg_writes()
        .contains(&(regs::REGISTERS_BASE + 0x546C, 0x28CC_BBAA)));
    assert_eq!(host.0.borrow().ready_count, 1);
}

#[test]
fn test_boot_unknown_chip_fails_without_further_traffic() {
    let mut device = DeviceModel::default();
    device.chip_id = 0x1234_5678;
    let bus = SharedBus::new(device);
    let host = SharedHost::new();
    let mut hw = engine(&bus, &host, wl1273_config());

    let status = hw.boot();

    assert_eq!(status, DownloadStatus::Failed);
    assert_eq!(
        host.0.borrow().failures.as_slice(),
        &[BootError::UnknownChipId(0x1234_5678)]
    );
    assert_eq!(host.0.borrow().ready_count, 0);
    // Partition switch + identity read, nothing after the rejection.
    assert_eq!(bus.log().len(), 2);
}

#[test]
fn test_boot_all_ones_readiness_is_fatal() {
    let mut device = DeviceModel::default();
    device.scr_pad2 = 0xFFFF_FFFF;
    let bus = SharedBus::new(device);
    let host = SharedHost::new();
    let mut hw = engine(&bus, &host, wl1273_config());

    assert_eq!(hw.boot(), DownloadStatus::Failed);
    assert_eq!(
        host.0.borrow().failures.as_slice(),
        &[BootError::ScratchPadInvalid]
    );
}

#[test]
fn test_boot_deferred_completions_match_sync_trace() {
    let sync_bus = SharedBus::new(DeviceModel::default());
    let sync_host = SharedHost::new();
    let mut hw = engine(&sync_bus, &sync_host, wl1273_config());
    hw.boot();

    let deferred_bus = SharedBus::deferred(DeviceModel::default());
    let deferred_host = SharedHost::new();
    let mut hw2 = engine(&deferred_bus, &deferred_host, wl1273_config());
    let status = hw2.boot();
    assert_eq!(status, DownloadStatus::Pending);
    pump(&mut hw2, &deferred_bus, &deferred_host);

    // Same transactions, same order, same host outcome - timing must not
    // be observable.
    assert_eq!(sync_bus.log(), deferred_bus.log());
    assert_eq!(hw2.status(), DownloadStatus::Complete);
    assert_eq!(deferred_host.0.borrow().ready_count, 1);
    assert_eq!(
        deferred_host.0.borrow().pg_version,
        sync_host.0.borrow().pg_version
    );
}

#[test]
fn test_boot_1283_new_pll_tcxo_table_path() {
    let mut device = DeviceModel::default();
    device.chip_id = regs::CHIP_ID_1283_PG20;
    device.set_top(regs::SYS_CLK_CFG_REG, 0); // TCXO sourced
    device.set_top(regs::TCXO_CLK_DETECT_REG, 0);
    device.set_top(regs::MCS_PLL_CONFIG_REG, 0x0180);
    let bus = SharedBus::new(device);
    let host = SharedHost::new();
    let mut hw = engine(
        &bus,
        &host,
        BootConfig {
            ref_clock: regs::CLOCK_CONFIG_38_4_M,
            tcxo_clock: regs::CLOCK_CONFIG_19_2_M,
            new_pll_algorithm: true,
            ..BootConfig::default()
        },
    );

    assert_eq!(hw.boot(), DownloadStatus::Complete);
    assert_eq!(host.0.borrow().ready_count, 1);

    let b = bus.0.borrow();
    // Frequency code 0 merged into bits [6:4], PG 2.0 tag in the low bits,
    // unrelated bits of the read-back preserved.
    assert_eq!(b.device.top(regs::MCS_PLL_CONFIG_REG), Some(0x0183));
    // The spare guard was written before the reconfiguration.
    assert_eq!(b.device.top(regs::WL_SPARE_REG), Some(regs::WL_SPARE_VAL));
    // 1283 configures drive strength, never the fuse path.
    assert_eq!(b.device.top(regs::SDIO_IO_DS), Some(0));
    assert_eq!(host.0.borrow().pg_version, None);
}

#[test]
fn test_boot_1283_tcxo_to_fref_switch() {
    let mut device = DeviceModel::default();
    device.chip_id = regs::CHIP_ID_1283_PG20;
    device.set_top(regs::SYS_CLK_CFG_REG, 0);
    device.set_top(regs::TCXO_CLK_DETECT_REG, 0);
    device.set_top(regs::FREF_CLK_DETECT_REG, 0);
    device.set_top(regs::MCS_PLL_CONFIG_REG, 0);
    let bus = SharedBus::new(device);
    let host = SharedHost::new();
    let mut hw = engine(
        &bus,
        &host,
        BootConfig {
            ref_clock: regs::CLOCK_CONFIG_38_4_M,
            tcxo_clock: regs::CLOCK_CONFIG_16_368_M,
            new_pll_algorithm: true,
            ..BootConfig::default()
        },
    );

    assert_eq!(hw.boot(), DownloadStatus::Complete);

    let b = bus.0.borrow();
    // PG 2.0 switch-over: spare prologue then the FREF routing value.
    // (The spare register is later rewritten by the config guard.)
    assert_eq!(
        b.device.top(regs::SYS_CLK_CFG_REG),
        Some(regs::SYS_CLK_CFG_FREF_SWITCH_PG20)
    );
    // Now FREF-sourced: the 38.4 MHz reference divides down to the 19.2
    // code, merged with the PG 2.0 tag.
    assert_eq!(b.device.top(regs::MCS_PLL_CONFIG_REG), Some(0x0003));
}

#[test]
fn test_boot_deferred_new_pll_matches_sync() {
    let make_device = || {
        let mut d = DeviceModel::default();
        d.chip_id = regs::CHIP_ID_1283_PG10;
        d.set_top(regs::SYS_CLK_CFG_REG, regs::PRCM_CM_EN_MUX_WLAN_FREF);
        d.set_top(regs::FREF_CLK_DETECT_REG, 0);
        d.set_top(regs::MCS_PLL_CONFIG_REG, 0x0100);
        d
    };
    let config = BootConfig {
        ref_clock: regs::CLOCK_CONFIG_26_M,
        new_pll_algorithm: true,
        ..BootConfig::default()
    };

    let sync_bus = SharedBus::new(make_device());
    let sync_host = SharedHost::new();
    let mut hw = engine(&sync_bus, &sync_host, config);
    assert_eq!(hw.boot(), DownloadStatus::Complete);

    let def_bus = SharedBus::deferred(make_device());
    let def_host = SharedHost::new();
    let mut hw2 = engine(&def_bus, &def_host, config);
    hw2.boot();
    pump(&mut hw2, &def_bus, &def_host);

    assert_eq!(sync_bus.log(), def_bus.log());
    assert_eq!(hw2.status(), DownloadStatus::Complete);
    assert_eq!(def_host.0.borrow().ready_count, 1);
}

#[test]
fn test_irq_polarity_write_and_report() {
    let mut device = DeviceModel::default();
    device.set_top(regs::FN0_CCCR_REG_32, 0);
    let bus = SharedBus::new(device);
    let host = SharedHost::new();
    let mut hw = engine(&bus, &host, wl1273_config());

    hw.init_irq_polarity();

    assert_eq!(host.0.borrow().polarity_results.as_slice(), &[true]);
    assert!(host.0.borrow().failures.is_empty());
    // Bit 1 set: active low.
    assert_eq!(bus.0.borrow().device.top(regs::FN0_CCCR_REG_32), Some(0x02));
}

#[test]
fn test_ocp_timeout_reports_local_failure_only() {
    let mut device = DeviceModel::default();
    device.ocp_never_valid = true;
    let bus = SharedBus::new(device);
    let host = SharedHost::new();
    let mut hw = engine(&bus, &host, wl1273_config());

    hw.init_irq_polarity();

    // Not-ok to the host, no engine-wide failure finalization.
    assert_eq!(host.0.borrow().polarity_results.as_slice(), &[false]);
    assert!(host.0.borrow().failures.is_empty());
    // Initial poll plus the full retry budget.
    let polls = bus
        .log()
        .iter()
        .filter(|op| **op == Op::ReadReg(regs::OCP_DATA_RD))
        .count();
    assert_eq!(polls as u32, regs::TOP_REG_RETRIES + 1);
}

#[test]
fn test_ocp_reject_during_boot_is_fatal() {
    let mut device = DeviceModel::default();
    device.ocp_reject = true;
    let bus = SharedBus::new(device);
    let host = SharedHost::new();
    // Polarity bit clear -> the 1273 boot path must read the test-mode
    // select through the OCP, which the device now rejects.
    let mut hw = engine(&bus, &host, wl1273_config());

    assert_eq!(hw.boot(), DownloadStatus::Failed);
    assert_eq!(
        host.0.borrow().failures.as_slice(),
        &[BootError::TopRegisterAccess]
    );
    assert_eq!(host.0.borrow().ready_count, 0);
}

#[test]
fn test_bus_error_aborts_and_notifies_once() {
    let mut device = DeviceModel::default();
    device.chip_id = regs::CHIP_ID_1273_PG20;
    let bus = SharedBus::new(device);
    bus.0.borrow_mut().fail_at = Some(1); // the chip-id read
    let host = SharedHost::new();
    let mut hw = engine(&bus, &host, wl1273_config());

    assert_eq!(hw.boot(), DownloadStatus::Failed);
    let h = host.0.borrow();
    assert_eq!(h.failures.len(), 1);
    assert!(matches!(h.failures[0], BootError::Bus(_)));
    assert_eq!(h.ready_count, 0);
}

#[test]
fn test_caller_nvs_tlv_framing_bytes_restored() {
    // One burst record, a terminator, then a TLV tail. The mock transport
    // scribbles 0xA5 over the 4 framing bytes ahead of the payload; the
    // loader must put the originals back.
    let mut nvs: Vec<u8> = vec![
        0x01, 0x01, 0x02, // burst: 1 word @ 0x0200
        0x11, 0x22, 0x33, 0x44, // the word
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // terminator + pad
        0xB0, 0xB1, // tail bytes 14..16 (clobber zone starts at 12)
        0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, // TLV payload
    ];
    let original = nvs.clone();

    let bus = SharedBus::new(DeviceModel::default());
    let host = SharedHost::new();
    let mut hw = engine(&bus, &host, wl1273_config());
    hw.set_calibration(&mut nvs);
    assert_eq!(hw.boot(), DownloadStatus::Complete);
    drop(hw);

    // Burst word landed as a register write.
    assert!(bus
        .reg_writes()
        .contains(&(regs::REGISTERS_BASE + 0x0200, 0x4433_2211)));
    // Caller-supplied image: eeprom-less marker, not USE_EEPROM.
    assert!(bus.reg_writes().contains(&(
        regs::ACX_EEPROMLESS_IND_REG,
        regs::ACX_EEPROMLESS_IND_REG
    )));
    // The framing bytes preceding the TLV payload survived the transfer.
    assert_eq!(nvs, original);
    assert_eq!(host.0.borrow().ready_count, 1);
}

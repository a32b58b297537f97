//! Calibration (NVS) burst loader.
//!
//! The calibration image is a compact binary blob in two sections. First a
//! run of *burst records*, each describing consecutive register writes:
//!
//! ```text
//! length : 1 byte   number of 32-bit words
//! addrLo : 1 byte   low address byte; bit 0 set marks a burst record
//! addrHi : 1 byte   high address byte
//! word0..wordN-1 : length * 4 bytes, little-endian
//! ```
//!
//! A record whose address flag bit is clear ends the section (a zero
//! length byte is followed by 7 pad bytes). The rest of the image is a raw
//! TLV range written verbatim to the command-mailbox address — minus the 4
//! bytes immediately before the payload, which the bus framing may
//! clobber; those are saved before the transfer and restored after it.

use embedded_hal::delay::DelayNs;
use wilink_bus::{BusTransport, Step, BUS_FRAME_PAD};

use crate::engine::{BootHost, HwInit, ResumeTo};
use crate::error::BootError;
use crate::regs;

/// Size of the built-in default calibration image.
pub const DEF_NVS_SIZE: usize = 28;

/// Offset of the MAC-address suffix inside the default image.
pub const NVS_MAC_OFFSET: usize = 3;

/// Marker at offset 24: the image was synthesized by the driver rather
/// than read from a calibration file.
const NVS_NON_FILE: u8 = 0x01;

/// Built-in default calibration: two one-word burst records carrying a
/// placeholder station address, a terminator, and an empty TLV tail. Keeps
/// the firmware supplied with a valid minimal calibration when the host
/// has none — expect the radio to be uncalibrated.
pub const DEF_NVS: [u8; DEF_NVS_SIZE] = [
    0x01, 0x6D, 0x54, 0x58, 0x03, 0x12, 0x28, // burst: 1 word @ 0x546C
    0x01, 0x71, 0x54, 0x00, 0x08, 0x00, 0x00, // burst: 1 word @ 0x5470
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // terminator + pad
    0x00, 0x00, 0x00, NVS_NON_FILE, 0x00, 0x00, 0x00,
];

/// The default image with an optional randomized MAC suffix patched in at
/// offsets 3–5 (the low half of the station address).
#[must_use]
pub fn default_image(mac_suffix: Option<[u8; 3]>) -> [u8; DEF_NVS_SIZE] {
    let mut image = DEF_NVS;
    if let Some(suffix) = mac_suffix {
        image[NVS_MAC_OFFSET..NVS_MAC_OFFSET + 3].copy_from_slice(&suffix);
    }
    image
}

/// One decoded burst-record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BurstRecord {
    /// Target register address, relative to the register block base.
    pub reg_addr: u32,
    /// Number of 32-bit words that follow.
    pub words: u8,
}

/// Decode the burst header at `offset`. `None` means end-of-burst (the
/// address flag bit is clear) or a truncated blob.
#[must_use]
pub fn parse_burst_header(blob: &[u8], offset: usize) -> Option<BurstRecord> {
    let words = *blob.get(offset)?;
    let addr_lo = *blob.get(offset + 1)?;
    let addr_hi = *blob.get(offset + 2)?;
    if addr_lo & 1 == 0 {
        return None;
    }
    Some(BurstRecord {
        reg_addr: u32::from(addr_lo & 0xFE) | (u32::from(addr_hi) << 8),
        words,
    })
}

/// Where the active calibration bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum NvsSource {
    #[default]
    Default,
    Caller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum NvsStage {
    #[default]
    Idle,
    /// Decode the next burst header.
    BurstHeader,
    /// Emit one register write per burst word.
    BurstWords,
    /// Burst section done: restore the working partition for the TLV
    /// transfer.
    Partition,
    /// Align, save the framing bytes, transfer the TLV tail, restore.
    Tlv,
}

/// Burst-loader state: the blob cursor and the current record.
#[derive(Debug, Default)]
pub(crate) struct NvsState {
    pub stage: NvsStage,
    pub source: NvsSource,
    /// Byte offset into the blob.
    pub cursor: usize,
    /// Total blob length.
    pub total: usize,
    /// TLV bytes left to transfer (computed at end-of-burst).
    pub remaining: usize,
    /// Current record's target register address (advances by 4 per word).
    pub burst_addr: u32,
    pub burst_words: u8,
    pub burst_done: u8,
    /// Framing bytes saved around the TLV transfer.
    pub saved: Option<[u8; 4]>,
    /// Any transaction deferred; the terminal re-enters the boot machine.
    pub pended: bool,
}

impl NvsState {
    pub fn start(source: NvsSource, total: usize) -> Self {
        Self {
            stage: NvsStage::BurstHeader,
            source,
            total,
            ..Self::default()
        }
    }

    pub fn used_caller_image(&self) -> bool {
        self.source == NvsSource::Caller
    }
}

impl<'a, B, D, H> HwInit<'a, B, D, H>
where
    B: BusTransport,
    D: DelayNs,
    H: BootHost,
{
    fn nvs_blob(&self) -> &[u8] {
        match self.nvs.source {
            NvsSource::Caller => self.nvs_buf.as_deref().unwrap_or(&[]),
            NvsSource::Default => &self.default_nvs,
        }
    }

    pub(crate) fn nvs_step(&mut self) -> Result<Step, BootError> {
        loop {
            match self.nvs.stage {
                NvsStage::Idle => return Ok(Step::Complete),

                NvsStage::BurstHeader => {
                    let header = parse_burst_header(self.nvs_blob(), self.nvs.cursor);
                    if let Some(rec) = header {
                        self.nvs.burst_addr = rec.reg_addr;
                        self.nvs.burst_words = rec.words;
                        self.nvs.burst_done = 0;
                        self.nvs.cursor += 3;
                        self.nvs.stage = NvsStage::BurstWords;
                    } else {
                        // End of the burst section. A zero length byte drags
                        // 7 pad bytes with it.
                        let zero_len =
                            self.nvs_blob().get(self.nvs.cursor).copied() == Some(0);
                        if zero_len {
                            self.nvs.cursor += 7;
                        }
                        let consumed = self.nvs.cursor + 1;
                        let left = self.nvs.total.saturating_sub(consumed);
                        // TLV length is carried to a word boundary.
                        self.nvs.remaining = (left + 3) & !3;
                        self.nvs.stage = NvsStage::Partition;
                    }
                }

                NvsStage::BurstWords => {
                    if self.nvs.burst_done < self.nvs.burst_words {
                        let word = {
                            let blob = self.nvs_blob();
                            let c = self.nvs.cursor;
                            let Some(bytes) = blob.get(c..c + 4) else {
                                error!("calibration blob truncated mid-burst");
                                return Err(BootError::CalibrationFormat);
                            };
                            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                        };
                        let addr = regs::REGISTERS_BASE + self.nvs.burst_addr;
                        self.nvs.cursor += 4;
                        self.nvs.burst_addr += 4;
                        self.nvs.burst_done += 1;
                        match self.issue_write(addr, word, ResumeTo::Nvs)? {
                            Step::Pending => {
                                self.nvs.pended = true;
                                return Ok(Step::Pending);
                            }
                            Step::Complete => {}
                        }
                    } else {
                        self.nvs.stage = NvsStage::BurstHeader;
                    }
                }

                NvsStage::Partition => {
                    self.set_partition(regs::working_partition())?;
                    self.nvs.stage = NvsStage::Tlv;
                }

                NvsStage::Tlv => {
                    if self.nvs.remaining > 0 {
                        // Word-align the payload start; the skipped bytes
                        // come off the transfer length.
                        if self.nvs.cursor % 4 != 0 {
                            let aligned = (self.nvs.cursor & !3) + 4;
                            let delta = aligned - self.nvs.cursor + 1;
                            self.nvs.remaining = self.nvs.remaining.saturating_sub(delta);
                            self.nvs.cursor = aligned;
                        }
                        let cursor = self.nvs.cursor;
                        let avail = self.nvs_blob().len().saturating_sub(cursor);
                        let len = self.nvs.remaining.min(avail);
                        self.nvs.remaining = 0;
                        if len == 0 {
                            continue;
                        }
                        if cursor < BUS_FRAME_PAD {
                            return Err(BootError::CalibrationFormat);
                        }
                        // The transport will scribble its framing over the 4
                        // bytes ahead of the payload; keep a copy.
                        {
                            let blob = self.nvs_blob();
                            let mut saved = [0u8; 4];
                            saved.copy_from_slice(&blob[cursor - BUS_FRAME_PAD..cursor]);
                            self.nvs.saved = Some(saved);
                        }
                        let token = self.pool.alloc().ok_or(BootError::SlotsExhausted)?;
                        let start = cursor - BUS_FRAME_PAD;
                        let end = cursor + len;
                        let outcome = match self.nvs.source {
                            NvsSource::Caller => {
                                let buf = self.nvs_buf.as_mut().ok_or(BootError::State)?;
                                self.bus.write_block(
                                    regs::CMD_MBOX_ADDRESS,
                                    &mut buf[start..end],
                                    BUS_FRAME_PAD,
                                    token,
                                )
                            }
                            NvsSource::Default => self.bus.write_block(
                                regs::CMD_MBOX_ADDRESS,
                                &mut self.default_nvs[start..end],
                                BUS_FRAME_PAD,
                                token,
                            ),
                        };
                        match self.note_block_write(outcome, token, ResumeTo::Nvs)? {
                            Step::Pending => {
                                self.nvs.pended = true;
                                return Ok(Step::Pending);
                            }
                            Step::Complete => {}
                        }
                    } else {
                        // Transfer done (or nothing to transfer): put the
                        // framing bytes back and hand control to the boot
                        // machine.
                        if let Some(saved) = self.nvs.saved.take() {
                            let cursor = self.nvs.cursor;
                            match self.nvs.source {
                                NvsSource::Caller => {
                                    if let Some(buf) = self.nvs_buf.as_mut() {
                                        buf[cursor - BUS_FRAME_PAD..cursor]
                                            .copy_from_slice(&saved);
                                    }
                                }
                                NvsSource::Default => {
                                    self.default_nvs[cursor - BUS_FRAME_PAD..cursor]
                                        .copy_from_slice(&saved);
                                }
                            }
                        }
                        self.nvs.stage = NvsStage::Idle;
                        info!("calibration transferred");
                        if core::mem::take(&mut self.nvs.pended) {
                            return self.boot_step();
                        }
                        return Ok(Step::Complete);
                    }
                }
            }
        }
    }
}

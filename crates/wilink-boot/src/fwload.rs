//! Firmware chunk loader.
//!
//! A firmware portion is pushed into device memory in bounded chunks
//! through the download partition, whose memory window is far smaller than
//! the image. Separate read and write chunk counters let the window slide:
//! the write counter is relative to the current window anchor and resets
//! whenever the partition is reprogrammed, while the read counter keeps
//! walking the source buffer. The window check runs one chunk ahead so a
//! transfer never straddles the window end.
//!
//! Each chunk is staged through a scratch buffer with the bus framing pad
//! in front, leaving the caller's image untouched.

use embedded_hal::delay::DelayNs;
use wilink_bus::{ready, BusTransport, Step, BUS_FRAME_PAD};

use crate::engine::{BootHost, HwInit, ResumeTo};
use crate::error::BootError;
use crate::finalize::FinState;
use crate::regs;

const CHUNK: usize = regs::MAX_TRANSFER_BLOCK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum LoadStage {
    #[default]
    Idle,
    /// Validate the portion, anchor the download window, take the scratch.
    Setup,
    /// Reset counters; small portions skip straight to the remainder.
    EntrySelect,
    /// Whole-chunk loop: slide the window if the next chunk would cross it.
    ChunkCheck,
    /// Stage and issue one whole chunk.
    ChunkWrite,
    /// Stage and issue the sub-chunk remainder, if any.
    Remainder,
    /// Release the scratch; finalize or request the next portion.
    Cleanup,
}

/// Chunk-loader state.
#[derive(Debug, Default)]
pub(crate) struct LoadState {
    pub stage: LoadStage,
    /// Chunks consumed from the caller's buffer.
    pub read_chunks: u32,
    /// Chunks written into the current window (resets on window moves).
    pub write_chunks: u32,
    /// Current download-window anchor in device address space.
    pub base: u32,
    /// First device address past the current window.
    pub limit: u32,
}

impl LoadState {
    pub fn start() -> Self {
        Self {
            stage: LoadStage::Setup,
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
    pub(crate) fn load_step(&mut self) -> Result<Step, BootError> {
        loop {
            match self.load.stage {
                LoadStage::Idle => return Ok(Step::Complete),

                LoadStage::Setup => {
                    let portion = self.fw.ok_or(BootError::NoFirmware)?;
                    #[allow(clippy::cast_possible_truncation)] // images are well below 4 GiB
                    let len = portion.buf.len() as u32;
                    if len % 4 != 0 {
                        error!("firmware portion length {} not word-aligned", len);
                        return Err(BootError::FirmwareAlignment(len));
                    }
                    info!(
                        "firmware portion: {} bytes at {=u32:x}",
                        len, portion.address
                    );
                    self.load.base = portion.address;
                    self.set_partition(regs::download_partition(portion.address))?;
                    self.scratch.acquire()?;
                    self.load.stage = LoadStage::EntrySelect;
                }

                LoadStage::EntrySelect => {
                    let len = self.fw.ok_or(BootError::State)?.buf.len();
                    self.load.read_chunks = 0;
                    self.load.write_chunks = 0;
                    self.load.limit = self.load.base + regs::PARTITION_DOWN_MEM_SIZE;
                    self.load.stage = if len < CHUNK {
                        LoadStage::Remainder
                    } else {
                        LoadStage::ChunkCheck
                    };
                }

                LoadStage::ChunkCheck => {
                    let len = self.fw.ok_or(BootError::State)?.buf.len();
                    if (self.load.read_chunks as usize) < len / CHUNK {
                        self.load.stage = LoadStage::ChunkWrite;
                        // One chunk of headroom beyond the next write (the
                        // final chunk plus remainder): move the window
                        // before a transfer could straddle its end.
                        let lookahead =
                            (self.load.write_chunks + 2) * CHUNK as u32 + self.load.base;
                        if lookahead > self.load.limit {
                            self.load.base += self.load.write_chunks * CHUNK as u32;
                            self.load.limit = self.load.base + regs::PARTITION_DOWN_MEM_SIZE;
                            self.set_partition(regs::download_partition(self.load.base))?;
                            self.load.write_chunks = 0;
                            info!("download window moved to {=u32:x}", self.load.base);
                        }
                    } else {
                        self.load.stage = LoadStage::Remainder;
                    }
                }

                LoadStage::ChunkWrite => {
                    self.load.stage = LoadStage::ChunkCheck;
                    let portion = self.fw.ok_or(BootError::State)?;
                    let src = self.load.read_chunks as usize * CHUNK;
                    let addr = self.load.base + self.load.write_chunks * CHUNK as u32;
                    self.scratch.buf[BUS_FRAME_PAD..BUS_FRAME_PAD + CHUNK]
                        .copy_from_slice(&portion.buf[src..src + CHUNK]);
                    self.load.read_chunks += 1;
                    self.load.write_chunks += 1;
                    let token = self.pool.alloc().ok_or(BootError::SlotsExhausted)?;
                    let outcome = self.bus.write_block(
                        addr,
                        &mut self.scratch.buf[..BUS_FRAME_PAD + CHUNK],
                        BUS_FRAME_PAD,
                        token,
                    );
                    ready!(self.note_block_write(outcome, token, ResumeTo::Load));
                }

                LoadStage::Remainder => {
                    self.load.stage = LoadStage::Cleanup;
                    let portion = self.fw.ok_or(BootError::State)?;
                    let rem = portion.buf.len() % CHUNK;
                    if rem == 0 {
                        continue;
                    }
                    let src = self.load.read_chunks as usize * CHUNK;
                    let addr = self.load.base + self.load.write_chunks * CHUNK as u32;
                    self.scratch.buf[BUS_FRAME_PAD..BUS_FRAME_PAD + rem]
                        .copy_from_slice(&portion.buf[src..src + rem]);
                    let token = self.pool.alloc().ok_or(BootError::SlotsExhausted)?;
                    let outcome = self.bus.write_block(
                        addr,
                        &mut self.scratch.buf[..BUS_FRAME_PAD + rem],
                        BUS_FRAME_PAD,
                        token,
                    );
                    ready!(self.note_block_write(outcome, token, ResumeTo::Load));
                }

                LoadStage::Cleanup => {
                    self.scratch.release();
                    self.load.stage = LoadStage::Idle;
                    let last = self.fw.is_some_and(|p| p.last);
                    if last {
                        info!("firmware image transferred - running it");
                        self.fin = FinState::start();
                        return self.finalize_step();
                    }
                    info!("portion transferred, more expected");
                    self.host.more_firmware_expected();
                    return Ok(Step::Complete);
                }
            }
        }
    }
}

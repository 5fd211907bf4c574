//! The disk capability and the image-file floppy backend.
//!
//! Positions pack `unit << 24 | cylinder << 16 | head << 8 | sector`.
//! Status longs are zero on success; a non-zero high byte carries the
//! error class, with the unit class from the access mode folded into
//! bits 25..24.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::{Mutex, PoisonError};

use cpu_m68k::bus::FunctionCode;
use cpu_m68k::memory_map::MemoryMap;

/// CHS out of range for the medium.
pub const STATUS_BAD_POSITION: u32 = 0x4004_0000;
/// The backend returned no data.
pub const STATUS_READ_FAILED: u32 = 0x4020_0000;
/// The backend returned a partial sector.
pub const STATUS_PARTIAL_SECTOR: u32 = 0x4020_2000;

const FC: FunctionCode = FunctionCode::SuperData;

/// A block device addressed by packed CHS positions.
pub trait Disk: Send {
    fn seek(&mut self, mode: u32, pos: u32) -> u32;
    fn read(&mut self, mode: u32, pos: u32, mem: &MemoryMap, buf: u32, nbytes: u32) -> u32;
    fn write(&mut self, mode: u32, pos: u32, mem: &MemoryMap, buf: u32, nbytes: u32) -> u32;
    fn verify(&mut self, mode: u32, pos: u32, mem: &MemoryMap, buf: u32, nbytes: u32) -> u32;
}

/// Fold the unit class from the access mode into a status long.
fn with_unit(status: u32, mode: u32) -> u32 {
    status | (mode >> 8 & 0x3) << 24
}

/// 2HD floppy image file: 77 cylinders, 2 heads, 8 sectors of 1024
/// bytes.
pub struct ImageFileDisk {
    image: Mutex<File>,
}

const SECTOR: u64 = 1024;

impl ImageFileDisk {
    #[must_use]
    pub fn new(image: File) -> Self {
        Self {
            image: Mutex::new(image),
        }
    }

    /// Byte offset of a packed position, when it is on the medium.
    fn record_offset(pos: u32) -> Result<u64, u32> {
        let n = pos >> 24 & 0xff;
        let c = u64::from(pos >> 16 & 0xff);
        let h = u64::from(pos >> 8 & 0xff);
        let r = u64::from(pos & 0xff);

        // Record size class 3 is the 1024-byte sector of a 2HD medium.
        if n != 3 || c > 76 || h > 1 || !(1..=8).contains(&r) {
            return Err(STATUS_BAD_POSITION);
        }
        Ok(((c * 2 + h) * 8 + (r - 1)) * SECTOR)
    }

    fn position(&self, pos: u32) -> Result<(), u32> {
        let offset = Self::record_offset(pos)?;
        let mut image = self.image.lock().unwrap_or_else(PoisonError::into_inner);
        image
            .seek(SeekFrom::Start(offset))
            .map_err(|_| STATUS_READ_FAILED)?;
        Ok(())
    }
}

impl Disk for ImageFileDisk {
    fn seek(&mut self, mode: u32, pos: u32) -> u32 {
        match self.position(pos) {
            Ok(()) => 0,
            Err(status) => with_unit(status, mode),
        }
    }

    fn read(&mut self, mode: u32, pos: u32, mem: &MemoryMap, buf: u32, nbytes: u32) -> u32 {
        if let Err(status) = self.position(pos) {
            return with_unit(status, mode);
        }
        // Whole sectors only.
        let mut nbytes = nbytes.div_ceil(SECTOR as u32) * SECTOR as u32;
        let mut buf = buf;
        let mut image = self.image.lock().unwrap_or_else(PoisonError::into_inner);
        while nbytes >= SECTOR as u32 {
            let mut data = [0u8; SECTOR as usize];
            match image.read(&mut data) {
                Err(_) => return STATUS_READ_FAILED,
                Ok(n) if n != data.len() => return STATUS_PARTIAL_SECTOR,
                Ok(_) => {}
            }
            if mem.write(buf, &data, FC).is_err() {
                return STATUS_READ_FAILED;
            }
            buf += SECTOR as u32;
            nbytes -= SECTOR as u32;
        }
        0
    }

    fn write(&mut self, mode: u32, pos: u32, mem: &MemoryMap, buf: u32, nbytes: u32) -> u32 {
        if let Err(status) = self.position(pos) {
            return with_unit(status, mode);
        }
        let mut nbytes = nbytes.div_ceil(SECTOR as u32) * SECTOR as u32;
        let mut buf = buf;
        let mut image = self.image.lock().unwrap_or_else(PoisonError::into_inner);
        while nbytes >= SECTOR as u32 {
            let mut data = [0u8; SECTOR as usize];
            if mem.read(buf, &mut data, FC).is_err() {
                return STATUS_READ_FAILED;
            }
            if image.write_all(&data).is_err() {
                return STATUS_READ_FAILED;
            }
            buf += SECTOR as u32;
            nbytes -= SECTOR as u32;
        }
        0
    }

    fn verify(&mut self, mode: u32, pos: u32, mem: &MemoryMap, buf: u32, nbytes: u32) -> u32 {
        if let Err(status) = self.position(pos) {
            return with_unit(status, mode);
        }
        let mut nbytes = nbytes.div_ceil(SECTOR as u32) * SECTOR as u32;
        let mut buf = buf;
        let mut image = self.image.lock().unwrap_or_else(PoisonError::into_inner);
        while nbytes >= SECTOR as u32 {
            let mut data = [0u8; SECTOR as usize];
            match image.read(&mut data) {
                Err(_) => return STATUS_READ_FAILED,
                Ok(n) if n != data.len() => return STATUS_PARTIAL_SECTOR,
                Ok(_) => {}
            }
            let mut guest = [0u8; SECTOR as usize];
            if mem.read(buf, &mut guest, FC).is_err() {
                return STATUS_READ_FAILED;
            }
            if guest != data {
                return with_unit(STATUS_READ_FAILED, mode);
            }
            buf += SECTOR as u32;
            nbytes -= SECTOR as u32;
        }
        0
    }
}

//! Battery-backed SRAM, persisted to a host file.
//!
//! The 16 KiB image holds boot configuration. Two fields get defaults
//! when the image is blank: the main-memory size at +8 (4 MiB) and the
//! boot-up flag byte at +0x1d (16). Writes go through to the file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use cpu_m68k::bus::{BusError, FunctionCode, Memory};

pub const SRAM_SIZE: usize = 16 * 1024;

/// Offset of the 32-bit main-memory size field.
const MEMORY_SIZE_OFFSET: usize = 8;
/// Offset of the boot-up flag byte.
const BOOT_FLAG_OFFSET: usize = 0x1d;

const DEFAULT_MEMORY_SIZE: u32 = 4 * 1024 * 1024;
const DEFAULT_BOOT_FLAG: u8 = 16;

struct Inner {
    buf: Box<[u8; SRAM_SIZE]>,
    file: Option<File>,
}

pub struct Sram {
    inner: Mutex<Inner>,
}

impl Sram {
    /// Open (or create and grow) the backing file and apply defaults.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if file.metadata()?.len() < SRAM_SIZE as u64 {
            file.set_len(SRAM_SIZE as u64)?;
        }
        let mut buf = Box::new([0u8; SRAM_SIZE]);
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf[..])?;

        let mut sram = Self {
            inner: Mutex::new(Inner {
                buf,
                file: Some(file),
            }),
        };
        sram.apply_defaults()?;
        Ok(sram)
    }

    /// A volatile SRAM with defaults applied and no backing file.
    #[must_use]
    pub fn volatile() -> Self {
        let mut sram = Self {
            inner: Mutex::new(Inner {
                buf: Box::new([0u8; SRAM_SIZE]),
                file: None,
            }),
        };
        // No file I/O can fail here.
        sram.apply_defaults().expect("volatile sram");
        sram
    }

    fn apply_defaults(&mut self) -> std::io::Result<()> {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        let size_field = &mut inner.buf[MEMORY_SIZE_OFFSET..MEMORY_SIZE_OFFSET + 4];
        if size_field == [0; 4] {
            size_field.copy_from_slice(&DEFAULT_MEMORY_SIZE.to_be_bytes());
        }
        if inner.buf[BOOT_FLAG_OFFSET] == 0 {
            inner.buf[BOOT_FLAG_OFFSET] = DEFAULT_BOOT_FLAG;
        }
        if let Some(file) = &mut inner.file {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&inner.buf[..])?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configured main-memory size.
    #[must_use]
    pub fn memory_size(&self) -> u32 {
        let inner = self.lock();
        let mut field = [0u8; 4];
        field.copy_from_slice(&inner.buf[MEMORY_SIZE_OFFSET..MEMORY_SIZE_OFFSET + 4]);
        u32::from_be_bytes(field)
    }

    /// Boot-up flag byte.
    #[must_use]
    pub fn boot_flag(&self) -> u8 {
        self.lock().buf[BOOT_FLAG_OFFSET]
    }

    fn store(&self, offset: usize, bytes: &[u8]) {
        let mut inner = self.lock();
        inner.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        if let Some(file) = &mut inner.file {
            // Write-through; persistence failures only get logged.
            let r = file
                .seek(SeekFrom::Start(offset as u64))
                .and_then(|_| file.write_all(bytes));
            if let Err(e) = r {
                log::warn!("sram: write-through failed: {e}");
            }
        }
    }
}

impl Memory for Sram {
    fn get_8(&self, address: u32, _fc: FunctionCode) -> Result<u8, BusError> {
        let offset = (address as usize) & (SRAM_SIZE - 1);
        Ok(self.lock().buf[offset])
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        let hi = self.get_8(address, fc)?;
        let lo = self.get_8(address.wrapping_add(1), fc)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    fn put_8(&self, address: u32, value: u8, _fc: FunctionCode) -> Result<(), BusError> {
        let offset = (address as usize) & (SRAM_SIZE - 1);
        self.store(offset, &[value]);
        Ok(())
    }

    fn put_16(&self, address: u32, value: u16, _fc: FunctionCode) -> Result<(), BusError> {
        let offset = (address as usize) & (SRAM_SIZE - 1);
        if offset + 1 < SRAM_SIZE {
            self.store(offset, &value.to_be_bytes());
        } else {
            self.store(offset, &[(value >> 8) as u8]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpu_m68k::bus::Memory;

    const FC: FunctionCode = FunctionCode::SuperData;

    #[test]
    fn blank_image_gets_defaults() {
        let sram = Sram::volatile();
        assert_eq!(sram.memory_size(), 4 * 1024 * 1024);
        assert_eq!(sram.boot_flag(), 16);
    }

    #[test]
    fn file_image_grows_and_persists() {
        let path = std::env::temp_dir().join(format!("x68k-sram-test-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let sram = Sram::open(&path).unwrap();
            sram.put_16(0x100, 0xbeef, FC).unwrap();
        }
        {
            let sram = Sram::open(&path).unwrap();
            assert_eq!(sram.get_16(0x100, FC).unwrap(), 0xbeef);
            assert_eq!(sram.memory_size(), 4 * 1024 * 1024);
            assert_eq!(std::fs::metadata(&path).unwrap().len(), SRAM_SIZE as u64);
        }
        let _ = std::fs::remove_file(&path);
    }
}

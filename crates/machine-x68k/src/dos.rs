//! Hosted-DOS runtime state: error codes, the file-handle table, and
//! the process memory chain.

use std::sync::Arc;

use cpu_m68k::memory_map::{MemoryError, MemoryMap};

use crate::allocator::MemoryAllocator;
use crate::hostfs::{HostFile, HostFs};

/// Invalid function or mode argument.
pub const ERR_INVALID_MODE: i32 = -12;
/// No such block in the memory chain.
pub const ERR_INVALID_BLOCK: i32 = -9;
/// The memory chain is corrupt.
pub const ERR_MEMORY_CORRUPT: i32 = -7;
/// Host I/O failure.
pub const ERR_IO: i32 = -6;
/// File not found.
pub const ERR_FILE_NOT_FOUND: i32 = -2;
/// Bad file handle.
pub const ERR_BAD_HANDLE: i32 = -4;

/// Size of the process descriptor block preceding a loaded program
/// image.
pub const PDB_SIZE: u32 = 0x100;

const MAX_FILES: usize = 32;

/// Guest file handles 0..=4 are the standard streams; real slots start
/// above them.
const FIRST_HANDLE: i32 = 5;

/// The per-machine DOS state: one allocator over the free store and a
/// handle table bridging to the host file system.
pub struct Dos {
    allocator: MemoryAllocator,
    hostfs: Box<dyn HostFs>,
    files: Vec<Option<Box<dyn HostFile>>>,
}

impl Dos {
    #[must_use]
    pub fn new(mem: Arc<MemoryMap>, base: u32, limit: u32, hostfs: Box<dyn HostFs>) -> Self {
        Self {
            allocator: MemoryAllocator::new(mem, base, limit),
            hostfs,
            files: (0..MAX_FILES).map(|_| None).collect(),
        }
    }

    pub fn allocator(&mut self) -> &mut MemoryAllocator {
        &mut self.allocator
    }

    fn slot(&mut self, handle: i32) -> Result<&mut Box<dyn HostFile>, i32> {
        let index = usize::try_from(handle - FIRST_HANDLE).map_err(|_| ERR_BAD_HANDLE)?;
        self.files
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or(ERR_BAD_HANDLE)
    }

    /// DOS _OPEN: returns a handle or a negative code.
    pub fn open(&mut self, name: &str, mode: u32) -> i32 {
        if mode > 2 {
            return ERR_INVALID_MODE;
        }
        let file = match self.hostfs.open(name, mode) {
            Ok(file) => file,
            Err(code) => return code,
        };
        self.install(file)
    }

    /// DOS _CREATE.
    pub fn create(&mut self, name: &str, attrs: u32) -> i32 {
        let file = match self.hostfs.create(name, attrs) {
            Ok(file) => file,
            Err(code) => return code,
        };
        self.install(file)
    }

    fn install(&mut self, file: Box<dyn HostFile>) -> i32 {
        match self.files.iter_mut().enumerate().find(|(_, f)| f.is_none()) {
            Some((index, slot)) => {
                *slot = Some(file);
                index as i32 + FIRST_HANDLE
            }
            None => ERR_IO,
        }
    }

    /// DOS _CLOSE.
    pub fn close(&mut self, handle: i32) -> i32 {
        let Ok(index) = usize::try_from(handle - FIRST_HANDLE) else {
            return ERR_BAD_HANDLE;
        };
        match self.files.get_mut(index) {
            Some(slot @ Some(_)) => {
                *slot = None;
                0
            }
            _ => ERR_BAD_HANDLE,
        }
    }

    /// DOS _READ into guest memory.
    pub fn read(&mut self, mem: &MemoryMap, handle: i32, ptr: u32, len: u32) -> i32 {
        match self.slot(handle) {
            Ok(file) => file.read(mem, ptr, len),
            Err(code) => code,
        }
    }

    /// DOS _WRITE from guest memory.
    pub fn write(&mut self, mem: &MemoryMap, handle: i32, ptr: u32, len: u32) -> i32 {
        match self.slot(handle) {
            Ok(file) => file.write(mem, ptr, len),
            Err(code) => code,
        }
    }

    /// DOS _SEEK.
    pub fn seek(&mut self, handle: i32, offset: i32, whence: u32) -> i32 {
        if whence > 2 {
            return ERR_INVALID_MODE;
        }
        match self.slot(handle) {
            Ok(file) => file.seek(offset, whence),
            Err(code) => code,
        }
    }

    /// DOS _CHMOD.
    pub fn chmod(&mut self, name: &str, attrs: u32) -> i32 {
        self.hostfs.chmod(name, attrs)
    }

    /// DOS _MALLOC: the guest-visible allocator result in D0 form.
    pub fn malloc(&mut self, len: u32, parent: u32) -> Result<i32, MemoryError> {
        self.allocator.alloc(len, parent)
    }

    /// DOS _MFREE.
    pub fn mfree(&mut self, memptr: u32) -> Result<i32, MemoryError> {
        self.allocator.free(memptr)
    }

    /// DOS _SETBLOCK.
    pub fn setblock(&mut self, memptr: u32, newlen: u32) -> Result<i32, MemoryError> {
        self.allocator.resize(memptr, newlen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_memory::MainMemory;

    struct VecFile {
        data: Vec<u8>,
        pos: usize,
    }

    impl HostFile for VecFile {
        fn read(&mut self, mem: &MemoryMap, ptr: u32, len: u32) -> i32 {
            let end = (self.pos + len as usize).min(self.data.len());
            let chunk = &self.data[self.pos..end];
            if mem
                .write(ptr, chunk, cpu_m68k::FunctionCode::SuperData)
                .is_err()
            {
                return ERR_IO;
            }
            self.pos = end;
            chunk.len() as i32
        }

        fn write(&mut self, mem: &MemoryMap, ptr: u32, len: u32) -> i32 {
            let mut chunk = vec![0; len as usize];
            if mem
                .read(ptr, &mut chunk, cpu_m68k::FunctionCode::SuperData)
                .is_err()
            {
                return ERR_IO;
            }
            self.data.truncate(self.pos);
            self.data.extend_from_slice(&chunk);
            self.pos = self.data.len();
            len as i32
        }

        fn seek(&mut self, offset: i32, whence: u32) -> i32 {
            let base = match whence {
                0 => 0,
                1 => self.pos as i32,
                _ => self.data.len() as i32,
            };
            self.pos = (base + offset).max(0) as usize;
            self.pos as i32
        }
    }

    struct OneFileFs;

    impl HostFs for OneFileFs {
        fn open(&mut self, name: &str, _mode: u32) -> Result<Box<dyn HostFile>, i32> {
            if name == "README.DOC" {
                Ok(Box::new(VecFile {
                    data: b"hello".to_vec(),
                    pos: 0,
                }))
            } else {
                Err(ERR_FILE_NOT_FOUND)
            }
        }

        fn create(&mut self, _name: &str, _attrs: u32) -> Result<Box<dyn HostFile>, i32> {
            Ok(Box::new(VecFile {
                data: Vec::new(),
                pos: 0,
            }))
        }

        fn chmod(&mut self, _name: &str, _attrs: u32) -> i32 {
            0x20
        }
    }

    fn setup() -> (Dos, Arc<MemoryMap>) {
        let mut map = MemoryMap::new();
        map.fill(0, 0x10_0000, Arc::new(MainMemory::new(0x10_0000)));
        let map = Arc::new(map);
        let dos = Dos::new(map.clone(), 0x8000, 0x10_0000, Box::new(OneFileFs));
        (dos, map)
    }

    #[test]
    fn open_read_close_round_trip() {
        let (mut dos, map) = setup();
        let handle = dos.open("README.DOC", 0);
        assert!(handle >= 5);
        let n = dos.read(&map, handle, 0x1000, 16);
        assert_eq!(n, 5);
        assert_eq!(
            map.get_string(0x1000, cpu_m68k::FunctionCode::SuperData)
                .unwrap(),
            "hello"
        );
        assert_eq!(dos.close(handle), 0);
        assert_eq!(dos.close(handle), ERR_BAD_HANDLE);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let (mut dos, _map) = setup();
        assert_eq!(dos.open("MISSING.X", 0), ERR_FILE_NOT_FOUND);
        assert_eq!(dos.open("README.DOC", 9), ERR_INVALID_MODE);
    }

    #[test]
    fn malloc_goes_through_the_chain() {
        let (mut dos, _map) = setup();
        let a = dos.malloc(0x100, 0).unwrap();
        assert_eq!(a, 0x8010);
        assert_eq!(dos.mfree(a as u32).unwrap(), 0);
        assert_eq!(dos.mfree(a as u32).unwrap(), ERR_INVALID_BLOCK);
    }
}

//! Virtual X68000: the memory fabric around a 68000 core.
//!
//! The machine assembles the paged address space (main RAM, graphic and
//! text VRAM, the device register pages, battery SRAM), wires interrupt
//! lines to the timer devices, and services IOCS calls (TRAP #15) on the
//! host side the way the ROM would.

pub mod allocator;
pub mod config;
pub mod console;
pub mod devices;
pub mod disk;
pub mod dos;
pub mod hostfs;
pub mod main_memory;
pub mod sram;
pub mod text_vram;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use cpu_m68k::bus::FunctionCode;
use cpu_m68k::cpu::{Context, Step};
use cpu_m68k::exceptions::FatalError;
use cpu_m68k::exec::ExecUnit;
use cpu_m68k::interrupts::InterruptLines;
use cpu_m68k::memory_map::{MemoryError, MemoryMap};

use crate::allocator::MemoryAllocator;
use crate::console::Console;
use crate::devices::{
    AdpcmMemory, CrtcMemory, DmacMemory, FdcMemory, GraphicVram, MfpMemory, OpmMemory,
    PaletteMemory, PpiMemory, SccMemory, SpriteMemory,
};
use crate::disk::Disk;
use crate::dos::Dos;
use crate::hostfs::HostFs;
use crate::main_memory::MainMemory;
use crate::sram::Sram;
use crate::text_vram::{COLUMNS, ROWS, TextVram};

pub use crate::config::X68kConfig as Config;

const FC: FunctionCode = FunctionCode::SuperData;

/// Number of floppy units.
pub const NFDS: usize = 2;

type IocsHandler = fn(&mut X68000) -> Result<(), MemoryError>;

/// Host-side keyboard queue; posts block the reader until a key shows
/// up, matching the ROM's synchronous key input call.
struct KeyQueue {
    keys: Mutex<VecDeque<u16>>,
    not_empty: Condvar,
}

impl KeyQueue {
    fn new() -> Self {
        Self {
            keys: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    fn push(&self, key: u16) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.push_back(key);
        self.not_empty.notify_one();
    }

    fn pop_blocking(&self) -> u16 {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(key) = keys.pop_front() {
                return key;
            }
            keys = self
                .not_empty
                .wait(keys)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// A complete virtual X68000.
pub struct X68000 {
    pub cpu: Context,
    pub exec: ExecUnit,
    pub mem: Arc<MemoryMap>,
    lines: Arc<InterruptLines>,
    console: Arc<dyn Console>,

    pub main_memory: Arc<MainMemory>,
    pub text_vram: Arc<TextVram>,
    pub sram: Arc<Sram>,
    pub opm: Arc<OpmMemory>,
    pub scc: Arc<SccMemory>,

    keys: KeyQueue,
    fd: [Option<Box<dyn Disk>>; NFDS],
    dos: Option<Dos>,
    iocs: [IocsHandler; 0x100],

    // Text cursor for the console output IOCS calls.
    curx: u32,
    cury: u32,
    saved_byte1: u32,
}

impl X68000 {
    pub fn new(config: &Config, console: Arc<dyn Console>) -> std::io::Result<Self> {
        let sram = Arc::new(match &config.sram_path {
            Some(path) => Sram::open(path)?,
            None => Sram::volatile(),
        });
        let memory_size = config.memory_size.unwrap_or_else(|| sram.memory_size());

        let main_memory = Arc::new(MainMemory::new(memory_size));
        let text_vram = Arc::new(TextVram::new(console.clone()));
        let opm = Arc::new(OpmMemory::new());
        let scc = Arc::new(SccMemory::new());

        let mut map = MemoryMap::new();
        map.fill(0, memory_size, main_memory.clone());
        map.fill(0xc0_0000, 0xe0_0000, Arc::new(GraphicVram::new()));
        map.fill(0xe0_0000, 0xe8_0000, text_vram.clone());
        map.fill(0xe8_0000, 0xe8_2000, Arc::new(CrtcMemory::new()));
        map.fill(0xe8_2000, 0xe8_4000, Arc::new(PaletteMemory::new()));
        map.fill(0xe8_4000, 0xe8_6000, Arc::new(DmacMemory::new()));
        map.fill(0xe8_8000, 0xe8_a000, Arc::new(MfpMemory::new()));
        map.fill(0xe9_0000, 0xe9_2000, opm.clone());
        map.fill(0xe9_2000, 0xe9_4000, Arc::new(AdpcmMemory::new()));
        map.fill(0xe9_4000, 0xe9_6000, Arc::new(FdcMemory::new()));
        map.fill(0xe9_8000, 0xe9_a000, scc.clone());
        map.fill(0xe9_a000, 0xe9_c000, Arc::new(PpiMemory::new()));
        map.fill(0xeb_0000, 0xec_0000, Arc::new(SpriteMemory::new()));
        map.fill(0xed_0000, 0xed_4000, sram.clone());
        let mem = Arc::new(map);

        let lines = Arc::new(InterruptLines::new());
        let mut cpu = Context::new(mem.clone(), lines.clone());
        // IOCS calls are serviced host-side instead of through the guest
        // vector table.
        cpu.intercept_trap(15);

        opm.reset(console.time());
        opm.set_interrupt_enabled(true);

        let mut iocs: [IocsHandler; 0x100] = [Self::iocs_invalid; 0x100];
        iocs[0x00] = Self::iocs_b_keyinp;
        iocs[0x20] = Self::iocs_b_putc;
        iocs[0x21] = Self::iocs_b_print;
        iocs[0x44] = Self::iocs_b_verify;
        iocs[0x45] = Self::iocs_b_write;
        iocs[0x46] = Self::iocs_b_read;
        iocs[0x47] = Self::iocs_b_seek;
        iocs[0x84] = Self::iocs_b_lpeek;

        Ok(Self {
            cpu,
            exec: ExecUnit::new(),
            mem,
            lines,
            console,
            main_memory,
            text_vram,
            sram,
            opm,
            scc,
            keys: KeyQueue::new(),
            fd: [None, None],
            dos: None,
            iocs,
            curx: 0,
            cury: 0,
            saved_byte1: 0,
        })
    }

    /// Shared interrupt lines, for host-side device threads.
    #[must_use]
    pub fn interrupt_lines(&self) -> Arc<InterruptLines> {
        self.lines.clone()
    }

    /// Load the reset vectors: SSP from 0, PC from 4.
    pub fn reset(&mut self) -> Result<(), MemoryError> {
        self.cpu.set_supervisor_state(true);
        self.cpu.regs.a[7] = self.mem.get_32(0, FC)?;
        self.cpu.regs.pc = self.mem.get_32(4, FC)?;
        Ok(())
    }

    /// Insert a floppy disk into a unit.
    pub fn insert_disk(&mut self, unit: usize, disk: Box<dyn Disk>) {
        if unit < NFDS {
            self.fd[unit] = Some(disk);
        }
    }

    /// Attach the hosted-DOS runtime: its allocator manages
    /// `[base, limit)` of main memory and file calls bridge to `hostfs`.
    pub fn attach_dos(&mut self, base: u32, limit: u32, hostfs: Box<dyn HostFs>) {
        self.dos = Some(Dos::new(self.mem.clone(), base, limit, hostfs));
    }

    pub fn dos(&mut self) -> Option<&mut Dos> {
        self.dos.as_mut()
    }

    /// Direct access to the DOS allocator, when attached.
    pub fn allocator(&mut self) -> Option<&mut MemoryAllocator> {
        self.dos.as_mut().map(Dos::allocator)
    }

    /// Post a key from the host keyboard.
    pub fn queue_key(&self, key: u16) {
        self.keys.push(key);
    }

    /// Execute one CPU step, servicing IOCS traps and device timers.
    pub fn step(&mut self) -> Result<Step, FatalError> {
        let step = self.cpu.step(&self.exec)?;
        if step == Step::Trap(15) {
            self.iocs_dispatch();
        }
        self.opm.check_timeouts(self.console.time(), &self.lines);
        Ok(step)
    }

    /// Execute up to `n` steps, stopping early only on a fatal error.
    pub fn run_for(&mut self, n: u64) -> Result<(), FatalError> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    // --- IOCS ---

    fn iocs_dispatch(&mut self) {
        let funcno = (self.cpu.regs.d[0] & 0xff) as usize;
        log::trace!("iocs {funcno:#04x}");
        let handler = self.iocs[funcno];
        if let Err(e) = handler(self) {
            log::warn!("iocs {funcno:#04x}: {e}");
        }
    }

    fn iocs_invalid(&mut self) -> Result<(), MemoryError> {
        log::warn!("unhandled iocs function {:#04x}", self.cpu.regs.d[0] & 0xff);
        self.cpu.regs.d[0] = u32::MAX;
        Ok(())
    }

    fn iocs_b_keyinp(&mut self) -> Result<(), MemoryError> {
        self.cpu.regs.d[0] = u32::from(self.keys.pop_blocking());
        Ok(())
    }

    fn iocs_b_putc(&mut self) -> Result<(), MemoryError> {
        let code = self.cpu.regs.d[1] & 0xffff;
        self.put_char(code);
        Ok(())
    }

    fn iocs_b_print(&mut self) -> Result<(), MemoryError> {
        // Raw bytes, not a lossy string: Shift-JIS pairs go through
        // put_char one byte at a time.
        let mut address = self.cpu.regs.a[1];
        loop {
            let byte = self.mem.get_8(address, FC)?;
            if byte == 0 {
                break;
            }
            self.put_char(u32::from(byte));
            address = address.wrapping_add(1);
        }
        Ok(())
    }

    fn iocs_b_lpeek(&mut self) -> Result<(), MemoryError> {
        let address = self.cpu.regs.a[1];
        self.cpu.regs.d[0] = self.mem.get_32(address, FC)?;
        self.cpu.regs.a[1] = address.wrapping_add(4);
        Ok(())
    }

    fn disk_call(
        &mut self,
        op: fn(&mut dyn Disk, u32, u32, &MemoryMap, u32, u32) -> u32,
    ) -> Result<(), MemoryError> {
        let mode = self.cpu.regs.d[1] & 0xffff;
        let pos = self.cpu.regs.d[2];
        let nbytes = self.cpu.regs.d[3];
        let buf = self.cpu.regs.a[1];
        let unit = (mode >> 8 & 0x3) as usize;
        let status = match self.fd[unit].as_mut() {
            Some(disk) => op(disk.as_mut(), mode, pos, &self.mem, buf, nbytes),
            None => crate::disk::STATUS_BAD_POSITION | (mode >> 8 & 0x3) << 24,
        };
        self.cpu.regs.d[0] = status;
        Ok(())
    }

    fn iocs_b_seek(&mut self) -> Result<(), MemoryError> {
        self.disk_call(|disk, mode, pos, _mem, _buf, _nbytes| disk.seek(mode, pos))
    }

    fn iocs_b_read(&mut self) -> Result<(), MemoryError> {
        self.disk_call(|disk, mode, pos, mem, buf, nbytes| disk.read(mode, pos, mem, buf, nbytes))
    }

    fn iocs_b_write(&mut self) -> Result<(), MemoryError> {
        self.disk_call(|disk, mode, pos, mem, buf, nbytes| disk.write(mode, pos, mem, buf, nbytes))
    }

    fn iocs_b_verify(&mut self) -> Result<(), MemoryError> {
        self.disk_call(|disk, mode, pos, mem, buf, nbytes| disk.verify(mode, pos, mem, buf, nbytes))
    }

    // --- console text output ---

    /// Put one character at the cursor, handling control characters and
    /// two-byte Shift-JIS sequences.
    fn put_char(&mut self, code: u32) {
        if code <= 0x1f || code == 0x7f {
            self.saved_byte1 = 0;
            match code {
                0x09 => self.curx = (self.curx + 8) & !7,
                0x0a => self.line_feed(),
                0x0d => self.curx = 0,
                _ => {}
            }
            return;
        }

        let mut code = code;
        if self.saved_byte1 != 0 {
            if code <= 0xff {
                code |= self.saved_byte1 << 8;
            }
            self.saved_byte1 = 0;
        }

        // A double-width glyph cannot start in the last column.
        if code >= 0x100 && self.curx + 1 == COLUMNS {
            self.curx += 1;
        }
        if self.curx >= COLUMNS {
            self.curx = 0;
            self.line_feed();
        }

        if (0x80..=0x9f).contains(&code) || (0xe0..=0xff).contains(&code) {
            // First byte of a Shift-JIS pair.
            self.saved_byte1 = code;
        } else {
            self.text_vram.draw_char(self.curx, self.cury, code);
            self.curx += if code >= 0x100 { 2 } else { 1 };
        }
    }

    fn line_feed(&mut self) {
        self.cury += 1;
        if self.cury == ROWS {
            self.cury -= 1;
            self.text_vram.scroll();
        }
    }
}

pub mod prelude {
    pub use crate::console::{Console, NullConsole};
    pub use crate::{Config, X68000};
    pub use cpu_m68k::{Context, ExecUnit, Step};
}

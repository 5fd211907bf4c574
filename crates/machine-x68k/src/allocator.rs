//! The hosted-DOS memory-block allocator.
//!
//! Blocks live inside guest memory as a doubly-linked list in address
//! order. Each block starts with a 16-byte header:
//!
//! ```text
//! +0  previous block address (0 at the head)
//! +4  parent block address (owner's header, 0 for top level)
//! +8  end address of the block (header + payload)
//! +12 next block address (0 at the tail)
//! ```
//!
//! The payload starts at `block + 0x10`. Only the tail pointer is kept
//! host-side; everything else is guest-visible state, so the layout and
//! the list walk are load-bearing for guest programs that inspect their
//! own memory chain.

use std::sync::Arc;

use cpu_m68k::bus::FunctionCode;
use cpu_m68k::memory_map::{MemoryError, MemoryMap};

const FC: FunctionCode = FunctionCode::SuperData;

/// Header size, and also the minimum gap that counts as "free".
const HEADER: u32 = 0x10;

/// Allocation failed, but a gap of the encoded size remains.
const OVER_ALLOC: u32 = 0x8100_0000;
/// No usable gap at all.
const OUT_OF_MEMORY: u32 = 0x8200_0000;

/// No block owns the given payload address.
const ERR_NO_BLOCK: i32 = -9;
/// The block chain is corrupt.
const ERR_CORRUPT: i32 = -7;

pub struct MemoryAllocator {
    mem: Arc<MemoryMap>,
    base: u32,
    limit: u32,
    last_block: u32,
}

impl MemoryAllocator {
    /// Manage the region `[base, limit)`, both rounded to 16 bytes.
    #[must_use]
    pub fn new(mem: Arc<MemoryMap>, base: u32, limit: u32) -> Self {
        Self {
            mem,
            base: (base + 0xf) & !0xf,
            limit: limit & !0xf,
            last_block: 0,
        }
    }

    /// Tail of the block chain, 0 when empty.
    #[must_use]
    pub fn last_block(&self) -> u32 {
        self.last_block
    }

    fn getl(&self, address: u32) -> Result<u32, MemoryError> {
        self.mem.get_32(address, FC)
    }

    fn putl(&self, address: u32, value: u32) -> Result<(), MemoryError> {
        self.mem.put_32(address, value, FC)
    }

    fn block_prev(&self, block: u32) -> Result<u32, MemoryError> {
        self.getl(block)
    }

    fn block_parent(&self, block: u32) -> Result<u32, MemoryError> {
        self.getl(block + 4)
    }

    fn block_end(&self, block: u32) -> Result<u32, MemoryError> {
        self.getl(block + 8)
    }

    fn block_next(&self, block: u32) -> Result<u32, MemoryError> {
        self.getl(block + 12)
    }

    /// Parent payload address to header field: the owner's block
    /// address, or 0 for a top-level block.
    fn parent_field(parent: u32) -> u32 {
        if parent == 0 { 0 } else { parent - HEADER }
    }

    /// Write a header at `block` and splice it between `prev` and `next`.
    /// `parent` is the owner's payload address (0 for top level).
    fn make_block(
        &mut self,
        block: u32,
        len: u32,
        prev: u32,
        next: u32,
        parent: u32,
    ) -> Result<(), MemoryError> {
        self.putl(block, prev)?;
        self.putl(block + 4, Self::parent_field(parent))?;
        self.putl(block + 8, block + len)?;
        self.putl(block + 12, next)?;

        if prev != 0 {
            self.putl(prev + 12, block)?;
        }
        if next != 0 {
            self.putl(next, block)?;
        } else {
            self.last_block = block;
        }
        Ok(())
    }

    fn remove_block(&mut self, block: u32) -> Result<(), MemoryError> {
        let prev = self.block_prev(block)?;
        let next = self.block_next(block)?;
        if prev != 0 {
            self.putl(prev + 12, next)?;
        }
        if next != 0 {
            self.putl(next, prev)?;
        } else {
            self.last_block = prev;
        }
        Ok(())
    }

    /// Allocate `len` payload bytes owned by `parent` (a payload address,
    /// or 0 for top level). Returns the payload address, or a negative
    /// code: `0x81000000 | largest` when something smaller would fit,
    /// `0x82000000` when nothing would.
    pub fn alloc(&mut self, len: u32, parent: u32) -> Result<i32, MemoryError> {
        log::trace!("allocator: allocating {len:#x} bytes");
        let full_len = len + HEADER;
        let mut max_free = HEADER;

        let mut next = self.limit;
        let mut block = self.last_block;
        while block != 0 {
            if block + HEADER > next {
                return Ok(ERR_CORRUPT);
            }
            let candidate = (self.block_end(block)? + 0xf) & !0xf;
            let free_len = next.saturating_sub(candidate);
            if free_len >= full_len {
                self.make_block(
                    candidate,
                    full_len,
                    block,
                    self.block_next(block)?,
                    parent,
                )?;
                return Ok((candidate + HEADER) as i32);
            }
            if free_len > max_free {
                max_free = free_len;
            }
            next = block;
            block = self.block_prev(block)?;
        }

        // The slot between the region base and the head of the chain
        // (or the whole region when the chain is empty).
        let head = if next == self.limit { 0 } else { next };
        let free_len = next.saturating_sub(self.base);
        if free_len >= full_len {
            self.make_block(self.base, full_len, 0, head, parent)?;
            return Ok((self.base + HEADER) as i32);
        }
        if free_len > max_free {
            max_free = free_len;
        }

        log::trace!("allocator: failure, largest gap {max_free:#x}");
        if max_free == HEADER {
            return Ok(OUT_OF_MEMORY as i32);
        }
        Ok((OVER_ALLOC | (max_free - HEADER)) as i32)
    }

    /// Allocate the single largest free gap in one block.
    pub fn alloc_largest(&mut self, parent: u32) -> Result<i32, MemoryError> {
        let mut best: Option<(u32, u32, u32)> = None; // (candidate, prev, next)
        let mut max_free = HEADER;

        let mut next = self.limit;
        let mut block = self.last_block;
        while block != 0 {
            if block + HEADER > next {
                return Ok(ERR_CORRUPT);
            }
            let candidate = (self.block_end(block)? + 0xf) & !0xf;
            let free_len = next.saturating_sub(candidate);
            if free_len > max_free {
                max_free = free_len;
                best = Some((candidate, block, self.block_next(block)?));
            }
            next = block;
            block = self.block_prev(block)?;
        }
        let head = if next == self.limit { 0 } else { next };
        let free_len = next.saturating_sub(self.base);
        if free_len > max_free {
            max_free = free_len;
            best = Some((self.base, 0, head));
        }

        let Some((candidate, prev, next)) = best else {
            return Ok(OUT_OF_MEMORY as i32);
        };
        self.make_block(candidate, max_free, prev, next, parent)?;
        Ok((candidate + HEADER) as i32)
    }

    /// Free every block whose parent chain reaches `parent` (a payload
    /// address).
    fn free_by_parent(&mut self, parent: u32) -> Result<(), MemoryError> {
        let mut block = self.last_block;
        while block != 0 {
            let prev = self.block_prev(block)?;
            if self.block_parent(block)? == parent - HEADER {
                self.free_by_parent(block + HEADER)?;
                self.remove_block(block)?;
            }
            block = prev;
        }
        Ok(())
    }

    /// Free the block whose payload is `memptr`, along with every
    /// descendant. Returns 0, -9 (no such block), or -7 (corrupt chain).
    pub fn free(&mut self, memptr: u32) -> Result<i32, MemoryError> {
        log::trace!("allocator: freeing block {memptr:#x}");
        let target = memptr.wrapping_sub(HEADER);

        let mut next = self.limit;
        let mut block = self.last_block;
        while block != 0 {
            if block + HEADER > next {
                return Ok(ERR_CORRUPT);
            }
            if block == target {
                self.free_by_parent(block + HEADER)?;
                self.remove_block(block)?;
                return Ok(0);
            }
            next = block;
            block = self.block_prev(block)?;
        }
        Ok(ERR_NO_BLOCK)
    }

    /// Grow or shrink the block whose payload is `memptr` to `newlen`
    /// payload bytes, in place.
    pub fn resize(&mut self, memptr: u32, newlen: u32) -> Result<i32, MemoryError> {
        log::trace!("allocator: resizing block {memptr:#x} to {newlen:#x} bytes");
        let new_brk = memptr + newlen;
        let target = memptr.wrapping_sub(HEADER);

        let mut next = self.limit;
        let mut block = self.last_block;
        while block != 0 {
            if block + HEADER > next {
                return Ok(ERR_CORRUPT);
            }
            if block == target {
                if next < new_brk {
                    let max_newlen = next - block;
                    if max_newlen == HEADER {
                        return Ok(OUT_OF_MEMORY as i32);
                    }
                    return Ok((OVER_ALLOC | (max_newlen - HEADER)) as i32);
                }
                self.putl(block + 8, new_brk)?;
                return Ok(0);
            }
            next = block;
            block = self.block_prev(block)?;
        }
        Ok(ERR_NO_BLOCK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_memory::MainMemory;

    const BASE: u32 = 0x10_0000;
    const LIMIT: u32 = 0x20_0000;

    fn setup() -> MemoryAllocator {
        let mut map = MemoryMap::new();
        map.fill(0, LIMIT, Arc::new(MainMemory::new(LIMIT)));
        MemoryAllocator::new(Arc::new(map), BASE, LIMIT)
    }

    #[test]
    fn alloc_free_alloc_reuses_the_base() {
        let mut alloc = setup();
        let a = alloc.alloc(0x100, 0).unwrap();
        assert_eq!(a, 0x10_0010);
        let b = alloc.alloc(0x100, a as u32).unwrap();
        assert_eq!(b, 0x10_0120);

        // Freeing the parent cascades into the child.
        assert_eq!(alloc.free(a as u32).unwrap(), 0);
        assert_eq!(alloc.last_block(), 0);
        assert_eq!(alloc.alloc(0x100, 0).unwrap(), 0x10_0010);
    }

    #[test]
    fn chain_stays_address_ordered() {
        let mut alloc = setup();
        let a = alloc.alloc(0x40, 0).unwrap() as u32;
        let b = alloc.alloc(0x40, 0).unwrap() as u32;
        let c = alloc.alloc(0x40, 0).unwrap() as u32;
        assert!(a < b && b < c);

        // Free the middle block and reallocate: the gap is reused.
        assert_eq!(alloc.free(b).unwrap(), 0);
        let again = alloc.alloc(0x40, 0).unwrap() as u32;
        assert_eq!(again, b);

        // Walk the chain from the tail and confirm ordering.
        let mem = alloc.mem.clone();
        let mut block = alloc.last_block();
        let mut prev_seen = u32::MAX;
        while block != 0 {
            assert!(block < prev_seen);
            prev_seen = block;
            block = mem.get_32(block, FC).unwrap();
        }
    }

    #[test]
    fn parent_cascade_frees_grandchildren() {
        let mut alloc = setup();
        let a = alloc.alloc(0x40, 0).unwrap() as u32;
        let b = alloc.alloc(0x40, a).unwrap() as u32;
        let _c = alloc.alloc(0x40, b).unwrap() as u32;
        let d = alloc.alloc(0x40, 0).unwrap() as u32;

        assert_eq!(alloc.free(a).unwrap(), 0);
        // Only the unrelated block remains.
        assert_eq!(alloc.last_block(), d - 0x10);
        assert_eq!(alloc.mem.get_32(d - 0x10, FC).unwrap(), 0, "no previous");
    }

    #[test]
    fn over_allocation_reports_the_largest_gap() {
        let mut alloc = setup();
        let total = LIMIT - BASE;
        let r = alloc.alloc(total, 0).unwrap();
        assert_eq!(r as u32 & 0xff00_0000, OVER_ALLOC);
        assert_eq!(r as u32 & 0x00ff_ffff, total - 0x10);

        // Fill the region, then nothing is left.
        let a = alloc.alloc(total - 0x10, 0).unwrap();
        assert!(a > 0);
        let r = alloc.alloc(0x10, 0).unwrap();
        assert_eq!(r as u32, OUT_OF_MEMORY);
    }

    #[test]
    fn free_of_unknown_pointer_is_reported() {
        let mut alloc = setup();
        assert_eq!(alloc.free(0x12_3456).unwrap(), -9);
    }

    #[test]
    fn resize_within_the_gap() {
        let mut alloc = setup();
        let a = alloc.alloc(0x100, 0).unwrap() as u32;
        let b = alloc.alloc(0x100, 0).unwrap() as u32;
        // Grow a up to the start of b's header, but not past it.
        let gap = (b - 0x10) - a;
        assert_eq!(alloc.resize(a, gap).unwrap(), 0);
        let r = alloc.resize(a, gap + 1).unwrap();
        assert_eq!(r as u32 & 0xff00_0000, OVER_ALLOC);
        assert_eq!(r as u32 & 0x00ff_ffff, gap);

        // The tail block can grow to the region limit.
        assert_eq!(alloc.resize(b, LIMIT - b).unwrap(), 0);
        assert_ne!(alloc.resize(b, LIMIT - b + 1).unwrap(), 0);
    }

    #[test]
    fn alloc_largest_takes_the_biggest_gap() {
        let mut alloc = setup();
        let a = alloc.alloc(0x100, 0).unwrap() as u32;
        let _b = alloc.alloc(0x100, 0).unwrap() as u32;
        assert_eq!(alloc.free(a).unwrap(), 0);
        // Gaps now: 0x100 bytes at the base, and the huge tail gap.
        let big = alloc.alloc_largest(0).unwrap() as u32;
        assert!(big > a, "tail gap chosen over the base gap");
        let end = alloc.mem.get_32(big - 0x10 + 8, FC).unwrap();
        assert_eq!(end, LIMIT, "gap fully consumed");
    }
}

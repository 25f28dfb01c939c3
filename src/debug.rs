//! Diagnostics compiled in with the `debug` feature: the statistics sweep,
//! the profiling snapshot machinery, the sanity walker and human-readable
//! dumps.
//!
//! Everything here is observational except [`Pool::start_profiling`] and the
//! pointer validation invoked by `deallocate`; none of it changes the block
//! layout.
use core::{
    fmt,
    ptr::NonNull,
};

use crate::pool::{BlockHdr, Pool, HEADER_SIZE};
use crate::ALIGN_MASK;

/// One-pass pool statistics, as reported by [`Pool::statistics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stat {
    /// Usable region size in bytes, pool header included.
    pub total: usize,
    /// Bytes held by used blocks, headers included.
    pub used: usize,
    /// Bytes held by free blocks, headers included.
    pub free: usize,
    /// Fragmentation proxy: the number of used/free transitions along the
    /// physical chain beyond the first.
    pub frag: usize,
}

/// Usage bounds recorded between [`Pool::start_profiling`] and
/// [`Pool::stop_profiling`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Profile {
    /// Used bytes at the moment profiling started.
    pub initial: usize,
    /// Highest used-byte count observed.
    pub max: usize,
    /// Lowest used-byte count observed.
    pub min: usize,
}

/// A block's size word is not a multiple of the alignment.
pub const SANITY_MISALIGNED_SIZE: u32 = 0x01;
/// A block claims to be larger than the whole pool.
pub const SANITY_OVERSIZED_BLOCK: u32 = 0x02;
/// A block's physical successor lies outside the pool, or the chain does
/// not advance.
pub const SANITY_NEXT_OUT_OF_BOUNDS: u32 = 0x04;
/// The previous block is used but the current block records it as free.
pub const SANITY_PREV_USED_AS_FREE: u32 = 0x08;
/// The previous block is free but the current block records it as used.
pub const SANITY_PREV_FREE_AS_USED: u32 = 0x10;

#[inline]
pub(crate) unsafe fn paint_bytes(ptr: *mut u8, len: usize, byte: u8) {
    core::ptr::write_bytes(ptr, byte, len);
}

impl<const FLLEN: usize, const SLLEN: usize> Pool<'_, FLLEN, SLLEN> {
    /// Sweep the physical chain once and report totals.
    pub fn statistics(&self) -> Stat {
        let mut stat = Stat {
            total: self.hdr().size as usize,
            used: 0,
            free: 0,
            frag: 0,
        };
        let mut transitions = 0usize;

        // Safety: the pool invariants hold between public operations.
        unsafe {
            let end = self.pool_end();
            let mut block = self.pool_top();
            let mut last_used = block.as_ref().is_used();
            while block.as_ptr().cast::<u8>() < end {
                let size = block.as_ref().block_size();
                if block.as_ref().is_used() {
                    stat.used += size;
                } else {
                    stat.free += size;
                }
                if block.as_ref().is_used() != last_used {
                    transitions += 1;
                    last_used = !last_used;
                }
                block = NonNull::new_unchecked(block.as_ptr().cast::<u8>().add(size)).cast();
            }
        }

        stat.frag = transitions.saturating_sub(1);
        stat
    }

    /// Start recording usage bounds. A no-op if profiling is already
    /// active. `initial`, `min` and `max` all restart from the current
    /// used-byte count.
    pub fn start_profiling(&mut self) {
        if self.hdr().profiling {
            return;
        }
        {
            let hdr = self.hdr_mut();
            hdr.profiling = true;
            hdr.prof = Profile {
                initial: 0,
                max: 0,
                min: usize::MAX,
            };
        }
        self.take_profile();
        let hdr = self.hdr_mut();
        hdr.prof.initial = hdr.prof.max;
        hdr.prof.min = hdr.prof.max;
    }

    /// Stop recording usage bounds. The recorded [`Profile`] stays
    /// readable.
    pub fn stop_profiling(&mut self) {
        self.hdr_mut().profiling = false;
    }

    /// The usage bounds recorded so far.
    pub fn profile(&self) -> Profile {
        self.hdr().prof
    }

    /// The message stored by the most recent rejected `deallocate`, cleared
    /// again by the next successful one.
    pub fn last_error(&self) -> Option<&'static str> {
        self.hdr().last_error
    }

    /// Update the running profile bounds. Called from every mutating
    /// operation while profiling is active.
    pub(crate) fn take_profile(&mut self) {
        if !self.hdr().profiling {
            return;
        }
        let used = self.used_bytes();
        let prof = &mut self.hdr_mut().prof;
        if prof.max < used {
            prof.max = used;
        }
        if used < prof.min {
            prof.min = used;
        }
    }

    fn used_bytes(&self) -> usize {
        let mut used = 0;
        // Safety: the pool invariants hold between public operations.
        unsafe {
            let end = self.pool_end();
            let mut block = self.pool_top();
            while block.as_ptr().cast::<u8>() < end {
                let size = block.as_ref().block_size();
                if block.as_ref().is_used() {
                    used += size;
                }
                block = NonNull::new_unchecked(block.as_ptr().cast::<u8>().add(size)).cast();
            }
        }
        used
    }

    /// Walk every block and report structural problems as a bitmask of
    /// `SANITY_*` bits. `0` means the pool is healthy. The walker itself
    /// never trusts a suspect size word far enough to loop or leave the
    /// pool.
    pub fn sanity_check(&self) -> u32 {
        let mut errors = 0;

        // Safety: reads stay bounded by the pool end even on a corrupted
        //         chain.
        unsafe {
            let end = self.pool_end();
            let total = self.hdr().size as usize;
            let mut prev: Option<NonNull<BlockHdr>> = None;
            let mut block = self.pool_top();
            while block.as_ptr().cast::<u8>() < end {
                let size = block.as_ref().block_size();

                if (size & ALIGN_MASK) != 0 {
                    errors |= SANITY_MISALIGNED_SIZE;
                }
                if total < size {
                    errors |= SANITY_OVERSIZED_BLOCK;
                }

                let next = block.as_ptr().cast::<u8>().wrapping_add(size);
                if next < block.as_ptr().cast::<u8>() || end < next {
                    errors |= SANITY_NEXT_OUT_OF_BOUNDS;
                }

                if let Some(prev) = prev {
                    if prev.as_ref().is_used() && !block.as_ref().is_prev_used() {
                        errors |= SANITY_PREV_USED_AS_FREE;
                    }
                    if !prev.as_ref().is_used() && block.as_ref().is_prev_used() {
                        errors |= SANITY_PREV_FREE_AS_USED;
                    }
                }

                if next <= block.as_ptr().cast::<u8>() {
                    // the chain does not advance; stop instead of spinning
                    errors |= SANITY_NEXT_OUT_OF_BOUNDS;
                    break;
                }
                prev = Some(block);
                block = NonNull::new_unchecked(next).cast();
            }
        }

        errors
    }

    /// Validate a pointer about to be deallocated. On any problem a message
    /// is stored in the last-error slot and `false` is returned without
    /// mutating the pool; on success the payload is painted `0xFF` and the
    /// slot is cleared.
    pub(crate) unsafe fn validate_deallocation(&mut self, ptr: NonNull<u8>) -> bool {
        let target = Self::block_of(ptr);
        let top = self.pool_top();
        let end = self.pool_end();

        if target.as_ptr().cast::<u8>() < top.as_ptr().cast::<u8>()
            || target.as_ptr().cast::<u8>() > end
        {
            self.hdr_mut().last_error = Some("deallocate: pointer outside the memory pool");
            return false;
        }

        // walk to the target's block boundary, stopping at the terminal
        // block
        let mut block = top;
        loop {
            if block == target {
                break;
            }
            let next = block.as_ptr().cast::<u8>().add(block.as_ref().block_size());
            if next >= end {
                break;
            }
            block = NonNull::new_unchecked(next).cast();
        }

        let error = if block == target {
            if !block.as_ref().is_used() {
                Some("deallocate: double free")
            } else if block.as_ptr().cast::<u8>().add(block.as_ref().block_size()) >= end {
                Some("deallocate: pointer addresses a permanent block")
            } else {
                None
            }
        } else if block < target {
            Some("deallocate: pointer addresses a permanent block")
        } else {
            Some("deallocate: pointer is not an allocated block")
        };

        if let Some(error) = error {
            self.hdr_mut().last_error = Some(error);
            return false;
        }

        paint_bytes(
            ptr.as_ptr(),
            target.as_ref().block_size() - HEADER_SIZE,
            0xff,
        );
        self.hdr_mut().last_error = None;
        true
    }

    /// Dump the pool header: addresses, sizes, and the bitmap/bucket table.
    pub fn dump_pool_header(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let hdr = self.hdr();
        writeln!(out, "== memory pool header ==")?;
        writeln!(
            out,
            " address: {:p}, blocks {:p}..{:p}",
            self.hdr,
            self.pool_top(),
            self.pool_end()
        )?;
        writeln!(
            out,
            " size: total {}, block pool {}",
            hdr.size,
            hdr.size as usize - core::mem::size_of::<crate::pool::PoolHdr<FLLEN, SLLEN>>()
        )?;
        writeln!(out, " fl/sl bitmaps and bucket heads")?;
        for fl in 0..FLLEN {
            write!(
                out,
                " [{:2}] {} : ",
                fl,
                (((hdr.fl_bitmap << fl) & 0x8000) != 0) as u8
            )?;
            for sl in 0..SLLEN {
                write!(out, "{}", (((hdr.sl_bitmap[fl] << sl) & 0x80) != 0) as u8)?;
                if sl % 4 == 3 {
                    write!(out, " ")?;
                }
            }
            for sl in 0..SLLEN {
                match hdr.first_free[fl][sl] {
                    Some(block) => write!(out, " {:p}", block)?,
                    None => write!(out, " -")?,
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Dump every block: address, size word, flags, and either a bounded
    /// payload sample (used blocks) or the bucket coordinates and list
    /// links (free blocks).
    pub fn dump_blocks(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        const SAMPLE_BYTES: usize = 32;

        writeln!(out, "== memory blocks ==")?;
        // Safety: the pool invariants hold between public operations.
        unsafe {
            let end = self.pool_end();
            let mut block = self.pool_top();
            while block.as_ptr().cast::<u8>() < end {
                let size = block.as_ref().block_size();
                write!(
                    out,
                    "{:p} size:{:6} ({:#07x}) used:{} prev:{}",
                    block,
                    size,
                    size,
                    block.as_ref().is_used() as u8,
                    block.as_ref().is_prev_used() as u8
                )?;

                if block.as_ref().is_used() {
                    let n = (size - HEADER_SIZE).min(SAMPLE_BYTES);
                    let payload = block.as_ptr().cast::<u8>().add(HEADER_SIZE);
                    for i in 0..n {
                        write!(out, " {:02x}", *payload.add(i))?;
                    }
                    for _ in n..SAMPLE_BYTES {
                        write!(out, "   ")?;
                    }
                    write!(out, "  ")?;
                    for i in 0..n {
                        let ch = *payload.add(i);
                        let ch = if (0x20..0x7f).contains(&ch) {
                            ch as char
                        } else {
                            '.'
                        };
                        write!(out, "{}", ch)?;
                    }
                } else {
                    let (fl, sl) = Self::map_index(size);
                    let free = block.cast::<crate::pool::FreeBlockHdr>();
                    write!(
                        out,
                        " fl:{} sl:{} next:{:?} prev:{:?}",
                        fl,
                        sl,
                        free.as_ref().next_free,
                        free.as_ref().prev_free
                    )?;
                }

                writeln!(out)?;
                block = NonNull::new_unchecked(block.as_ptr().cast::<u8>().add(size)).cast();
            }
        }
        Ok(())
    }
}

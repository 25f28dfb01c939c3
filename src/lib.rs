//! This crate implements the TLSF (Two-Level Segregated Fit) dynamic memory
//! allocation algorithm¹ over a single caller-provided memory pool.
//!
//!  - **Allocation and deallocation complete in constant time** (a bounded
//!    first-fit scan of one bucket list is the only exception, and only when
//!    the two-level index cannot satisfy the request exactly). TLSF is
//!    suitable for real-time applications.
//!
//!  - **The memory pool is provided by the application.** A `static` array,
//!    a region carved out of another allocator, or a reserved RAM range all
//!    work; the pool never grows and the allocator never calls into a host
//!    allocator.
//!
//!  - **Permanent allocations are kept out of the free-block universe.**
//!    [`Pool::allocate_permanent`] carves memory from the physical tail of
//!    the pool, so permanently-resident data never participates in
//!    coalescing and never influences fragmentation.
//!
//!  - **This crate supports `#![no_std]`.** It can be used in bare-metal and
//!    RTOS-based applications.
//!
//! <sub>¹ M. Masmano, I. Ripoll, A. Crespo and J. Real, "TLSF: a new dynamic
//! memory allocator for real-time systems," *Proceedings. 16th Euromicro
//! Conference on Real-Time Systems*, 2004. ECRTS 2004., Catania, Italy, 2004,
//! pp. 79-88, doi: 10.1109/EMRTS.2004.1311009.</sub>
//!
//! # Examples
//!
//! ```rust
//! use tlsf_pool::Pool;
//! use core::mem::MaybeUninit;
//!
//! let mut region = [MaybeUninit::<u8>::uninit(); 65536];
//! let mut pool: Pool = Pool::init(&mut region).unwrap();
//!
//! let ptr = pool.allocate(100).unwrap();
//! unsafe {
//!     assert!(pool.usable_size(ptr) >= 100);
//!     ptr.as_ptr().write_bytes(0xaa, 100);
//!     pool.deallocate(ptr);
//! }
//! ```
//!
//! # Details
//!
//! The pool header (size word, two-level bitmaps, bucket heads and, with the
//! `debug` feature, profiling state and the last-error slot) lives at the
//! start of the provided region. The rest of the region is carved into
//! blocks. Every block starts with a size word whose two low bits flag the
//! block's own state and the state of its physical predecessor; a used block
//! of [`ALIGNMENT`] bytes caps the physical tail so that every real block
//! has a successor whose flags can be updated without bounds tests.
//!
//! The allocator is single-threaded by design: no locking, no atomics, no
//! re-entrancy. Callers sharing one pool across threads or interrupt
//! contexts must provide external exclusion.
#![no_std]

#[cfg(test)]
extern crate std;

#[cfg(all(feature = "size-16bit", target_pointer_width = "64"))]
compile_error!("`size-16bit` is not compatible with 64-bit targets");

#[cfg(all(feature = "align-4", target_pointer_width = "64"))]
compile_error!(
    "`align-4` is not compatible with 64-bit targets \
     (free-list links must stay pointer-aligned)"
);

/// The block alignment, which is also the granularity of the size word.
///
/// 8 by default, 4 with the `align-4` feature.
pub const ALIGNMENT: usize = if cfg!(feature = "align-4") { 4 } else { 8 };

pub(crate) const ALIGN_MASK: usize = ALIGNMENT - 1;

/// The integer type block sizes are stored in.
///
/// `u32` by default, which supports the full 24-bit pool range; `u16` with
/// the `size-16bit` feature for pools up to 64 KiB − 1 on small targets.
#[cfg(feature = "size-16bit")]
pub type SizeWord = u16;
/// The integer type block sizes are stored in.
///
/// `u32` by default, which supports the full 24-bit pool range; `u16` with
/// the `size-16bit` feature for pools up to 64 KiB − 1 on small targets.
#[cfg(not(feature = "size-16bit"))]
pub type SizeWord = u32;

/// Bits of size precision discarded at the smallest size classes.
///
/// Tiny blocks do not need full mapping precision; ignoring the low bits
/// keeps the first-level rows meaningful.
pub const IGNORE_LSBS: u32 = if cfg!(target_pointer_width = "64") {
    5
} else if ALIGNMENT == 4 {
    4
} else {
    5
};

#[cfg(feature = "debug")]
mod debug;
mod pool;
mod utils;

#[cfg(feature = "debug")]
pub use self::debug::{
    Profile, Stat, SANITY_MISALIGNED_SIZE, SANITY_NEXT_OUT_OF_BOUNDS, SANITY_OVERSIZED_BLOCK,
    SANITY_PREV_FREE_AS_USED, SANITY_PREV_USED_AS_FREE,
};
pub use self::pool::{Pool, HEADER_SIZE, MIN_BLOCK_SIZE};

#[cfg(test)]
mod tests;

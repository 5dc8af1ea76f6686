//! Growable bump-pointer region.
//!
//! A region owns an ordered list of heap chunks and a cursor (`head`) into
//! the newest one. Allocation bumps the cursor; exhaustion adds a chunk of
//! `max(2 * top_size, request + REGION_ALIGN)` bytes. Chunks never move, so
//! memory handed out stays valid until the region is popped past it,
//! released, or dropped. The last two need `&mut self`, which lets the borrow
//! checker prove that no allocation outlives a bulk release.

use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::fmt;
use std::iter;
use std::mem;
use std::ptr::NonNull;
use std::slice;
use std::str;

use tracing::trace;

use crate::error::RegionError;

/// Every allocation starts on this boundary.
pub const REGION_ALIGN: usize = 16;

/// Position inside a region that a later [`Region::pop`] can roll back to.
///
/// Obtain one with [`Region::mark`] before allocating, or with
/// [`Region::mark_of`] from an address the region returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mark {
    chunk: u64,
    offset: usize,
}

impl Mark {
    /// Identifier of the chunk the mark points into.
    pub fn chunk(&self) -> u64 {
        self.chunk
    }

    /// Byte offset of the mark inside its chunk.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

struct Chunk {
    id: u64,
    base: NonNull<u8>,
    capacity: usize,
    // Committed bytes, only meaningful once the chunk is no longer on top.
    used: usize,
}

// SAFETY: a chunk exclusively owns its heap block; nothing about it is tied
// to the creating thread.
unsafe impl Send for Chunk {}

impl Chunk {
    fn alloc(id: u64, size: usize) -> Chunk {
        let capacity = align_up(size.max(REGION_ALIGN));
        let layout = chunk_layout(capacity);
        // SAFETY: the layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let Some(base) = NonNull::new(ptr) else {
            alloc::handle_alloc_error(layout);
        };
        Chunk {
            id,
            base,
            capacity,
            used: 0,
        }
    }

    fn at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.capacity);
        // SAFETY: offset is within (or one past) the block.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    // Offset of `addr` if it lies inside the block, or one past its end.
    fn offset_of(&self, addr: usize, inclusive_end: bool) -> Option<usize> {
        let start = self.base.as_ptr() as usize;
        let offset = addr.checked_sub(start)?;
        (offset < self.capacity || (inclusive_end && offset == self.capacity)).then_some(offset)
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: base was allocated in `Chunk::alloc` with this exact layout.
        unsafe { alloc::dealloc(self.base.as_ptr(), chunk_layout(self.capacity)) }
    }
}

fn chunk_layout(capacity: usize) -> Layout {
    match Layout::from_size_align(capacity, REGION_ALIGN) {
        Ok(layout) => layout,
        Err(_) => panic!("region chunk of {capacity} bytes exceeds the address space"),
    }
}

fn align_up(n: usize) -> usize {
    match n.checked_add(REGION_ALIGN - 1) {
        Some(n) => n & !(REGION_ALIGN - 1),
        None => panic!("region allocation of {n} bytes overflows"),
    }
}

struct RegionInner {
    // Oldest first, ids strictly increasing.
    older: Vec<Chunk>,
    top: Chunk,
    head: usize,
    next_id: u64,
    formatting: bool,
}

impl RegionInner {
    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn free_size(&self) -> usize {
        self.top.capacity - self.head
    }

    fn grow(&mut self, size: usize) {
        let new_size = self
            .top
            .capacity
            .saturating_mul(2)
            .max(size.saturating_add(REGION_ALIGN));
        // An untouched top chunk is freed and its id handed to the
        // replacement, so marks taken on it still resolve.
        let id = if self.head == 0 {
            self.top.id
        } else {
            self.fresh_id()
        };
        let mut old = mem::replace(&mut self.top, Chunk::alloc(id, new_size));
        if self.head > 0 {
            old.used = self.head;
            self.older.push(old);
        }
        self.head = 0;
        trace!(chunk_size = new_size, chunks = self.older.len() + 1, "region grew");
    }

    fn bump(&mut self, size: usize) -> NonNull<u8> {
        assert!(
            !self.formatting,
            "region allocated from while a formatted allocation was in progress"
        );
        if size > self.free_size() {
            self.grow(size);
        }
        let ptr = self.top.at(self.head);
        self.head = align_up(self.head + size);
        ptr
    }
}

/// Bump-pointer arena over a growable list of chunks.
///
/// Allocation only needs `&self`; every allocation stays valid until
/// [`pop`](Region::pop), [`release`](Region::release) or drop, all of which
/// need the region exclusively. Destructors of values placed in the region
/// never run.
pub struct Region {
    inner: RefCell<RegionInner>,
}

impl Region {
    /// Create a region whose first chunk holds `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Region {
            inner: RefCell::new(RegionInner {
                older: Vec::new(),
                top: Chunk::alloc(0, capacity),
                head: 0,
                next_id: 1,
                formatting: false,
            }),
        }
    }

    /// Allocate `size` bytes on a [`REGION_ALIGN`] boundary.
    ///
    /// The bytes are initialized but their contents are unspecified: memory
    /// reused after a pop or release keeps whatever was written before.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc(&self, size: usize) -> &mut [u8] {
        let ptr = self.inner.borrow_mut().bump(size);
        // SAFETY: `bump` returned `size` initialized bytes that no earlier
        // allocation covers; they stay valid until pop/release/drop, which
        // all require `&mut self`.
        unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), size) }
    }

    /// Return the free tail of the top chunk, growing so that it holds at
    /// least `size` bytes, without committing anything.
    ///
    /// The next [`alloc`](Region::alloc) starts at the first byte of the
    /// returned slice, so data written here survives a following `alloc`
    /// that fits.
    pub fn tmp_alloc(&mut self, size: usize) -> &mut [u8] {
        let inner = self.inner.get_mut();
        if size > inner.free_size() {
            inner.grow(size);
        }
        let free = inner.free_size();
        // SAFETY: the tail above `head` is not covered by any allocation and
        // `&mut self` keeps anyone from allocating into it meanwhile.
        unsafe { slice::from_raw_parts_mut(inner.top.at(inner.head).as_ptr(), free) }
    }

    /// Move `value` into the region.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_value<T>(&self, value: T) -> &mut T {
        let ptr = self.bump_array::<T>(1);
        // SAFETY: `bump_array` returned aligned room for one `T`.
        unsafe {
            ptr.as_ptr().write(value);
            &mut *ptr.as_ptr()
        }
    }

    /// Allocate `len` copies of `value`.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_fill<T: Copy>(&self, len: usize, value: T) -> &mut [T] {
        let ptr = self.bump_array::<T>(len);
        // SAFETY: room for `len` aligned `T`s; every element is written
        // before the slice is formed.
        unsafe {
            for i in 0..len {
                ptr.as_ptr().add(i).write(value);
            }
            slice::from_raw_parts_mut(ptr.as_ptr(), len)
        }
    }

    /// Copy `src` into the region.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> &mut [T] {
        let ptr = self.bump_array::<T>(src.len());
        // SAFETY: room for `src.len()` aligned `T`s that cannot overlap `src`.
        unsafe {
            ptr.as_ptr()
                .copy_from_nonoverlapping(src.as_ptr(), src.len());
            slice::from_raw_parts_mut(ptr.as_ptr(), src.len())
        }
    }

    /// Collect an exact-size iterator into the region.
    ///
    /// If the iterator yields fewer items than it promised, the slice is cut
    /// to the items actually produced.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_from_iter<T, I>(&self, items: I) -> &mut [T]
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        let len = items.len();
        let ptr = self.bump_array::<T>(len);
        let mut written = 0;
        for item in items.take(len) {
            // SAFETY: written < len, inside the reserved block.
            unsafe { ptr.as_ptr().add(written).write(item) };
            written += 1;
        }
        // SAFETY: the first `written` elements are initialized.
        unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), written) }
    }

    /// Format into the region and return the text.
    ///
    /// The text is written directly into the free tail; if it does not fit the
    /// region grows and formatting is retried. Exactly `len + 1` bytes are
    /// committed, the last one a NUL terminator. `Display` impls used by
    /// `args` must not allocate from this region.
    pub fn alloc_fmt(&self, args: fmt::Arguments<'_>) -> &str {
        loop {
            let (ptr, free) = {
                let mut inner = self.inner.borrow_mut();
                inner.formatting = true;
                (inner.top.at(inner.head), inner.free_size())
            };
            // SAFETY: the free tail is not covered by any allocation and the
            // `formatting` flag stops allocations into it until it is reset.
            let tail = unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), free) };
            let mut attempt = TailWriter { buf: tail, needed: 0 };
            // `TailWriter` never fails; it only counts what does not fit.
            let _ = fmt::write(&mut attempt, args);
            let needed = attempt.needed;

            let mut inner = self.inner.borrow_mut();
            inner.formatting = false;
            if needed < free {
                let ptr = inner.bump(needed + 1);
                drop(inner);
                // SAFETY: `bump` committed `needed + 1` bytes starting at the
                // tail written above; `needed` of them were written from `&str`
                // pieces and form valid UTF-8.
                unsafe {
                    ptr.as_ptr().add(needed).write(0);
                    let bytes = slice::from_raw_parts(ptr.as_ptr(), needed);
                    return str::from_utf8_unchecked(bytes);
                }
            }
            inner.grow(needed + 1);
        }
    }

    /// The mark the next allocation will start at.
    pub fn mark(&self) -> Mark {
        let inner = self.inner.borrow();
        Mark {
            chunk: inner.top.id,
            offset: inner.head,
        }
    }

    /// Map an address previously returned by this region to its mark.
    pub fn mark_of(&self, ptr: *const u8) -> Result<Mark, RegionError> {
        let inner = self.inner.borrow();
        let addr = ptr as usize;
        let chunks = || {
            inner
                .older
                .iter()
                .map(|c| (c, c.used))
                .chain(iter::once((&inner.top, inner.head)))
        };
        // Only a zero-sized allocation at the very end of a full chunk sits
        // one past its block, so try strict containment first.
        let found = chunks()
            .find_map(|(c, used)| c.offset_of(addr, false).map(|o| (c, used, o)))
            .or_else(|| {
                chunks().find_map(|(c, used)| c.offset_of(addr, true).map(|o| (c, used, o)))
            });
        match found {
            Some((chunk, used, offset)) if offset <= used => Ok(Mark {
                chunk: chunk.id,
                offset,
            }),
            Some((_, used, offset)) => Err(RegionError::BeyondHead { offset, head: used }),
            None => Err(RegionError::ForeignPointer),
        }
    }

    /// Roll back every allocation made at or after `mark`.
    ///
    /// Marks must be popped newest first. If `mark` lies in the top chunk
    /// the head simply rewinds and the next allocation reuses the address.
    /// If it lies in the chunk just below the top, the top chunk is rewound
    /// and kept. Otherwise every newer chunk is freed and replaced by one
    /// chunk sized to the freed capacity plus the unused remainder of the
    /// target chunk; a target chunk popped back to its start is folded in
    /// entirely.
    pub fn pop(&mut self, mark: Mark) -> Result<(), RegionError> {
        if mark.offset % REGION_ALIGN != 0 {
            return Err(RegionError::Misaligned {
                offset: mark.offset,
                align: REGION_ALIGN,
            });
        }
        let inner = self.inner.get_mut();
        if mark.chunk == inner.top.id {
            if mark.offset > inner.head {
                return Err(RegionError::BeyondHead {
                    offset: mark.offset,
                    head: inner.head,
                });
            }
            inner.head = mark.offset;
            return Ok(());
        }

        let idx = inner
            .older
            .binary_search_by_key(&mark.chunk, |c| c.id)
            .map_err(|_| RegionError::UnknownChunk { chunk: mark.chunk })?;
        let target = &inner.older[idx];
        if mark.offset > target.used {
            return Err(RegionError::BeyondHead {
                offset: mark.offset,
                head: target.used,
            });
        }

        // Only the top chunk is newer: rewind it under a fresh id instead of
        // trading it for a new chunk on every pop to the same mark.
        if idx + 1 == inner.older.len() && mark.offset > 0 {
            inner.older[idx].used = mark.offset;
            inner.top.id = inner.fresh_id();
            inner.head = 0;
            return Ok(());
        }

        let mut reclaimed = inner.top.capacity
            + inner.older[idx + 1..]
                .iter()
                .map(|c| c.capacity)
                .sum::<usize>();
        reclaimed += target.capacity - mark.offset;
        inner.older.truncate(idx + 1);
        if mark.offset == 0 {
            inner.older.pop();
        } else {
            inner.older[idx].used = mark.offset;
        }
        let id = inner.fresh_id();
        inner.top = Chunk::alloc(id, reclaimed);
        inner.head = 0;
        trace!(
            chunk_size = reclaimed,
            chunks = inner.older.len() + 1,
            "region popped across chunks"
        );
        Ok(())
    }

    /// Roll back to an address previously returned by [`alloc`](Region::alloc).
    pub fn pop_to(&mut self, ptr: *const u8) -> Result<(), RegionError> {
        let mark = self.mark_of(ptr)?;
        self.pop(mark)
    }

    /// Forget every allocation while keeping the backing memory.
    ///
    /// A region with several chunks coalesces their total capacity into one
    /// fresh chunk; a single chunk is simply rewound.
    pub fn release(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.older.is_empty() {
            let total = inner.top.capacity
                + inner.older.iter().map(|c| c.capacity).sum::<usize>();
            inner.older.clear();
            let id = inner.fresh_id();
            inner.top = Chunk::alloc(id, total);
            trace!(chunk_size = total, "region coalesced on release");
        }
        inner.head = 0;
    }

    /// Number of chunks currently owned.
    pub fn chunk_count(&self) -> usize {
        self.inner.borrow().older.len() + 1
    }

    /// Capacity of the newest chunk in bytes.
    pub fn top_chunk_size(&self) -> usize {
        self.inner.borrow().top.capacity
    }

    /// Bytes left in the newest chunk before the region has to grow.
    pub fn free_size(&self) -> usize {
        self.inner.borrow().free_size()
    }

    fn bump_array<T>(&self, len: usize) -> NonNull<T> {
        assert!(
            mem::align_of::<T>() <= REGION_ALIGN,
            "region cannot align {} to {} bytes",
            std::any::type_name::<T>(),
            mem::align_of::<T>()
        );
        let Some(size) = mem::size_of::<T>().checked_mul(len) else {
            panic!("region allocation of {len} elements overflows");
        };
        self.inner.borrow_mut().bump(size).cast()
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Region")
            .field("chunks", &(inner.older.len() + 1))
            .field("top_chunk_size", &inner.top.capacity)
            .field("head", &inner.head)
            .finish()
    }
}

struct TailWriter<'a> {
    buf: &'a mut [u8],
    needed: usize,
}

impl fmt::Write for TailWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let start = self.needed;
        self.needed += s.len();
        if self.needed <= self.buf.len() {
            self.buf[start..self.needed].copy_from_slice(s.as_bytes());
        }
        Ok(())
    }
}

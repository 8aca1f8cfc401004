//! Temporary field allocation.
//!
//! A [`TmpArena`] reserves scratch storage on the device through a raw
//! [`DeviceAlloc`] capability and hands out [`TmpField`]s addressable through
//! the same cursor/stride convention as real fields. Requests batch into
//! larger chunks; chunks are retained across [`TmpArena::reset`] and
//! recycled, so a stage evaluated repeatedly over same-sized domains stops
//! allocating after the first round.

use crate::cursor::{Cursor, Strides};
use crate::domain::Domain;
use crate::error::{BackendError, Result};
use crate::field::{contiguous_strides, GridField};
use parking_lot::Mutex;
use std::marker::PhantomData;

/// Granularity of the arena's underlying device reservations.
const ARENA_CHUNK_BYTES: usize = 1 << 20;

/// Sub-allocation alignment, sufficient for every `Pod` cell type in use.
const TMP_ALIGN: usize = 16;

/// Raw accelerator allocation capability: reserve N bytes of device storage.
///
/// The returned block must stay pinned for the lifetime of the consumer that
/// reserved it; the arena keeps every block it receives until it is dropped.
pub trait DeviceAlloc: Send {
    /// Reserve `bytes` of zero-initialized storage
    fn reserve(&mut self, bytes: usize) -> Result<Box<[u8]>>;
}

/// Default allocation capability backed by the host heap.
///
/// Stands in for the device driver's raw byte allocator; the simulated
/// accelerator's memory is ordinary process memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAlloc;

impl DeviceAlloc for HeapAlloc {
    fn reserve(&mut self, bytes: usize) -> Result<Box<[u8]>> {
        Ok(vec![0u8; bytes].into_boxed_slice())
    }
}

/// One retained device reservation.
///
/// `base` is captured once when the chunk is created; all sub-allocation
/// pointers derive from it so handing them out never re-borrows `storage`.
struct Chunk {
    #[allow(dead_code)]
    storage: Box<[u8]>,
    base: *mut u8,
    len: usize,
}

struct ArenaInner<A: DeviceAlloc> {
    alloc: A,
    chunks: Vec<Chunk>,
    /// Chunk currently being bump-allocated
    active: usize,
    /// Bump offset within the active chunk
    offset: usize,
}

// Safety: the raw chunk bases are owned by the boxed storage held alongside
// them; moving the arena between threads moves ownership of both together.
unsafe impl<A: DeviceAlloc> Send for ArenaInner<A> {}

impl<A: DeviceAlloc> ArenaInner<A> {
    fn reserve(&mut self, bytes: usize) -> Result<*mut u8> {
        loop {
            if self.active < self.chunks.len() {
                let chunk = &self.chunks[self.active];
                let aligned = self.offset.next_multiple_of(TMP_ALIGN);
                if aligned + bytes <= chunk.len {
                    self.offset = aligned + bytes;
                    // Derived from the captured base, not from the box.
                    return Ok(unsafe { chunk.base.add(aligned) });
                }
                self.active += 1;
                self.offset = 0;
                continue;
            }

            // Over-reserve so the usable base can be aligned absolutely;
            // byte reservations carry no alignment guarantee of their own.
            let chunk_bytes = bytes.max(ARENA_CHUNK_BYTES);
            let mut storage = self.alloc.reserve(chunk_bytes + TMP_ALIGN)?;
            let raw = storage.as_mut_ptr();
            let base = unsafe { raw.add(raw.align_offset(TMP_ALIGN)) };
            self.chunks.push(Chunk {
                storage,
                base,
                len: chunk_bytes,
            });
        }
    }
}

/// Scratch allocator for temporary fields, scoped to one execution context.
///
/// Reusable across any number of temporary-field requests; distinct fields
/// never alias. Batching into chunks is an optimization only — every field
/// is independently addressable. The arena must outlive its fields (enforced
/// by borrow) and may only be reset or dropped once the launches using its
/// fields have returned, which the backend's completion barrier guarantees.
pub struct TmpArena<A: DeviceAlloc = HeapAlloc> {
    inner: Mutex<ArenaInner<A>>,
}

impl TmpArena<HeapAlloc> {
    /// Create an arena over the host-heap capability
    pub fn new() -> Self {
        Self::with_capability(HeapAlloc)
    }
}

impl Default for TmpArena<HeapAlloc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: DeviceAlloc> TmpArena<A> {
    /// Create an arena over a caller-supplied allocation capability
    pub fn with_capability(alloc: A) -> Self {
        Self {
            inner: Mutex::new(ArenaInner {
                alloc,
                chunks: Vec::new(),
                active: 0,
                offset: 0,
            }),
        }
    }

    /// Reserve a temporary field over `domain`.
    ///
    /// The field uses the same cell-to-offset convention as [`DeviceField`]:
    /// contiguous storage, the domain's last dimension varying fastest.
    /// Fresh chunks are zero-filled; storage recycled after [`TmpArena::reset`]
    /// retains whatever the previous scope wrote.
    ///
    /// [`DeviceField`]: crate::field::DeviceField
    pub fn allocate<T: bytemuck::Pod>(&self, domain: &Domain) -> Result<TmpField<'_, T>> {
        let elem_size = std::mem::size_of::<T>();
        let bytes = usize::try_from(domain.cells())
            .ok()
            .and_then(|cells| cells.checked_mul(elem_size))
            .ok_or_else(|| BackendError::allocation_failed(usize::MAX, format!("byte size overflow for {domain}")))?;

        let ptr = self.inner.lock().reserve(bytes)?;
        Ok(TmpField {
            ptr,
            len: bytes / elem_size.max(1),
            strides: contiguous_strides(domain, elem_size),
            domain: domain.clone(),
            _scope: PhantomData,
        })
    }

    /// Recycle all outstanding reservations, retaining the chunks.
    ///
    /// Takes `&mut self`, so it cannot run while any [`TmpField`] borrowed
    /// from this arena is still alive.
    pub fn reset(&mut self) {
        let inner = self.inner.get_mut();
        inner.active = 0;
        inner.offset = 0;
    }

    /// Total bytes currently reserved from the device
    pub fn reserved_bytes(&self) -> usize {
        self.inner.lock().chunks.iter().map(|chunk| chunk.len).sum()
    }

    /// Number of device reservations backing the arena
    pub fn chunk_count(&self) -> usize {
        self.inner.lock().chunks.len()
    }
}

/// Accelerator-resident scratch field borrowed from a [`TmpArena`].
///
/// Addressable through the same [`Cursor`]/[`Strides`] abstraction as real
/// grid fields; joins composites via [`GridField`]. Released when its scope
/// ends; the arena reclaims the storage on [`TmpArena::reset`].
pub struct TmpField<'arena, T: bytemuck::Pod> {
    ptr: *mut u8,
    len: usize,
    strides: Strides,
    domain: Domain,
    _scope: PhantomData<(&'arena (), fn() -> T)>,
}

impl<T: bytemuck::Pod> TmpField<'_, T> {
    /// The field's domain
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the field covers no cells
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Host view of the cells in storage order.
    ///
    /// Only sound once the launches writing through this field's cursors
    /// have completed, which holds whenever the caller can reach this method:
    /// launches return only after every lane finishes.
    pub fn as_slice(&self) -> &[T] {
        // The region [ptr, ptr + len * size_of::<T>()) is exclusively ours:
        // the arena never hands it to another field before reset().
        unsafe { std::slice::from_raw_parts(self.ptr.cast::<T>(), self.len) }
    }

    /// Host-side copy of the cells
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }
}

impl<T: bytemuck::Pod> GridField for TmpField<'_, T> {
    fn origin(&mut self) -> Cursor {
        Cursor::new(self.ptr)
    }

    fn strides(&self) -> &Strides {
        &self.strides
    }
}

// ================================================================================================
// Tests
// ================================================================================================

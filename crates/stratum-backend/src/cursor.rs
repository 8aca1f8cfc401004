//! Strided cursors: layout-independent movement through field storage.
//!
//! A [`Cursor`] pairs an opaque device address with nothing else; all
//! movement goes through signed byte offsets derived from the owning field's
//! [`Strides`]. A [`CompositePtr`] carries one cursor per field of a memory
//! composite and advances them in lockstep, so an executable unit can shift
//! "the current cell" without knowing any field's concrete layout.
//!
//! # Safety contract
//!
//! Cursors produced by the backend always point inside the image of the
//! iteration domain: masked lanes never dereference, and clipped lane sizes
//! keep every generated cell index below the domain extents. Dereferencing
//! is nonetheless `unsafe` because executable units may shift cursors
//! themselves (neighbor access) and because lanes run concurrently: callers
//! must guarantee that shifts they apply stay inside the underlying field
//! allocation and that no cell is written by more than one lane within an
//! invocation.

use crate::domain::Dim;

/// Per-dimension signed byte strides of one field.
///
/// A dimension absent from the map contributes stride 0: shifting along it
/// is a no-op, which is how fields of lower rank join a higher-rank
/// composite.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Strides {
    entries: Vec<(Dim, isize)>,
}

impl Strides {
    /// Create an empty stride map
    pub fn new() -> Self {
        Self::default()
    }

    /// Append or replace one dimension's byte stride
    pub fn with(mut self, dim: Dim, stride: isize) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|(d, _)| *d == dim) {
            entry.1 = stride;
        } else {
            self.entries.push((dim, stride));
        }
        self
    }

    /// Byte stride along `dim`, 0 when the field does not extend along it
    pub fn get(&self, dim: Dim) -> isize {
        self.entries
            .iter()
            .find(|(d, _)| *d == dim)
            .map(|(_, s)| *s)
            .unwrap_or(0)
    }

    /// The ordered (dimension, stride) pairs
    pub fn entries(&self) -> &[(Dim, isize)] {
        &self.entries
    }
}

/// Opaque device address inside one field's storage.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    ptr: *mut u8,
}

impl Cursor {
    /// Wrap a raw device address
    pub(crate) fn new(ptr: *mut u8) -> Self {
        Self { ptr }
    }

    /// Advance by a signed byte offset in place
    pub fn shift(&mut self, bytes: isize) {
        self.ptr = self.ptr.wrapping_offset(bytes);
    }

    /// A new cursor advanced by a signed byte offset
    pub fn offset(self, bytes: isize) -> Cursor {
        Cursor {
            ptr: self.ptr.wrapping_offset(bytes),
        }
    }

    /// Read the cell under the cursor.
    ///
    /// # Safety
    ///
    /// The cursor must point at a live, properly aligned `T` inside the
    /// field allocation it was derived from, and no lane may be writing the
    /// same cell concurrently.
    pub unsafe fn read<T: bytemuck::Pod>(self) -> T {
        std::ptr::read(self.ptr.cast::<T>())
    }

    /// Write the cell under the cursor.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Cursor::read`], and within one invocation this
    /// cell must be written by at most one lane.
    pub unsafe fn write<T: bytemuck::Pod>(self, value: T) {
        std::ptr::write(self.ptr.cast::<T>(), value);
    }
}

/// Advance `cursor` by a multi-index through `strides`.
///
/// The shift is independent of the field's concrete layout: each offset is
/// scaled by that dimension's stride, and dimensions the field does not
/// extend along are skipped.
pub fn multi_shift(cursor: &mut Cursor, strides: &Strides, offsets: &[(Dim, i64)]) {
    for &(dim, offset) in offsets {
        cursor.shift(strides.get(dim) * offset as isize);
    }
}

/// Cursors for every field of a memory composite, advanced in lockstep.
///
/// Cloned once per lane at launch; each lane shifts its own clone to its
/// starting multi-index and walks its cells from there.
#[derive(Debug, Clone)]
pub struct CompositePtr {
    cursors: Vec<Cursor>,
}

// Safety: lanes share the composite origin across worker threads. The raw
// addresses inside are only dereferenced through the unsafe cursor accessors,
// whose contract (single writer per cell, shifts stay inside the field
// allocation) is what makes the sharing sound.
unsafe impl Send for CompositePtr {}
unsafe impl Sync for CompositePtr {}

impl CompositePtr {
    pub(crate) fn new(cursors: Vec<Cursor>) -> Self {
        Self { cursors }
    }

    /// Cursor of the field at `index`, in composite insertion order
    pub fn field(&self, index: usize) -> Cursor {
        self.cursors[index]
    }

    /// Number of fields in the composite
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// True when the composite holds no fields
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Shift every field's cursor by `offset` cells along `dim`
    pub fn shift(&mut self, strides: &CompositeStrides, dim: Dim, offset: i64) {
        for (cursor, field_strides) in self.cursors.iter_mut().zip(strides.fields()) {
            cursor.shift(field_strides.get(dim) * offset as isize);
        }
    }

    /// Shift every field's cursor by a multi-index
    pub fn multi_shift(&mut self, strides: &CompositeStrides, offsets: &[(Dim, i64)]) {
        for &(dim, offset) in offsets {
            self.shift(strides, dim, offset);
        }
    }
}

/// Stride maps for every field of a memory composite, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CompositeStrides {
    fields: Vec<Strides>,
}

impl CompositeStrides {
    pub(crate) fn push(&mut self, strides: Strides) {
        self.fields.push(strides);
    }

    /// Stride map of the field at `index`
    pub fn field(&self, index: usize) -> &Strides {
        &self.fields[index]
    }

    /// All stride maps in composite insertion order
    pub fn fields(&self) -> &[Strides] {
        &self.fields
    }
}

// ================================================================================================
// Tests
// ================================================================================================

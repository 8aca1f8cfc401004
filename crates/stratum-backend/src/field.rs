//! Fields and memory composites.
//!
//! A field is anything reducible to an origin [`Cursor`] plus per-dimension
//! [`Strides`]; the [`GridField`] trait is that reduction, implemented both
//! by [`DeviceField`] (caller-owned storage) and by temporary fields from the
//! scratch arena. A [`Composite`] borrows every field one invocation reads
//! or writes and hands the backend their cursors and strides as a unit.

use crate::cursor::{CompositePtr, CompositeStrides, Cursor, Strides};
use crate::domain::{Dim, Domain};
use crate::error::{BackendError, Result};
use std::marker::PhantomData;

/// Reduction of a field to its origin cursor and stride map.
///
/// `origin` takes `&mut self`: handing out the cursor is what lets a launch
/// write through it, so the borrow keeps the field exclusively lent to one
/// composite for the invocation's duration.
pub trait GridField {
    /// Cursor at the field's first cell
    fn origin(&mut self) -> Cursor;

    /// Per-dimension byte strides
    fn strides(&self) -> &Strides;
}

/// Contiguous byte strides over `domain`, innermost (last) dimension fastest.
pub(crate) fn contiguous_strides(domain: &Domain, elem_size: usize) -> Strides {
    let mut strides = Strides::new();
    let mut step = elem_size as isize;
    for &(dim, extent) in domain.entries().iter().rev() {
        strides = strides.with(dim, step);
        step *= extent as isize;
    }
    strides
}

/// Device-resident field storage over a domain.
///
/// Cells are stored contiguously with the domain's last dimension varying
/// fastest, the convention shared by the whole system. The backend never
/// owns field storage — a launch only borrows cursors through a
/// [`Composite`].
#[derive(Debug, Clone)]
pub struct DeviceField<T: bytemuck::Pod> {
    data: Vec<T>,
    domain: Domain,
    strides: Strides,
}

impl<T: bytemuck::Pod> DeviceField<T> {
    /// Allocate a zero-filled field over `domain`
    pub fn zeroed(domain: &Domain) -> Self {
        let cells = domain.cells() as usize;
        Self {
            data: vec![T::zeroed(); cells],
            domain: domain.clone(),
            strides: contiguous_strides(domain, std::mem::size_of::<T>()),
        }
    }

    /// Allocate a field over `domain` initialized from a host slice.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::FieldSizeMismatch`] when the slice length does
    /// not equal the domain's cell count.
    pub fn from_slice(domain: &Domain, values: &[T]) -> Result<Self> {
        let cells = domain.cells();
        if values.len() as u64 != cells {
            return Err(BackendError::FieldSizeMismatch {
                expected: cells,
                actual: values.len() as u64,
            });
        }
        Ok(Self {
            data: values.to_vec(),
            domain: domain.clone(),
            strides: contiguous_strides(domain, std::mem::size_of::<T>()),
        })
    }

    /// The field's domain
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Host view of the cells in storage order
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Copy all cells from a host slice into the field
    pub fn copy_from_host(&mut self, values: &[T]) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(BackendError::FieldSizeMismatch {
                expected: self.data.len() as u64,
                actual: values.len() as u64,
            });
        }
        self.data.copy_from_slice(values);
        Ok(())
    }

    /// Copy all cells into a host slice
    pub fn copy_to_host(&self, out: &mut [T]) -> Result<()> {
        if out.len() != self.data.len() {
            return Err(BackendError::FieldSizeMismatch {
                expected: self.data.len() as u64,
                actual: out.len() as u64,
            });
        }
        out.copy_from_slice(&self.data);
        Ok(())
    }

    fn linear_index(&self, index: &[(Dim, u64)]) -> usize {
        let elem_size = std::mem::size_of::<T>() as isize;
        let mut byte = 0isize;
        for &(dim, offset) in index {
            byte += self.strides.get(dim) * offset as isize;
        }
        debug_assert_eq!(byte % elem_size, 0);
        (byte / elem_size) as usize
    }

    /// Host-side read of one cell by multi-index
    pub fn get(&self, index: &[(Dim, u64)]) -> T {
        self.data[self.linear_index(index)]
    }

    /// Host-side write of one cell by multi-index
    pub fn set(&mut self, index: &[(Dim, u64)], value: T) {
        let linear = self.linear_index(index);
        self.data[linear] = value;
    }
}

impl<T: bytemuck::Pod> GridField for DeviceField<T> {
    fn origin(&mut self) -> Cursor {
        Cursor::new(self.data.as_mut_ptr().cast())
    }

    fn strides(&self) -> &Strides {
        &self.strides
    }
}

/// The memory composite for one launch.
///
/// Fields join in the order the executable unit addresses them; the unit
/// refers to them by that index through [`CompositePtr::field`]. The
/// composite mutably borrows each field, so the storage cannot be touched
/// elsewhere while a launch may write through its cursors.
#[derive(Default)]
pub struct Composite<'a> {
    cursors: Vec<Cursor>,
    strides: CompositeStrides,
    _fields: PhantomData<&'a mut ()>,
}

impl<'a> Composite<'a> {
    /// Create an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to the composite
    pub fn with<F: GridField + ?Sized>(mut self, field: &'a mut F) -> Self {
        let strides = field.strides().clone();
        self.cursors.push(field.origin());
        self.strides.push(strides);
        self
    }

    /// Shift every field's origin by `offset` cells along `dim`.
    ///
    /// This is how a launch iterates an interior sub-box of larger fields:
    /// shift the origin past the halo, then run over the interior domain.
    pub fn shifted(mut self, dim: Dim, offset: i64) -> Self {
        for (cursor, strides) in self.cursors.iter_mut().zip(self.strides.fields()) {
            cursor.shift(strides.get(dim) * offset as isize);
        }
        self
    }

    /// Number of fields in the composite
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// True when the composite holds no fields
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// The composite origin: one cursor per field, at each field's first cell
    pub fn origin(&self) -> CompositePtr {
        CompositePtr::new(self.cursors.clone())
    }

    /// The per-field stride maps
    pub fn strides(&self) -> &CompositeStrides {
        &self.strides
    }
}

// ================================================================================================
// Tests
// ================================================================================================

//! Lane-grid execution backend for stencil and column computations
//!
//! This crate executes numerical update rules over multi-dimensional
//! structured grids on a massively parallel lane device. A caller supplies
//! an iteration [`Domain`], an executable unit ([`StencilStage`] or
//! [`ColumnStage`]), and a [`Composite`] of strided fields; the backend
//! decomposes the domain into a compute grid of lane groups, clips each
//! lane's sub-range at the domain edges, advances strided cursors to each
//! lane's first cell, and drives the unit.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      GridBackend                         │
//! │        apply_stencil_stage / apply_column_stage          │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!          ┌────────────┼──────────────┬──────────────┐
//!          ▼            ▼              ▼              ▼
//!    ┌──────────┐ ┌───────────┐ ┌────────────┐ ┌──────────┐
//!    │Partition │ │  Bounds   │ │ Dispatcher │ │ TmpArena │
//!    │ (spans)  │ │  checker  │ │ (cell/col) │ │ (scratch)│
//!    └──────────┘ └───────────┘ └─────┬──────┘ └──────────┘
//!                                     │
//!                                     ▼
//!                          ┌────────────────────┐
//!                          │ Cursors + Strides  │
//!                          │ (Memory Composite) │
//!                          └────────────────────┘
//! ```
//!
//! Two execution disciplines share the same entry protocol (shift the
//! composite to the lane's starting multi-index, bounds-check, dispatch):
//! the **stencil** discipline evaluates the unit once per cell, stateless;
//! the **column** discipline walks the vertical dimension strictly
//! sequentially per column, threading a caller-supplied seed through every
//! level.
//!
//! # Usage
//!
//! ```rust
//! use stratum_backend::{
//!     Composite, CompositePtr, CompositeStrides, DeviceField, Domain, GridBackend, GroupShape, I, J,
//! };
//!
//! # fn main() -> stratum_backend::Result<()> {
//! let backend = GridBackend::new(GroupShape::square(8, 8));
//! let domain = Domain::new().with(I, 32).with(J, 32);
//!
//! let mut inp = DeviceField::<f64>::from_slice(&domain, &vec![1.5; 32 * 32])?;
//! let mut out = DeviceField::<f64>::zeroed(&domain);
//! let composite = Composite::new().with(&mut inp).with(&mut out);
//!
//! // out = 2 * inp, one evaluation per cell
//! let stage = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
//!     ptr.field(1).write(2.0 * ptr.field(0).read::<f64>());
//! };
//! backend.apply_stencil_stage(&domain, &stage, &composite)?;
//!
//! drop(composite);
//! assert!(out.as_slice().iter().all(|&v| v == 3.0));
//! # Ok(())
//! # }
//! ```

pub mod alloc;
pub mod backend;
pub mod cursor;
mod dispatch;
pub mod domain;
pub mod error;
pub mod field;
pub mod partition;
pub mod shape;
pub mod stage;

// Re-export public API
pub use alloc::{DeviceAlloc, HeapAlloc, TmpArena, TmpField};
pub use backend::GridBackend;
pub use cursor::{multi_shift, CompositePtr, CompositeStrides, Cursor, Strides};
pub use domain::{Dim, Domain, I, J, K};
pub use error::{BackendError, Result};
pub use field::{Composite, DeviceField, GridField};
pub use partition::{in_domain, lane_span, launch_shape, LaneSpan, HARDWARE_DIMS};
pub use shape::{GridShape, GroupShape, LaunchShape, LoopShape};
pub use stage::{ColumnStage, StencilStage, VerticalOrder};

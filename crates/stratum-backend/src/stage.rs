//! Executable-unit contracts: stencil and column stages.
//!
//! Stages are opaque to the backend. A stencil stage is invoked once per
//! domain cell with cursors positioned at that cell; a column stage is
//! invoked once per vertical level, strictly in the order the stage itself
//! reports, with a per-column seed threaded through every call.

use crate::cursor::{CompositePtr, CompositeStrides};

/// Stateless per-cell executable unit (the stencil discipline).
///
/// `apply` runs once per cell of the iteration domain. `ptr` is positioned
/// at the current cell for every field of the composite; `strides` lets the
/// stage reach neighbors by its own shifts. No state persists between cells.
pub trait StencilStage: Send + Sync {
    /// Evaluate the stage at the current cell
    fn apply(&self, ptr: &CompositePtr, strides: &CompositeStrides);
}

impl<F> StencilStage for F
where
    F: Fn(&CompositePtr, &CompositeStrides) + Send + Sync,
{
    fn apply(&self, ptr: &CompositePtr, strides: &CompositeStrides) {
        self(ptr, strides)
    }
}

/// Order in which a column stage walks the vertical extent.
///
/// Direction is a property of the executable unit, not of the backend: the
/// dispatcher reads it from [`ColumnStage::order`] and never chooses one
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalOrder {
    /// Level 0 first, `v_size - 1` last
    #[default]
    Ascending,
    /// Level `v_size - 1` first, 0 last
    Descending,
}

/// Sequential per-level executable unit (the column discipline).
///
/// For every horizontal cell a lane owns, the dispatcher clones the
/// caller-supplied seed once and then invokes `apply` exactly `v_size`
/// times, strictly in [`ColumnStage::order`], threading the same clone by
/// `&mut` through every call of that column. The stage carries whatever
/// accumulator it needs inside the seed (or in the fields); the backend
/// never interprets it. Within one lane the calls are single-threaded and
/// strictly sequential; across lanes there is no ordering at all.
pub trait ColumnStage: Send + Sync {
    /// Per-column accumulator state, cloned from the caller's seed
    type Seed: Clone + Sync;

    /// Vertical walk order of this stage
    fn order(&self) -> VerticalOrder {
        VerticalOrder::Ascending
    }

    /// Evaluate the stage at the current vertical level
    fn apply(&self, seed: &mut Self::Seed, v_size: u64, ptr: &CompositePtr, strides: &CompositeStrides);
}

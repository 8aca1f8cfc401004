//! Per-lane dispatch: cell loops and the two execution disciplines.
//!
//! Every lane follows the same entry protocol: clone the composite origin,
//! advance it to the lane's starting multi-index, then walk the lane's
//! clipped box. The stencil discipline applies the stage once per cell; the
//! column discipline runs a strictly sequential descent along the vertical
//! dimension for every horizontal cell the lane owns.

use crate::cursor::{CompositePtr, CompositeStrides};
use crate::domain::{Dim, Domain};
use crate::partition::LaneSpan;
use crate::stage::{ColumnStage, StencilStage, VerticalOrder};

/// Nested cell loops over `loops`, outermost first, last entry fastest.
///
/// Each level advances the cursor one cell along its dimension per
/// iteration and restores it afterwards, so the cursor returns to the box
/// origin when the outermost loop finishes.
fn run_cell_loops(
    ptr: &mut CompositePtr,
    strides: &CompositeStrides,
    loops: &[(Dim, u64)],
    stage: &(impl StencilStage + ?Sized),
) {
    match loops.split_first() {
        None => stage.apply(ptr, strides),
        Some((&(dim, count), rest)) => {
            for _ in 0..count {
                run_cell_loops(ptr, strides, rest, stage);
                ptr.shift(strides, dim, 1);
            }
            ptr.shift(strides, dim, -(count as i64));
        }
    }
}

/// The lane's clipped N-dimensional box: partitioned leading dimensions with
/// their clipped sizes, trailing dimensions in full.
fn lane_loops(domain: &Domain, span: &LaneSpan) -> Vec<(Dim, u64)> {
    let mut loops = Vec::with_capacity(domain.rank());
    for (axis, &(dim, _)) in domain.entries().iter().take(span.rank).enumerate() {
        loops.push((dim, u64::from(span.size[axis])));
    }
    for &(dim, extent) in &domain.entries()[span.rank..] {
        loops.push((dim, extent));
    }
    loops
}

/// Shift a fresh clone of the composite origin to the lane's first cell.
fn shifted_origin(
    origin: &CompositePtr,
    strides: &CompositeStrides,
    domain: &Domain,
    span: &LaneSpan,
) -> CompositePtr {
    let mut ptr = origin.clone();
    for (axis, &(dim, _)) in domain.entries().iter().take(span.rank).enumerate() {
        ptr.shift(strides, dim, span.start[axis]);
    }
    ptr
}

/// Run the stencil discipline for one lane.
pub(crate) fn stencil_lane(
    origin: &CompositePtr,
    strides: &CompositeStrides,
    domain: &Domain,
    span: &LaneSpan,
    stage: &(impl StencilStage + ?Sized),
) {
    let mut ptr = shifted_origin(origin, strides, domain, span);
    run_cell_loops(&mut ptr, strides, &lane_loops(domain, span), stage);
}

/// Run the column discipline for one lane.
///
/// `h_domain` is the horizontal domain (vertical dimension already removed);
/// the descent below runs once per horizontal cell of the lane's clipped
/// box, invoking the stage once per vertical level in the stage's order.
#[allow(clippy::too_many_arguments)]
pub(crate) fn column_lane<S: ColumnStage>(
    origin: &CompositePtr,
    strides: &CompositeStrides,
    h_domain: &Domain,
    span: &LaneSpan,
    vertical: Dim,
    v_size: u64,
    seed: &S::Seed,
    stage: &S,
) {
    let step = match stage.order() {
        VerticalOrder::Ascending => 1i64,
        VerticalOrder::Descending => -1i64,
    };

    let descent = |ptr: &CompositePtr, strides: &CompositeStrides| {
        let mut acc = seed.clone();
        let mut level = ptr.clone();
        if stage.order() == VerticalOrder::Descending {
            level.shift(strides, vertical, v_size as i64 - 1);
        }
        for _ in 0..v_size {
            stage.apply(&mut acc, v_size, &level, strides);
            level.shift(strides, vertical, step);
        }
    };

    let mut ptr = shifted_origin(origin, strides, h_domain, span);
    run_cell_loops(&mut ptr, strides, &lane_loops(h_domain, span), &descent);
}

// ================================================================================================
// Tests
// ================================================================================================

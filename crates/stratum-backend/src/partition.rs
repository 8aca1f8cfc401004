//! Lane partitioning and bounds checking.
//!
//! The partitioner maps a runtime [`Domain`] onto the hardware compute grid:
//! [`launch_shape`] computes how many groups the launch needs along each of
//! the (at most three) leading dimensions, and [`lane_span`] computes, for
//! one lane, its starting multi-index and how many cells it owns before
//! hitting the domain edge. The grid is always rounded up to a multiple of
//! the group/loop-block product, so for non-exact extents some lanes start
//! outside the domain; [`in_domain`] masks those lanes off before they touch
//! memory.

use crate::domain::Domain;
use crate::error::{BackendError, Result};
use crate::shape::{GridShape, GroupShape, LaunchShape, LoopShape};

/// Number of leading domain dimensions that receive hardware coordinates.
///
/// Dimensions beyond the third are never partitioned; each lane iterates
/// them in full inside its per-lane loop.
pub const HARDWARE_DIMS: usize = 3;

/// Compute the hardware compute-grid shape for one launch.
///
/// For each participating axis, `groups = ceil(extent / (group * loop))`.
/// Axes beyond the domain rank are pinned to one group and one lane, so a
/// rank-0 domain launches exactly one lane.
///
/// # Errors
///
/// Rejects shapes with a zero group or loop-block size on a participating
/// axis, and domains whose group count overflows the hardware grid.
pub fn launch_shape(group: GroupShape, loop_block: LoopShape, domain: &Domain) -> Result<LaunchShape> {
    let rank = domain.rank().min(HARDWARE_DIMS);
    let mut grid = GridShape::default();
    let mut lanes = GroupShape::default();

    for (axis, &(dim, extent)) in domain.entries().iter().take(rank).enumerate() {
        let group_size = group.axis(axis);
        let loop_size = loop_block.axis(axis);
        if group_size == 0 || loop_size == 0 {
            return Err(BackendError::invalid_launch_config(format!(
                "group/loop-block sizes must be positive on axis {axis} ({dim}): group={group}, loop_block={loop_block}"
            )));
        }

        let span = u64::from(group_size) * u64::from(loop_size);
        let groups = u32::try_from(extent.div_ceil(span)).map_err(|_| {
            BackendError::invalid_launch_config(format!(
                "extent {extent} along {dim} overflows the hardware grid (group span {span})"
            ))
        })?;

        lanes.set_axis(axis, group_size);
        grid.set_axis(axis, groups);
    }

    Ok(LaunchShape { grid, lanes })
}

/// One lane's slice of the iteration domain.
///
/// `start` and `size` are only meaningful for the first `rank` axes; size
/// components are in `[0, loop_block]`, and zero means the lane does no work
/// along that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneSpan {
    /// Starting multi-index, one entry per partitioned axis
    pub start: [i64; HARDWARE_DIMS],
    /// Clipped cell count, one entry per partitioned axis
    pub size: [u32; HARDWARE_DIMS],
    /// Number of partitioned axes: `min(domain rank, 3)`
    pub rank: usize,
}

/// Compute one lane's starting multi-index and clipped size.
///
/// Per axis: `start = group_idx * (group * loop) + lane_idx * loop` and
/// `size = clamp(extent - start, 0, loop)` — a lane at or beyond the extent
/// gets size 0, a lane straddling the edge gets a partial block.
pub fn lane_span(
    group: GroupShape,
    loop_block: LoopShape,
    domain: &Domain,
    group_idx: [u32; 3],
    lane_idx: [u32; 3],
) -> LaneSpan {
    let rank = domain.rank().min(HARDWARE_DIMS);
    let mut start = [0i64; HARDWARE_DIMS];
    let mut size = [0u32; HARDWARE_DIMS];

    for (axis, &(_, extent)) in domain.entries().iter().take(rank).enumerate() {
        let group_size = i64::from(group.axis(axis));
        let loop_size = i64::from(loop_block.axis(axis));
        let first = i64::from(group_idx[axis]) * group_size * loop_size + i64::from(lane_idx[axis]) * loop_size;
        let clipped = (extent as i64 - first).clamp(0, loop_size);
        start[axis] = first;
        size[axis] = clipped as u32;
    }

    LaneSpan { start, size, rank }
}

/// Bounds check: true when the lane's starting multi-index lies inside the
/// domain on every partitioned axis.
///
/// Starting indices are non-negative by construction and unpartitioned
/// trailing dimensions always begin at 0, so only the upper bound of the
/// leading axes needs checking. A lane failing this check must do no work.
pub fn in_domain(span: &LaneSpan, domain: &Domain) -> bool {
    domain
        .entries()
        .iter()
        .take(span.rank)
        .enumerate()
        .all(|(axis, &(_, extent))| span.start[axis] < extent as i64)
}

// ================================================================================================
// Tests
// ================================================================================================

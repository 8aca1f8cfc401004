//! The lane-grid execution backend.
//!
//! [`GridBackend`] carries the compile-fixed group and loop-block shapes and
//! maps one invocation's iteration domain onto the accelerator's compute
//! grid: one lane per grid position, launched in parallel, each lane
//! bounds-checked and clipped at the domain edges. Lanes execute
//! independently — there is no synchronization or data-race protection
//! between them; the caller must ensure no cell is written by more than one
//! lane. A launch returns only after every lane has completed, so it is the
//! completion barrier the caller awaits before releasing or recycling
//! temporaries.
//!
//! Failure semantics: configuration problems are rejected before any lane
//! launches; a degenerate domain (any zero extent) launches nothing and
//! succeeds; a panic inside a stage is fatal to the invocation and leaves
//! the composite's affected region in an undefined state.

use crate::alloc::TmpArena;
use crate::dispatch::{column_lane, stencil_lane};
use crate::domain::{Dim, Domain};
use crate::error::{BackendError, Result};
use crate::field::Composite;
use crate::partition::{in_domain, lane_span, launch_shape};
use crate::shape::{GroupShape, LaunchShape, LoopShape};
use crate::stage::{ColumnStage, StencilStage};
use rayon::prelude::*;
use stratum_tracing::perf_span;

/// Execution backend for one compiled group/loop-block configuration.
///
/// The shapes are fixed at construction and never vary across invocations,
/// mirroring hardware launch parameters baked into a compiled kernel.
#[derive(Debug, Clone, Copy)]
pub struct GridBackend {
    group: GroupShape,
    loop_block: LoopShape,
}

impl GridBackend {
    /// Create a backend with the given group shape and one cell per lane
    pub fn new(group: GroupShape) -> Self {
        Self {
            group,
            loop_block: LoopShape::default(),
        }
    }

    /// Create a backend with explicit per-lane loop blocking
    pub fn with_loop_block(group: GroupShape, loop_block: LoopShape) -> Self {
        Self { group, loop_block }
    }

    /// The configured lanes-per-group shape
    pub fn group_shape(&self) -> GroupShape {
        self.group
    }

    /// The configured cells-per-lane shape
    pub fn loop_block(&self) -> LoopShape {
        self.loop_block
    }

    /// Scratch arena for temporary fields used alongside this backend
    pub fn tmp_allocator(&self) -> TmpArena {
        TmpArena::new()
    }

    /// Apply a stencil stage over every cell of `domain`.
    ///
    /// Each lane advances the composite's cursors to its starting
    /// multi-index and evaluates the stage once per cell of its clipped box,
    /// the domain's last dimension varying fastest. Results are written
    /// through the composite's cursors; there is no other output.
    ///
    /// # Errors
    ///
    /// Fails fast on invalid group/loop-block configuration. A degenerate
    /// domain is not an error: nothing launches and the composite's fields
    /// are left untouched.
    pub fn apply_stencil_stage<G>(&self, domain: &Domain, stage: &G, composite: &Composite<'_>) -> Result<()>
    where
        G: StencilStage + ?Sized,
    {
        let _span = perf_span!("apply_stencil_stage", cells = domain.cells());
        if domain.is_degenerate() {
            tracing::debug!(domain = %domain, "degenerate domain, skipping launch");
            return Ok(());
        }

        let shape = launch_shape(self.group, self.loop_block, domain)?;
        tracing::trace!(domain = %domain, shape = %shape, "launching stencil stage");

        let origin = composite.origin();
        let strides = composite.strides();
        self.for_each_lane(&shape, |group_idx, lane_idx| {
            let span = lane_span(self.group, self.loop_block, domain, group_idx, lane_idx);
            if !in_domain(&span, domain) {
                return;
            }
            stencil_lane(&origin, strides, domain, &span, stage);
        });

        Ok(())
    }

    /// Apply a column stage along `vertical` over every column of `domain`.
    ///
    /// The vertical dimension is removed from the domain before
    /// partitioning; its full extent is walked sequentially per column, in
    /// the stage's own order, threading a clone of `seed` by `&mut` through
    /// every level call of that column. Horizontal lanes run concurrently
    /// with no ordering between them.
    ///
    /// # Errors
    ///
    /// Fails fast on invalid configuration or when `vertical` is not a
    /// dimension of `domain`. A degenerate domain is a successful no-op.
    pub fn apply_column_stage<S>(
        &self,
        domain: &Domain,
        stage: &S,
        composite: &Composite<'_>,
        vertical: Dim,
        seed: S::Seed,
    ) -> Result<()>
    where
        S: ColumnStage,
    {
        let _span = perf_span!("apply_column_stage", cells = domain.cells());
        if domain.is_degenerate() {
            tracing::debug!(domain = %domain, "degenerate domain, skipping launch");
            return Ok(());
        }

        let v_size = domain.extent(vertical).ok_or_else(|| {
            BackendError::invalid_launch_config(format!(
                "vertical dimension {vertical} is not part of domain {domain}"
            ))
        })?;
        let h_domain = domain.without(vertical);

        let shape = launch_shape(self.group, self.loop_block, &h_domain)?;
        tracing::trace!(domain = %domain, shape = %shape, v_size = v_size, "launching column stage");

        let origin = composite.origin();
        let strides = composite.strides();
        let seed = &seed;
        self.for_each_lane(&shape, |group_idx, lane_idx| {
            let span = lane_span(self.group, self.loop_block, &h_domain, group_idx, lane_idx);
            if !in_domain(&span, &h_domain) {
                return;
            }
            column_lane(&origin, strides, &h_domain, &span, vertical, v_size, seed, stage);
        });

        Ok(())
    }

    /// Launch one call of `lane` per position of the compute grid.
    ///
    /// Groups execute in parallel and lanes within a group execute in
    /// parallel; the call returns once every lane has finished.
    fn for_each_lane<F>(&self, shape: &LaunchShape, lane: F)
    where
        F: Fn([u32; 3], [u32; 3]) + Send + Sync,
    {
        let total_groups = shape.grid.total_groups() as usize;
        let lanes_per_group = shape.lanes.total_lanes() as usize;

        (0..total_groups).into_par_iter().for_each(|group_linear| {
            let group_idx = shape.grid.delinearize(group_linear);
            (0..lanes_per_group).into_par_iter().for_each(|lane_linear| {
                let lane_idx = shape.lanes.delinearize(lane_linear);
                lane(group_idx, lane_idx);
            });
        });
    }
}

// ================================================================================================
// Tests
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{CompositePtr, CompositeStrides};
    use crate::domain::{I, J, K};
    use crate::field::DeviceField;
    use crate::stage::VerticalOrder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_degenerate_domain_is_a_noop() {
        let backend = GridBackend::new(GroupShape::square(4, 4));
        let domain = Domain::new().with(I, 8).with(J, 0);

        let mut field = DeviceField::<f64>::from_slice(&Domain::new().with(I, 8).with(J, 1), &[3.0; 8]).unwrap();
        let composite = Composite::new().with(&mut field);

        let calls = AtomicUsize::new(0);
        let stage = |_: &CompositePtr, _: &CompositeStrides| {
            calls.fetch_add(1, Ordering::Relaxed);
        };

        backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        drop(composite);
        assert!(field.as_slice().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_launch() {
        let backend = GridBackend::new(GroupShape::new(0, 1, 1));
        let domain = Domain::new().with(I, 8);
        let composite = Composite::new();

        let calls = AtomicUsize::new(0);
        let stage = |_: &CompositePtr, _: &CompositeStrides| {
            calls.fetch_add(1, Ordering::Relaxed);
        };

        let err = backend.apply_stencil_stage(&domain, &stage, &composite).unwrap_err();
        assert!(matches!(err, BackendError::InvalidLaunchConfig(_)));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_stencil_applies_exactly_once_per_cell() {
        // {i: 10, j: 10} under group {4, 4}: the grid rounds up to 12x12 lanes.
        let backend = GridBackend::new(GroupShape::square(4, 4));
        let domain = Domain::new().with(I, 10).with(J, 10);

        let mut field = DeviceField::<u32>::zeroed(&domain);
        let composite = Composite::new().with(&mut field);

        let stage = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
            let cell = ptr.field(0);
            cell.write(cell.read::<u32>() + 1);
        };

        backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();

        drop(composite);
        assert!(field.as_slice().iter().all(|&v| v == 1), "gaps or overlaps in tiling");
        assert_eq!(field.as_slice().len(), 100);
    }

    #[test]
    fn test_stencil_with_loop_blocking_still_tiles_exactly() {
        let backend = GridBackend::with_loop_block(GroupShape::square(2, 2), LoopShape::new(3, 2, 1));
        let domain = Domain::new().with(I, 13).with(J, 7);

        let mut field = DeviceField::<u32>::zeroed(&domain);
        let composite = Composite::new().with(&mut field);

        let stage = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
            let cell = ptr.field(0);
            cell.write(cell.read::<u32>() + 1);
        };

        backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();

        drop(composite);
        assert!(field.as_slice().iter().all(|&v| v == 1));
    }

    #[test]
    fn test_stencil_cursor_offsets_match_strides() {
        // Copying through cursors must land every value on the matching cell.
        let backend = GridBackend::new(GroupShape::new(4, 2, 2));
        let domain = Domain::new().with(I, 5).with(J, 4).with(K, 3);
        let values: Vec<f64> = (0..60).map(f64::from).collect();

        let mut inp = DeviceField::from_slice(&domain, &values).unwrap();
        let mut out = DeviceField::<f64>::zeroed(&domain);
        let composite = Composite::new().with(&mut inp).with(&mut out);

        let stage = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
            ptr.field(1).write(ptr.field(0).read::<f64>());
        };

        backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();

        drop(composite);
        assert_eq!(out.as_slice(), values.as_slice());
    }

    #[test]
    fn test_single_cell_domain_single_invocation() {
        let backend = GridBackend::new(GroupShape::new(32, 8, 1));
        let domain = Domain::new().with(I, 1);
        let composite = Composite::new();

        let calls = AtomicUsize::new(0);
        let stage = |_: &CompositePtr, _: &CompositeStrides| {
            calls.fetch_add(1, Ordering::Relaxed);
        };

        backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_rank0_domain_single_invocation() {
        let backend = GridBackend::new(GroupShape::new(32, 8, 1));
        let composite = Composite::new();

        let calls = AtomicUsize::new(0);
        let stage = |_: &CompositePtr, _: &CompositeStrides| {
            calls.fetch_add(1, Ordering::Relaxed);
        };

        backend.apply_stencil_stage(&Domain::new(), &stage, &composite).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_column_stage_invocation_count_and_order() {
        let backend = GridBackend::new(GroupShape::square(4, 4));
        let domain = Domain::new().with(I, 5).with(J, 3).with(K, 7);

        // Every column writes ascending level numbers; order is observable
        // because each call reads the accumulator it advanced last level.
        struct LevelStamp;
        impl ColumnStage for LevelStamp {
            type Seed = u64;
            fn apply(&self, level: &mut u64, _v_size: u64, ptr: &CompositePtr, _: &CompositeStrides) {
                unsafe { ptr.field(0).write(*level) };
                *level += 1;
            }
        }

        let mut out = DeviceField::<u64>::zeroed(&domain);
        let composite = Composite::new().with(&mut out);

        backend
            .apply_column_stage(&domain, &LevelStamp, &composite, K, 0)
            .unwrap();

        drop(composite);
        for i in 0..5u64 {
            for j in 0..3u64 {
                for k in 0..7u64 {
                    assert_eq!(out.get(&[(I, i), (J, j), (K, k)]), k);
                }
            }
        }
    }

    #[test]
    fn test_column_stage_descending() {
        let backend = GridBackend::new(GroupShape::linear(8));
        let domain = Domain::new().with(I, 3).with(K, 4);

        struct TopDown;
        impl ColumnStage for TopDown {
            type Seed = u64;
            fn order(&self) -> VerticalOrder {
                VerticalOrder::Descending
            }
            fn apply(&self, calls: &mut u64, _v_size: u64, ptr: &CompositePtr, _: &CompositeStrides) {
                unsafe { ptr.field(0).write(*calls) };
                *calls += 1;
            }
        }

        let mut out = DeviceField::<u64>::zeroed(&domain);
        let composite = Composite::new().with(&mut out);

        backend.apply_column_stage(&domain, &TopDown, &composite, K, 0).unwrap();

        drop(composite);
        for i in 0..3u64 {
            for k in 0..4u64 {
                // Call 0 lands on the top level.
                assert_eq!(out.get(&[(I, i), (K, k)]), 3 - k);
            }
        }
    }

    #[test]
    fn test_column_stage_vertical_only_domain() {
        let backend = GridBackend::new(GroupShape::linear(64));
        let domain = Domain::new().with(K, 6);

        struct PrefixSum;
        impl ColumnStage for PrefixSum {
            type Seed = f64;
            fn apply(&self, acc: &mut f64, _v_size: u64, ptr: &CompositePtr, _: &CompositeStrides) {
                unsafe {
                    *acc += ptr.field(0).read::<f64>();
                    ptr.field(1).write(*acc);
                }
            }
        }

        let mut inp = DeviceField::from_slice(&domain, &[1.0f64; 6]).unwrap();
        let mut out = DeviceField::<f64>::zeroed(&domain);
        let composite = Composite::new().with(&mut inp).with(&mut out);

        backend
            .apply_column_stage(&domain, &PrefixSum, &composite, K, 0.5)
            .unwrap();

        drop(composite);
        assert_eq!(out.as_slice(), &[1.5, 2.5, 3.5, 4.5, 5.5, 6.5]);
    }

    #[test]
    fn test_column_stage_rejects_missing_vertical() {
        let backend = GridBackend::new(GroupShape::linear(4));
        let domain = Domain::new().with(I, 4);
        let composite = Composite::new();

        struct Noop;
        impl ColumnStage for Noop {
            type Seed = ();
            fn apply(&self, _: &mut (), _: u64, _: &CompositePtr, _: &CompositeStrides) {}
        }

        let err = backend
            .apply_column_stage(&domain, &Noop, &composite, K, ())
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidLaunchConfig(_)));
    }

    #[test]
    fn test_column_total_invocations() {
        let backend = GridBackend::new(GroupShape::square(4, 4));
        let domain = Domain::new().with(I, 6).with(J, 5).with(K, 9);
        let composite = Composite::new();

        static CALLS: AtomicUsize = AtomicUsize::new(0);
        struct Count;
        impl ColumnStage for Count {
            type Seed = ();
            fn apply(&self, _: &mut (), _: u64, _: &CompositePtr, _: &CompositeStrides) {
                CALLS.fetch_add(1, Ordering::Relaxed);
            }
        }

        backend.apply_column_stage(&domain, &Count, &composite, K, ()).unwrap();
        // vertical_size invocations per horizontal cell
        assert_eq!(CALLS.load(Ordering::Relaxed), 6 * 5 * 9);
    }

    #[test]
    fn test_tmp_allocator_round_trip() {
        let backend = GridBackend::new(GroupShape::linear(16));
        let domain = Domain::new().with(I, 10);

        let arena = backend.tmp_allocator();
        let mut tmp = arena.allocate::<f64>(&domain).unwrap();
        let composite = Composite::new().with(&mut tmp);

        let stage = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
            ptr.field(0).write(4.25f64);
        };
        backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();

        drop(composite);
        assert_eq!(tmp.to_vec(), vec![4.25; 10]);
    }
}

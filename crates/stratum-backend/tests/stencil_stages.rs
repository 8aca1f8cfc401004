//! Integration tests for the stencil discipline.

use stratum_backend::{
    Composite, CompositePtr, CompositeStrides, DeviceField, Dim, Domain, GridBackend, GroupShape, LoopShape, I, J, K,
};

/// Five-point Laplacian over the interior of a field with a one-cell halo.
#[test]
fn laplacian_over_halo_interior() {
    let backend = GridBackend::new(GroupShape::square(4, 4));

    let n = 8u64;
    let padded = Domain::new().with(I, n + 2).with(J, n + 2);
    let interior = Domain::new().with(I, n).with(J, n);

    // inp(i, j) = i + 2 j, which has zero Laplacian everywhere.
    let mut inp = DeviceField::<f64>::zeroed(&padded);
    for i in 0..n + 2 {
        for j in 0..n + 2 {
            inp.set(&[(I, i), (J, j)], i as f64 + 2.0 * j as f64);
        }
    }
    let mut out = DeviceField::<f64>::from_slice(&padded, &vec![-1.0; ((n + 2) * (n + 2)) as usize]).unwrap();

    let composite = Composite::new().with(&mut inp).with(&mut out).shifted(I, 1).shifted(J, 1);

    let stage = |ptr: &CompositePtr, strides: &CompositeStrides| {
        let di = strides.field(0).get(I);
        let dj = strides.field(0).get(J);
        let center = ptr.field(0);
        unsafe {
            let laplacian = center.offset(di).read::<f64>()
                + center.offset(-di).read::<f64>()
                + center.offset(dj).read::<f64>()
                + center.offset(-dj).read::<f64>()
                - 4.0 * center.read::<f64>();
            ptr.field(1).write(laplacian);
        }
    };

    backend.apply_stencil_stage(&interior, &stage, &composite).unwrap();

    drop(composite);
    for i in 0..n + 2 {
        for j in 0..n + 2 {
            let on_halo = i == 0 || i == n + 1 || j == 0 || j == n + 1;
            let expected = if on_halo { -1.0 } else { 0.0 };
            assert_eq!(out.get(&[(I, i), (J, j)]), expected, "cell ({i}, {j})");
        }
    }
}

/// A two-launch pipeline staging its intermediate in a temporary field.
#[test]
fn temporary_field_between_launches() {
    let backend = GridBackend::new(GroupShape::linear(8));
    let domain = Domain::new().with(I, 37);

    let values: Vec<f64> = (0..37).map(f64::from).collect();
    let mut inp = DeviceField::from_slice(&domain, &values).unwrap();
    let mut out = DeviceField::<f64>::zeroed(&domain);

    let arena = backend.tmp_allocator();
    let mut tmp = arena.allocate::<f64>(&domain).unwrap();

    let double = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
        ptr.field(1).write(2.0 * ptr.field(0).read::<f64>());
    };
    let composite = Composite::new().with(&mut inp).with(&mut tmp);
    backend.apply_stencil_stage(&domain, &double, &composite).unwrap();
    drop(composite);

    let add_one = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
        ptr.field(1).write(ptr.field(0).read::<f64>() + 1.0);
    };
    let composite = Composite::new().with(&mut tmp).with(&mut out);
    backend.apply_stencil_stage(&domain, &add_one, &composite).unwrap();
    drop(composite);

    let expected: Vec<f64> = values.iter().map(|v| 2.0 * v + 1.0).collect();
    assert_eq!(out.as_slice(), expected.as_slice());
}

/// Temporaries recycled across stage evaluations keep their addressing.
#[test]
fn arena_reuse_across_evaluations() {
    let backend = GridBackend::new(GroupShape::linear(16));
    let domain = Domain::new().with(I, 50);
    let mut arena = backend.tmp_allocator();

    for round in 0..3u32 {
        let mut tmp = arena.allocate::<u32>(&domain).unwrap();
        let composite = Composite::new().with(&mut tmp);

        let stage = move |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
            ptr.field(0).write(round);
        };
        backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();

        drop(composite);
        assert!(tmp.as_slice().iter().all(|&v| v == round));
        arena.reset();
    }

    // Three rounds, one retained reservation.
    assert_eq!(arena.chunk_count(), 1);
}

/// Dimensions beyond the third are iterated in full by every lane.
#[test]
fn four_dimensional_domain_applies_once_per_cell() {
    let l = Dim::new("l");
    let backend = GridBackend::with_loop_block(GroupShape::new(2, 2, 2), LoopShape::new(2, 1, 1));
    let domain = Domain::new().with(I, 5).with(J, 4).with(K, 3).with(l, 6);

    let mut field = DeviceField::<u32>::zeroed(&domain);
    let composite = Composite::new().with(&mut field);

    let stage = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
        let cell = ptr.field(0);
        cell.write(cell.read::<u32>() + 1);
    };

    backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();

    drop(composite);
    assert_eq!(field.as_slice().len(), 5 * 4 * 3 * 6);
    assert!(field.as_slice().iter().all(|&v| v == 1));
}

/// Launch instrumentation must not disturb execution.
#[test]
fn tracing_instrumentation() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();

    let backend = GridBackend::new(GroupShape::linear(4));
    let domain = Domain::new().with(I, 9);

    let mut field = DeviceField::<f64>::zeroed(&domain);
    let composite = Composite::new().with(&mut field);

    let stage = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
        ptr.field(0).write(1.0f64);
    };
    backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();

    drop(composite);
    assert!(field.as_slice().iter().all(|&v| v == 1.0));
}

/// The same stage over the same domain produces identical results under
/// different launch decompositions.
#[test]
fn results_independent_of_launch_shape() {
    let domain = Domain::new().with(I, 21).with(J, 17);
    let values: Vec<f32> = (0..21 * 17).map(|v| v as f32 * 0.5).collect();

    let stage = |ptr: &CompositePtr, _: &CompositeStrides| unsafe {
        ptr.field(1).write(ptr.field(0).read::<f32>().sqrt());
    };

    let mut reference: Option<Vec<f32>> = None;
    for backend in [
        GridBackend::new(GroupShape::square(8, 8)),
        GridBackend::new(GroupShape::linear(3)),
        GridBackend::with_loop_block(GroupShape::square(2, 2), LoopShape::new(4, 3, 1)),
    ] {
        let mut inp = DeviceField::from_slice(&domain, &values).unwrap();
        let mut out = DeviceField::<f32>::zeroed(&domain);
        let composite = Composite::new().with(&mut inp).with(&mut out);
        backend.apply_stencil_stage(&domain, &stage, &composite).unwrap();
        drop(composite);

        match &reference {
            None => reference = Some(out.as_slice().to_vec()),
            Some(expected) => assert_eq!(out.as_slice(), expected.as_slice()),
        }
    }
}

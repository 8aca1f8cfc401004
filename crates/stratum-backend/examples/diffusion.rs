//! Example: explicit heat diffusion on a 2D grid.
//!
//! Steps `u_t = alpha * (u_xx + u_yy)` with a five-point stencil over the
//! interior of a field carrying a one-cell halo, double-buffering through a
//! temporary field from the backend's scratch arena.

use stratum_backend::{
    Composite, CompositePtr, CompositeStrides, DeviceField, Domain, GridBackend, GroupShape, Result, I, J,
};
use stratum_tracing::{init_global_tracing, TracingConfig};

const N: u64 = 64;
const STEPS: usize = 200;
const COEFF: f64 = 0.2;

fn diffuse(ptr: &CompositePtr, strides: &CompositeStrides) {
    let di = strides.field(0).get(I);
    let dj = strides.field(0).get(J);
    let u = ptr.field(0);
    unsafe {
        let laplacian = u.offset(di).read::<f64>()
            + u.offset(-di).read::<f64>()
            + u.offset(dj).read::<f64>()
            + u.offset(-dj).read::<f64>()
            - 4.0 * u.read::<f64>();
        ptr.field(1).write(u.read::<f64>() + COEFF * laplacian);
    }
}

fn copy_back(ptr: &CompositePtr, _: &CompositeStrides) {
    unsafe {
        ptr.field(1).write(ptr.field(0).read::<f64>());
    }
}

fn main() -> Result<()> {
    if let Err(err) = init_global_tracing(&TracingConfig::from_env()) {
        eprintln!("tracing setup failed: {err}");
    }

    let backend = GridBackend::new(GroupShape::square(8, 8));
    let padded = Domain::new().with(I, N + 2).with(J, N + 2);
    let interior = Domain::new().with(I, N).with(J, N);

    // A hot square in the middle of a cold plate.
    let mut u = DeviceField::<f64>::zeroed(&padded);
    for i in N / 2 - 4..N / 2 + 4 {
        for j in N / 2 - 4..N / 2 + 4 {
            u.set(&[(I, i + 1), (J, j + 1)], 100.0);
        }
    }

    let arena = backend.tmp_allocator();
    let mut next = arena.allocate::<f64>(&padded)?;

    for _ in 0..STEPS {
        let composite = Composite::new().with(&mut u).with(&mut next).shifted(I, 1).shifted(J, 1);
        backend.apply_stencil_stage(&interior, &diffuse, &composite)?;
        drop(composite);

        let composite = Composite::new().with(&mut next).with(&mut u).shifted(I, 1).shifted(J, 1);
        backend.apply_stencil_stage(&interior, &copy_back, &composite)?;
        drop(composite);
    }

    let total: f64 = u.as_slice().iter().sum();
    let peak = u
        .as_slice()
        .iter()
        .fold(f64::NEG_INFINITY, |max, &v| max.max(v));
    println!("after {STEPS} steps: total heat = {total:.3}, peak = {peak:.3}");

    Ok(())
}

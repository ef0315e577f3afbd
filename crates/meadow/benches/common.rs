use std::time::Duration;

use criterion::{Criterion, Throughput};
use meadow::ground::GroundSurface;

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(3);

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

/// Rolling 64x64 terrain with a density group fading out toward +X.
pub fn rolling_ground() -> GroundSurface {
    let ground = GroundSurface::heightfield("rolling", 64.0, 32, |x, y| {
        1.5 * (x * 0.15).sin() * (y * 0.1).cos()
    })
    .expect("valid heightfield");
    let fade: Vec<f32> = ground
        .world_positions()
        .iter()
        .map(|p| (0.5 - p.x / 64.0).clamp(0.0, 1.0))
        .collect();
    ground
        .with_vertex_group("fade", fade)
        .expect("one weight per vertex")
        .with_density_group("fade")
}

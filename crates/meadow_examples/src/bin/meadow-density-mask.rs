use glam::Vec2;
use meadow::prelude::*;
use meadow_examples::{init_tracing, render_meadow_to_png, RenderConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of circular clearings cut into the density mask.
const CLEARINGS: usize = 6;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let size = 60.0;
    let surface = GroundSurface::heightfield("meadow", size, 48, |x, y| {
        1.2 * (x * 0.12).sin() + 0.8 * (y * 0.09).cos()
    })?;

    let mut rng = StdRng::seed_from_u64(42);
    let clearings: Vec<(Vec2, f32)> = (0..CLEARINGS)
        .map(|_| {
            let center = Vec2::new(
                uniform(&mut rng, -0.4, 0.4) * size,
                uniform(&mut rng, -0.4, 0.4) * size,
            );
            (center, uniform(&mut rng, 4.0, 9.0))
        })
        .collect();

    // Density fades to zero inside each clearing; flowers grow only near the edges.
    let mut density = Vec::with_capacity(surface.vertex_count());
    let mut flowers = Vec::with_capacity(surface.vertex_count());
    for p in surface.world_positions() {
        let nearest = clearings
            .iter()
            .map(|(c, r)| (p.truncate().distance(*c) - r) / r)
            .fold(f32::MAX, f32::min);
        density.push(nearest.clamp(0.0, 1.0));
        flowers.push((1.0 - (nearest - 0.25).abs() * 4.0).clamp(0.0, 1.0));
    }
    let surface = surface
        .with_vertex_group("density", density)?
        .with_vertex_group("flowers", flowers)?
        .with_density_group("density");

    let template = BlobGridTemplate::new("mixed")
        .with_tile(TemplateTile::new("grass"))
        .with_tile(TemplateTile::new("flowers").with_density_group("flowers"));

    let mut scene = MeadowScene::new();
    let ground = scene.add_ground_with(
        surface,
        MeadowSettings::default()
            .with_seed(3)
            .with_sample_distance(1.0)
            .with_max_samples(20_000)
            .with_selection(TileSelection::HighestDensity),
    )?;
    let blob_grid = scene.add_blob_grid(template);
    let summary = scene.make_meadow(ground, blob_grid, &mut TracingSink)?;
    println!(
        "{} samples, {} patches around {} clearings",
        summary.samples, summary.patches, CLEARINGS
    );

    let entry = scene.ground(ground)?;
    let config = RenderConfig {
        tile_palette: vec![[140, 200, 90], [240, 120, 180]],
        ..RenderConfig::default()
    };
    render_meadow_to_png(
        entry.surface(),
        entry.samples(),
        entry.patches(),
        &config,
        "meadow-density-mask.png",
    )?;
    Ok(())
}

fn uniform(rng: &mut StdRng, lo: f32, hi: f32) -> f32 {
    let t = rng.next_u32() as f32 / u32::MAX as f32;
    lo + (hi - lo) * t
}
